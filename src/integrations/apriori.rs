//! Apriori: stake, request the unstake, wait out the withdrawal delay, claim

use std::sync::Arc;
use std::time::Duration;

use super::{action_delay, Automation, AutomationId};
use crate::actions::claim::Claim;
use crate::actions::staking::{VaultStake, VaultUnstake};
use crate::actions::{AprioriStatusClient, ClaimStatusSource};
use crate::batch::{AccountPolicy, CycleAbortPolicy};
use crate::config::Config;
use crate::cycle::{CyclePlan, CycleStep, Pause};
use crate::error::Result;

pub struct Apriori {
    claim: Arc<Claim>,
}

impl Apriori {
    pub fn new(status: Arc<dyn ClaimStatusSource>) -> Self {
        Self {
            claim: Arc::new(Claim::new(status)),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let status = AprioriStatusClient::new(config.apriori.status_api_url.clone())?;
        Ok(Self::new(Arc::new(status)))
    }
}

impl Automation for Apriori {
    fn id(&self) -> AutomationId {
        AutomationId::Apriori
    }

    fn plan(&self, config: &Config) -> CyclePlan {
        let claim_wait = Duration::from_secs(config.apriori.claim_wait_secs);
        CyclePlan::default()
            .then(CycleStep::fatal(Arc::new(VaultStake)))
            .then(
                CycleStep::fatal(Arc::new(VaultUnstake))
                    .after(Pause::Random(action_delay(config))),
            )
            .then(CycleStep::fatal(self.claim.clone()).after(Pause::Fixed(claim_wait)))
    }

    fn account_policy(&self, config: &Config) -> AccountPolicy {
        AccountPolicy {
            on_cycle_abort: CycleAbortPolicy::SkipRemainingCycles,
            inter_cycle_pause: Some(Pause::Random(action_delay(config))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::WithdrawalRequest;
    use crate::batch::BatchRunner;
    use crate::config::RunConfiguration;
    use crate::cycle::{CycleStatus, StepOutcome};
    use crate::testing::{fast_config, test_credential, ScriptedChain};
    use alloy::primitives::utils::parse_ether;
    use alloy::primitives::Address;
    use async_trait::async_trait;
    use tokio_util::sync::CancellationToken;

    struct NothingReady;

    #[async_trait]
    impl ClaimStatusSource for NothingReady {
        async fn pending_requests(&self, _owner: Address) -> Result<Vec<WithdrawalRequest>> {
            Ok(vec![WithdrawalRequest {
                id: 7,
                claimed: false,
                is_claimable: false,
            }])
        }
    }

    #[test]
    fn test_claim_waits_fixed_interval() {
        let apriori = Apriori::new(Arc::new(NothingReady));
        let plan = apriori.plan(&Config::default());
        assert_eq!(plan.describe(), "apriori-stake -> apriori-unstake -> apriori-claim");
        assert_eq!(
            plan.steps()[2].pause_before,
            Some(Pause::Fixed(Duration::from_secs(660)))
        );
    }

    #[tokio::test]
    async fn test_unclaimable_cycle_completes() {
        let chain = Arc::new(ScriptedChain::new());
        let cred = test_credential(1);
        chain.set_native_balance(cred.address(), parse_ether("10").unwrap());
        let runner =
            BatchRunner::new(chain.clone(), Arc::new(fast_config()), CancellationToken::new());

        let report = runner
            .run_pass(&Apriori::new(Arc::new(NothingReady)), &[cred], &RunConfiguration::once())
            .await;

        let cycle = &report.accounts[0].cycles[0];
        assert_eq!(cycle.status, CycleStatus::Completed);
        assert!(matches!(cycle.steps[2].outcome, StepOutcome::NoOp { .. }));
        // stake + unstake request only
        assert_eq!(chain.submitted().len(), 2);
    }
}
