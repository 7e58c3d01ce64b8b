//! Account batch runner
//!
//! Runs an automation's cycles for every credential. Accounts run one after
//! another unless `batch.max_parallel_accounts` allows more; the steps of a
//! single account are always strictly ordered. Failures never escape a pass:
//! they end up in [`AccountReport::error`] or in the cycle reports.

pub mod schedule;

use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{Address, U256};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::chain::{format_amount, ChainClient};
use crate::config::{Config, RunConfiguration};
use crate::cycle::{CycleOrchestrator, CyclePlan, CycleReport, Pause};
use crate::error::Error;
use crate::integrations::{Automation, AutomationId};
use crate::pacing::{pause, Randomizer};
use crate::wallet::{short_address, Credential};

pub use schedule::spawn_recurring;

/// What an aborted cycle means for the account's remaining cycles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleAbortPolicy {
    ContinueCycles,
    SkipRemainingCycles,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountPolicy {
    pub on_cycle_abort: CycleAbortPolicy,
    /// Wait between two cycles of the same account
    pub inter_cycle_pause: Option<Pause>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AccountReport {
    /// 1-based position in the wallet file
    pub index: usize,
    pub address: Address,
    pub cycles_requested: u32,
    /// Once-per-account steps that ran before the first cycle
    #[serde(skip_serializing_if = "Option::is_none")]
    pub setup: Option<CycleReport>,
    pub cycles: Vec<CycleReport>,
    pub error: Option<String>,
    pub initial_balance: Option<U256>,
    pub final_balance: Option<U256>,
}

impl AccountReport {
    pub fn completed_cycles(&self) -> usize {
        self.cycles.iter().filter(|c| c.is_completed()).count()
    }

    pub fn transactions(&self) -> usize {
        self.setup.iter().chain(&self.cycles).map(|c| c.transactions()).sum()
    }

    /// Signed change in native balance over the pass, formatted in MON
    pub fn balance_change(&self) -> Option<String> {
        let (start, end) = (self.initial_balance?, self.final_balance?);
        Some(if end >= start {
            format!("+{}", format_amount(end - start, 18))
        } else {
            format!("-{}", format_amount(start - end, 18))
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub run_id: Uuid,
    pub automation: AutomationId,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub accounts: Vec<AccountReport>,
}

impl BatchReport {
    pub fn failed_accounts(&self) -> usize {
        self.accounts.iter().filter(|a| a.error.is_some()).count()
    }

    pub fn transactions(&self) -> usize {
        self.accounts.iter().map(|a| a.transactions()).sum()
    }

    /// One-line outcome for the terminal
    pub fn summary(&self) -> String {
        let cycles: usize = self.accounts.iter().map(|a| a.cycles.len()).sum();
        let completed: usize = self.accounts.iter().map(|a| a.completed_cycles()).sum();
        format!(
            "{}: {} account(s), {}/{} cycle(s) completed, {} transaction(s), {} account error(s)",
            self.automation,
            self.accounts.len(),
            completed,
            cycles,
            self.transactions(),
            self.failed_accounts()
        )
    }
}

/// Plans one account runs: optional setup, then the cycle plan
#[derive(Clone, Copy)]
struct AccountPlans<'a> {
    setup: Option<&'a CyclePlan>,
    cycle: &'a CyclePlan,
}

/// Where an account sits in the pass
#[derive(Debug, Clone, Copy)]
struct AccountSlot {
    position: usize,
    total: usize,
    start_delay: Duration,
}

/// Wait before an account starts.
///
/// Sequential passes pause before every account but the first. Parallel
/// passes offset the accounts sharing a window by one switch delay each.
fn switch_delay(position: usize, parallel: usize, switch: Duration) -> Duration {
    if parallel <= 1 {
        if position > 0 {
            switch
        } else {
            Duration::ZERO
        }
    } else {
        switch * (position % parallel) as u32
    }
}

/// Runs automations over a set of credentials
pub struct BatchRunner {
    chain: Arc<dyn ChainClient>,
    config: Arc<Config>,
    cancel: CancellationToken,
}

impl BatchRunner {
    pub fn new(
        chain: Arc<dyn ChainClient>,
        config: Arc<Config>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            chain,
            config,
            cancel,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// One pass of `automation` over every credential
    pub async fn run_pass(
        &self,
        automation: &dyn Automation,
        credentials: &[Credential],
        run: &RunConfiguration,
    ) -> BatchReport {
        let started_at = Utc::now();
        let run_id = Uuid::new_v4();
        let plan = automation.plan(&self.config);
        let setup = automation.account_setup(&self.config);
        let policy = automation.account_policy(&self.config);
        let parallel = self.config.batch.max_parallel_accounts.max(1);

        info!(
            "Starting {} ({}) for {} account(s), {} cycle(s) each [run {}]",
            automation.id(),
            plan.describe(),
            credentials.len(),
            run.cycles,
            run_id
        );

        let total = credentials.len();
        let switch = Duration::from_millis(self.config.pacing.account_switch_delay_ms);
        let pending: Vec<_> = credentials
            .iter()
            .enumerate()
            .map(|(position, credential)| {
                let slot = AccountSlot {
                    position,
                    total,
                    start_delay: switch_delay(position, parallel, switch),
                };
                let plans = AccountPlans {
                    setup: setup.as_ref(),
                    cycle: &plan,
                };
                self.run_account(plans, &policy, credential, slot, run)
            })
            .collect();
        let accounts: Vec<AccountReport> = stream::iter(pending).buffered(parallel).collect().await;

        let report = BatchReport {
            run_id,
            automation: automation.id(),
            started_at,
            finished_at: Utc::now(),
            accounts,
        };
        info!("{}", report.summary());
        report
    }

    async fn run_account(
        &self,
        plans: AccountPlans<'_>,
        policy: &AccountPolicy,
        credential: &Credential,
        slot: AccountSlot,
        run: &RunConfiguration,
    ) -> AccountReport {
        let address = credential.address();
        let mut report = AccountReport {
            index: credential.index(),
            address,
            cycles_requested: run.cycles,
            setup: None,
            cycles: Vec::new(),
            error: None,
            initial_balance: None,
            final_balance: None,
        };

        if !slot.start_delay.is_zero() {
            if let Err(e) = pause(slot.start_delay, &self.cancel).await {
                report.error = Some(e.to_string());
                return report;
            }
        }
        if self.cancel.is_cancelled() {
            report.error = Some(Error::Cancelled.to_string());
            return report;
        }

        info!(
            "=== Account {}/{}: {} ===",
            slot.position + 1,
            slot.total,
            short_address(&address)
        );
        report.initial_balance = self.native_balance(address).await;

        let seed = self
            .config
            .batch
            .seed
            .map(|s| s.wrapping_add(credential.index() as u64));
        let mut rng = Randomizer::new(seed);
        let orchestrator = CycleOrchestrator::new(
            credential,
            self.chain.as_ref(),
            &self.config,
            run,
            &self.cancel,
        );

        if let Some(setup) = plans.setup {
            info!("[{}] Account setup: {}", short_address(&address), setup.describe());
            let setup_report = orchestrator.run(setup, &mut rng, 0).await;
            let cancelled = setup_report.was_cancelled();
            if !setup_report.is_completed() && !cancelled {
                warn!("[{}] Account setup did not complete", short_address(&address));
            }
            report.setup = Some(setup_report);
            if cancelled {
                report.error = Some(Error::Cancelled.to_string());
                report.final_balance = self.native_balance(address).await;
                return report;
            }
        }

        for cycle in 1..=run.cycles {
            if cycle > 1 {
                if let Some(p) = &policy.inter_cycle_pause {
                    let duration = p.duration(&mut rng);
                    info!(
                        "[{}] Next cycle in {:.0}s",
                        short_address(&address),
                        duration.as_secs_f64()
                    );
                    if let Err(e) = pause(duration, &self.cancel).await {
                        report.error = Some(e.to_string());
                        break;
                    }
                }
            }

            info!(
                "[{}] Cycle {}/{}",
                short_address(&address),
                cycle,
                run.cycles
            );
            let cycle_report = orchestrator.run(plans.cycle, &mut rng, cycle).await;
            let completed = cycle_report.is_completed();
            let cancelled = cycle_report.was_cancelled();
            report.cycles.push(cycle_report);

            if completed {
                info!("[{}] Cycle {} completed", short_address(&address), cycle);
                continue;
            }
            if cancelled {
                report.error = Some(Error::Cancelled.to_string());
                break;
            }
            match policy.on_cycle_abort {
                CycleAbortPolicy::ContinueCycles => {
                    warn!(
                        "[{}] Cycle {} aborted, moving to the next cycle",
                        short_address(&address),
                        cycle
                    );
                }
                CycleAbortPolicy::SkipRemainingCycles => {
                    warn!(
                        "[{}] Cycle {} aborted, skipping the remaining cycles",
                        short_address(&address),
                        cycle
                    );
                    report.error = Some(format!(
                        "cycle {} of {} aborted; remaining cycles skipped",
                        cycle, run.cycles
                    ));
                    break;
                }
            }
        }

        report.final_balance = self.native_balance(address).await;
        if let Some(change) = report.balance_change() {
            info!(
                "[{}] Balance change: {} MON ({} completed of {} cycle(s))",
                short_address(&address),
                change,
                report.completed_cycles(),
                run.cycles
            );
        }
        report
    }

    async fn native_balance(&self, address: Address) -> Option<U256> {
        match self.chain.balance(address).await {
            Ok(balance) => {
                info!(
                    "[{}] Balance: {} MON",
                    short_address(&address),
                    format_amount(balance, 18)
                );
                Some(balance)
            }
            Err(e) => {
                warn!("[{}] Could not read balance: {}", short_address(&address), e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::ActionOutcome;
    use crate::cycle::{CycleStatus, CycleStep};
    use crate::testing::{fast_config, ok_receipt, test_credential, FnPrimitive, ScriptedChain};
    use alloy::primitives::utils::parse_ether;

    struct Scripted {
        step: Arc<FnPrimitive>,
        on_cycle_abort: CycleAbortPolicy,
    }

    impl Automation for Scripted {
        fn id(&self) -> AutomationId {
            AutomationId::Kintsu
        }

        fn plan(&self, _config: &Config) -> CyclePlan {
            CyclePlan::new(vec![CycleStep::fatal(self.step.clone())])
        }

        fn account_policy(&self, _config: &Config) -> AccountPolicy {
            AccountPolicy {
                on_cycle_abort: self.on_cycle_abort,
                inter_cycle_pause: None,
            }
        }
    }

    struct WithSetup {
        setup: Arc<FnPrimitive>,
        step: Arc<FnPrimitive>,
    }

    impl Automation for WithSetup {
        fn id(&self) -> AutomationId {
            AutomationId::Beanswap
        }

        fn plan(&self, _config: &Config) -> CyclePlan {
            CyclePlan::new(vec![CycleStep::fatal(self.step.clone())])
        }

        fn account_policy(&self, _config: &Config) -> AccountPolicy {
            AccountPolicy {
                on_cycle_abort: CycleAbortPolicy::ContinueCycles,
                inter_cycle_pause: None,
            }
        }

        fn account_setup(&self, _config: &Config) -> Option<CyclePlan> {
            Some(CyclePlan::new(vec![CycleStep::soft(self.setup.clone())]))
        }
    }

    fn fails_for_account_2_cycle_2() -> Arc<FnPrimitive> {
        FnPrimitive::new("stake", |ctx| {
            if ctx.credential.index() == 2 && ctx.cycle == 2 {
                Err(Error::Submission("replacement underpriced".into()))
            } else {
                Ok(ActionOutcome::Executed(ok_receipt(1)))
            }
        })
    }

    fn fails_for_account_2_cycle_1() -> Arc<FnPrimitive> {
        FnPrimitive::new("swap", |ctx| {
            if ctx.credential.index() == 2 && ctx.cycle == 1 {
                Err(Error::Submission("nonce too low".into()))
            } else {
                Ok(ActionOutcome::Executed(ok_receipt(1)))
            }
        })
    }

    fn runner(config: Config, cancel: CancellationToken) -> (Arc<ScriptedChain>, BatchRunner) {
        let chain = Arc::new(ScriptedChain::new());
        let runner = BatchRunner::new(chain.clone(), Arc::new(config), cancel);
        (chain, runner)
    }

    fn credentials() -> Vec<Credential> {
        (1..=3).map(test_credential).collect()
    }

    #[tokio::test]
    async fn test_abort_skips_only_that_account() {
        let (_, runner) = runner(fast_config(), CancellationToken::new());
        let automation = Scripted {
            step: fails_for_account_2_cycle_2(),
            on_cycle_abort: CycleAbortPolicy::SkipRemainingCycles,
        };
        let run = RunConfiguration::new(2, None, 1).unwrap();

        let report = runner.run_pass(&automation, &credentials(), &run).await;

        assert_eq!(report.accounts.len(), 3);
        assert_eq!(report.accounts[0].completed_cycles(), 2);

        let second = &report.accounts[1];
        assert_eq!(second.cycles.len(), 2);
        assert_eq!(second.completed_cycles(), 1);
        assert_eq!(second.cycles[1].status, CycleStatus::Aborted);
        assert!(second.error.is_some());

        assert_eq!(report.accounts[2].completed_cycles(), 2);
        assert!(report.accounts[2].error.is_none());
        assert_eq!(report.failed_accounts(), 1);
    }

    #[tokio::test]
    async fn test_first_cycle_failure_keeps_batch_going() {
        let (_, runner) = runner(fast_config(), CancellationToken::new());
        let automation = Scripted {
            step: fails_for_account_2_cycle_1(),
            on_cycle_abort: CycleAbortPolicy::ContinueCycles,
        };
        let run = RunConfiguration::new(2, None, 1).unwrap();

        let report = runner.run_pass(&automation, &credentials(), &run).await;

        let second = &report.accounts[1];
        assert_eq!(second.cycles.len(), 2);
        assert_eq!(second.cycles[0].status, CycleStatus::Aborted);
        assert!(second.cycles[1].is_completed());
        assert_eq!(second.completed_cycles(), 1);
        assert!(second.error.is_none());

        let third = &report.accounts[2];
        assert_eq!(third.cycles.len(), 2);
        assert_eq!(third.completed_cycles(), 2);
        assert_eq!(report.failed_accounts(), 0);
        assert!(report.summary().contains("5/6 cycle(s) completed"));
    }

    #[tokio::test]
    async fn test_setup_runs_once_per_account() {
        let (_, runner) = runner(fast_config(), CancellationToken::new());
        let automation = WithSetup {
            setup: FnPrimitive::succeeding("sweep"),
            step: FnPrimitive::succeeding("swap"),
        };
        let run = RunConfiguration::new(3, None, 1).unwrap();

        let report = runner.run_pass(&automation, &credentials(), &run).await;

        assert_eq!(automation.setup.calls(), 3);
        assert_eq!(automation.step.calls(), 9);
        let first = &report.accounts[0];
        assert!(first.setup.as_ref().unwrap().is_completed());
        assert_eq!(first.completed_cycles(), 3);
        assert_eq!(first.transactions(), 4);
    }

    #[tokio::test]
    async fn test_failed_setup_still_runs_cycles() {
        let (_, runner) = runner(fast_config(), CancellationToken::new());
        let automation = WithSetup {
            setup: FnPrimitive::failing("sweep"),
            step: FnPrimitive::succeeding("swap"),
        };

        let report = runner
            .run_pass(&automation, &[test_credential(1)], &RunConfiguration::once())
            .await;
        let account = &report.accounts[0];
        assert!(account.setup.is_some());
        assert_eq!(account.completed_cycles(), 1);
        assert!(account.error.is_none());
    }

    #[test]
    fn test_switch_delay_sequential() {
        let switch = Duration::from_secs(3);
        assert_eq!(switch_delay(0, 1, switch), Duration::ZERO);
        assert_eq!(switch_delay(1, 1, switch), switch);
        assert_eq!(switch_delay(7, 1, switch), switch);
    }

    #[test]
    fn test_switch_delay_staggers_parallel_starts() {
        let switch = Duration::from_secs(3);
        let delays: Vec<Duration> = (0..4).map(|p| switch_delay(p, 3, switch)).collect();
        assert_eq!(
            delays,
            vec![
                Duration::ZERO,
                Duration::from_secs(3),
                Duration::from_secs(6),
                Duration::ZERO
            ]
        );
    }

    #[tokio::test]
    async fn test_continue_policy_runs_every_cycle() {
        let (_, runner) = runner(fast_config(), CancellationToken::new());
        let step = FnPrimitive::failing("wrap");
        let automation = Scripted {
            step: step.clone(),
            on_cycle_abort: CycleAbortPolicy::ContinueCycles,
        };
        let run = RunConfiguration::new(3, None, 1).unwrap();

        let report = runner
            .run_pass(&automation, &[test_credential(1)], &run)
            .await;
        assert_eq!(report.accounts[0].cycles.len(), 3);
        assert!(report.accounts[0].error.is_none());
        assert_eq!(step.calls(), 3);
    }

    #[tokio::test]
    async fn test_parallel_keeps_account_order() {
        let mut config = fast_config();
        config.batch.max_parallel_accounts = 3;
        let (_, runner) = runner(config, CancellationToken::new());
        let automation = Scripted {
            step: fails_for_account_2_cycle_2(),
            on_cycle_abort: CycleAbortPolicy::SkipRemainingCycles,
        };
        let run = RunConfiguration::new(2, None, 1).unwrap();

        let report = runner.run_pass(&automation, &credentials(), &run).await;
        let order: Vec<usize> = report.accounts.iter().map(|a| a.index).collect();
        assert_eq!(order, vec![1, 2, 3]);
        assert_eq!(report.accounts[1].completed_cycles(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_pass_runs_nothing() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let (_, runner) = runner(fast_config(), cancel);
        let step = FnPrimitive::succeeding("stake");
        let automation = Scripted {
            step: step.clone(),
            on_cycle_abort: CycleAbortPolicy::ContinueCycles,
        };

        let report = runner
            .run_pass(&automation, &credentials(), &RunConfiguration::once())
            .await;
        assert_eq!(report.failed_accounts(), 3);
        assert_eq!(step.calls(), 0);
    }

    #[tokio::test]
    async fn test_records_balances() {
        let (chain, runner) = runner(fast_config(), CancellationToken::new());
        let cred = test_credential(1);
        chain.set_native_balance(cred.address(), parse_ether("2.5").unwrap());
        let automation = Scripted {
            step: FnPrimitive::succeeding("stake"),
            on_cycle_abort: CycleAbortPolicy::ContinueCycles,
        };

        let report = runner
            .run_pass(&automation, &[cred], &RunConfiguration::once())
            .await;
        let account = &report.accounts[0];
        assert_eq!(account.initial_balance, Some(parse_ether("2.5").unwrap()));
        assert!(account.balance_change().unwrap().starts_with("+0"));
    }

    #[tokio::test]
    async fn test_balance_read_failure_is_not_fatal() {
        let (chain, runner) = runner(fast_config(), CancellationToken::new());
        chain.fail_balance_reads("connection refused");
        let automation = Scripted {
            step: FnPrimitive::succeeding("stake"),
            on_cycle_abort: CycleAbortPolicy::ContinueCycles,
        };

        let report = runner
            .run_pass(&automation, &[test_credential(1)], &RunConfiguration::once())
            .await;
        let account = &report.accounts[0];
        assert!(account.initial_balance.is_none());
        assert_eq!(account.completed_cycles(), 1);
        assert!(report.summary().contains("1/1 cycle(s) completed"));
    }
}
