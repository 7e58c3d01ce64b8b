//! Apriori withdrawal claims
//!
//! Eligibility comes from the Apriori status API. An unreachable API is
//! treated the same as "nothing to claim".

use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{Address, U256};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{send_and_confirm, ActionKind, ActionOutcome, ActionPrimitive, StepContext};
use crate::chain::{abi, ActionRequest};
use crate::error::{Error, Result};

/// One withdrawal request as reported by the status API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawalRequest {
    pub id: u64,
    #[serde(default)]
    pub claimed: bool,
    #[serde(default)]
    pub is_claimable: bool,
}

impl WithdrawalRequest {
    pub fn ready(&self) -> bool {
        !self.claimed && self.is_claimable
    }
}

/// Where claim eligibility comes from
#[async_trait]
pub trait ClaimStatusSource: Send + Sync {
    async fn pending_requests(&self, owner: Address) -> Result<Vec<WithdrawalRequest>>;
}

/// HTTP client for `GET {base}?address=0x...`
pub struct AprioriStatusClient {
    client: reqwest::Client,
    base_url: String,
}

impl AprioriStatusClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }
}

#[async_trait]
impl ClaimStatusSource for AprioriStatusClient {
    async fn pending_requests(&self, owner: Address) -> Result<Vec<WithdrawalRequest>> {
        let url = format!("{}?address={}", self.base_url, owner);
        debug!("Fetching withdrawal requests: {}", url);

        let resp = self.client.get(&url).send().await?;
        if !resp.status().is_success() {
            return Err(Error::Http(format!(
                "status API returned {}",
                resp.status()
            )));
        }
        let requests: Vec<WithdrawalRequest> = resp.json().await?;
        Ok(requests)
    }
}

/// Claim every ready withdrawal request, or no-op when there is none
pub struct Claim {
    status: Arc<dyn ClaimStatusSource>,
}

impl Claim {
    pub fn new(status: Arc<dyn ClaimStatusSource>) -> Self {
        Self { status }
    }
}

#[async_trait]
impl ActionPrimitive for Claim {
    fn name(&self) -> &str {
        "apriori-claim"
    }

    fn kind(&self) -> ActionKind {
        ActionKind::Claim
    }

    async fn execute(&self, ctx: &mut StepContext<'_>) -> Result<ActionOutcome> {
        let owner = ctx.credential.address();
        let requests = match self.status.pending_requests(owner).await {
            Ok(requests) => requests,
            Err(e) => {
                warn!("{} Claim status unavailable: {}", ctx.tag(), e);
                Vec::new()
            }
        };

        let ids: Vec<U256> = requests
            .iter()
            .filter(|r| r.ready())
            .map(|r| U256::from(r.id))
            .collect();
        if ids.is_empty() {
            info!("{} No claimable withdrawal requests yet", ctx.tag());
            return Ok(ActionOutcome::noop("no claimable withdrawal request"));
        }

        info!("{} Claiming withdrawal request(s) {:?}", ctx.tag(), ids);
        let request = ActionRequest::new(
            ctx.config.contracts.apriori_vault,
            abi::apriori_claim(ids, owner),
        )
        .gas_limit(ctx.config.apriori.claim_gas_limit);

        let receipt = send_and_confirm(ctx, "apriori-claim", request).await?;
        Ok(ActionOutcome::Executed(receipt))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{test_credential, ScriptedChain, TestHarness};

    struct FixedStatus(Result<Vec<WithdrawalRequest>>);

    #[async_trait]
    impl ClaimStatusSource for FixedStatus {
        async fn pending_requests(&self, _owner: Address) -> Result<Vec<WithdrawalRequest>> {
            match &self.0 {
                Ok(list) => Ok(list.clone()),
                Err(e) => Err(Error::Http(e.to_string())),
            }
        }
    }

    fn request(id: u64, claimed: bool, is_claimable: bool) -> WithdrawalRequest {
        WithdrawalRequest {
            id,
            claimed,
            is_claimable,
        }
    }

    #[test]
    fn test_parse_status_payload() {
        let json = r#"[{"id": 12, "claimed": false, "is_claimable": true, "amount": "100"}]"#;
        let parsed: Vec<WithdrawalRequest> = serde_json::from_str(json).unwrap();
        assert_eq!(parsed, vec![request(12, false, true)]);
        assert!(parsed[0].ready());
    }

    #[tokio::test]
    async fn test_claims_only_ready_requests() {
        let status = Arc::new(FixedStatus(Ok(vec![
            request(1, true, true),
            request(2, false, false),
            request(3, false, true),
        ])));
        let chain = ScriptedChain::new();
        let cred = test_credential(1);
        let mut h = TestHarness::new();
        let mut ctx = h.context(&cred, &chain);

        let outcome = Claim::new(status).execute(&mut ctx).await.unwrap();
        assert!(matches!(outcome, ActionOutcome::Executed(_)));

        let sent = chain.submitted_by(cred.address());
        let (ids, receiver) = abi::decode_apriori_claim(&sent[0].data).unwrap();
        assert_eq!(ids, vec![U256::from(3u64)]);
        assert_eq!(receiver, cred.address());
    }

    #[tokio::test]
    async fn test_nothing_claimable_is_noop() {
        let status = Arc::new(FixedStatus(Ok(vec![request(1, true, true)])));
        let chain = ScriptedChain::new();
        let cred = test_credential(1);
        let mut h = TestHarness::new();
        let mut ctx = h.context(&cred, &chain);

        let outcome = Claim::new(status).execute(&mut ctx).await.unwrap();
        assert!(matches!(outcome, ActionOutcome::NoOp(_)));
        assert!(chain.submitted().is_empty());
    }

    #[tokio::test]
    async fn test_status_error_is_noop() {
        let status = Arc::new(FixedStatus(Err(Error::Http("502".into()))));
        let chain = ScriptedChain::new();
        let cred = test_credential(1);
        let mut h = TestHarness::new();
        let mut ctx = h.context(&cred, &chain);

        let outcome = Claim::new(status).execute(&mut ctx).await.unwrap();
        assert!(matches!(outcome, ActionOutcome::NoOp(_)));
    }
}
