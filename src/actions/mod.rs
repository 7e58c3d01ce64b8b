//! Action primitives
//!
//! Each primitive performs at most one logical on-chain action for the
//! current credential and reports either a confirmed receipt or a no-op.
//!
//! # Primitives
//!
//! | Primitive | Contract |
//! |---|---|
//! | `Wrap` / `Unwrap` | WMON |
//! | `VaultStake` / `VaultUnstake` / `Claim` | Apriori vault |
//! | `Stake` / `Unstake` | Kintsu |
//! | `Deposit` / `Redeem` / `Bond` | shMonad |
//! | `ForwardSwap` / `ReverseSwap` / `Sweep` | Bean router |

pub mod claim;
pub mod staking;
pub mod swap;
pub mod transaction;
pub mod vault;
pub mod wrap;

use alloy::primitives::U256;
use async_trait::async_trait;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::chain::{AssetDescriptor, ChainClient, Receipt};
use crate::config::{Config, RunConfiguration};
use crate::error::Result;
use crate::pacing::{AmountBand, Randomizer};
use crate::wallet::Credential;

pub use claim::{AprioriStatusClient, ClaimStatusSource, WithdrawalRequest};
pub use transaction::send_and_confirm;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Wrap,
    Unwrap,
    VaultStake,
    VaultUnstake,
    Claim,
    Stake,
    Unstake,
    Deposit,
    Redeem,
    Bond,
    ForwardSwap,
    ReverseSwap,
    Sweep,
}

/// Successful result of a primitive
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    Executed(Receipt),
    /// Eligibility not met; nothing was sent
    NoOp(String),
}

impl ActionOutcome {
    pub fn noop(reason: impl Into<String>) -> Self {
        ActionOutcome::NoOp(reason.into())
    }
}

/// Swap direction chosen by the forward step, read by the reverse step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapPair {
    pub from: AssetDescriptor,
    pub to: AssetDescriptor,
}

/// State carried between the steps of one cycle; dropped when it ends
#[derive(Debug, Default, Clone)]
pub struct CycleScratch {
    /// Amount handed from one step to the next (staked, wrapped)
    pub carried_amount: Option<U256>,
    pub pair: Option<SwapPair>,
    /// Input assets that already failed this cycle
    pub excluded_inputs: Vec<String>,
}

/// Everything a primitive may touch while it runs
pub struct StepContext<'a> {
    pub credential: &'a Credential,
    pub chain: &'a dyn ChainClient,
    pub config: &'a Config,
    pub run: &'a RunConfiguration,
    pub rng: &'a mut Randomizer,
    pub cancel: &'a CancellationToken,
    /// 1-based cycle number
    pub cycle: u32,
    /// 0 on the first try, 1 on a retry with an alternate pair
    pub attempt: u32,
    pub scratch: CycleScratch,
}

impl StepContext<'_> {
    /// Percentage band from `[limits]`
    pub fn amount_band(&self) -> Result<AmountBand> {
        AmountBand::from_limits(&self.config.limits)
    }

    /// Log prefix, e.g. `[0x1234...abcd #2]`
    pub fn tag(&self) -> String {
        format!("[{} #{}]", self.credential.short_address(), self.cycle)
    }
}

/// One kind of on-chain action
#[async_trait]
pub trait ActionPrimitive: Send + Sync {
    fn name(&self) -> &str;

    fn kind(&self) -> ActionKind;

    async fn execute(&self, ctx: &mut StepContext<'_>) -> Result<ActionOutcome>;
}
