//! shMonad deposit, redeem and bond

use alloy::primitives::U256;
use async_trait::async_trait;
use tracing::info;

use super::{send_and_confirm, ActionKind, ActionOutcome, ActionPrimitive, StepContext};
use crate::chain::{abi, format_amount, ActionRequest, AssetDescriptor};
use crate::error::Result;
use crate::pacing::random_amount;

async fn shmon_balance(ctx: &StepContext<'_>) -> Result<U256> {
    ctx.chain
        .token_balance(ctx.config.contracts.shmonad, ctx.credential.address())
        .await
}

fn percent_of(amount: U256, pct: u64) -> U256 {
    amount * U256::from(pct) / U256::from(100u64)
}

pub struct Deposit;

#[async_trait]
impl ActionPrimitive for Deposit {
    fn name(&self) -> &str {
        "shmonad-deposit"
    }

    fn kind(&self) -> ActionKind {
        ActionKind::Deposit
    }

    async fn execute(&self, ctx: &mut StepContext<'_>) -> Result<ActionOutcome> {
        let band = ctx.amount_band()?;
        let owner = ctx.credential.address();
        let amount = random_amount(
            ctx.chain,
            ctx.rng,
            owner,
            &AssetDescriptor::native("MON"),
            &band,
        )
        .await;

        info!("{} Deposit {} MON into shMonad", ctx.tag(), format_amount(amount, 18));
        let request = ActionRequest::new(
            ctx.config.contracts.shmonad,
            abi::shmonad_deposit(amount, owner),
        )
        .value(amount)
        .gas_limit(ctx.config.shmonad.deposit_gas_limit);

        let receipt = send_and_confirm(ctx, "shmonad-deposit", request).await?;
        Ok(ActionOutcome::Executed(receipt))
    }
}

/// Redeem a fixed share of the current shMON balance
pub struct Redeem;

#[async_trait]
impl ActionPrimitive for Redeem {
    fn name(&self) -> &str {
        "shmonad-redeem"
    }

    fn kind(&self) -> ActionKind {
        ActionKind::Redeem
    }

    async fn execute(&self, ctx: &mut StepContext<'_>) -> Result<ActionOutcome> {
        let balance = shmon_balance(ctx).await?;
        let shares = percent_of(balance, ctx.config.shmonad.redeem_pct);
        if shares.is_zero() {
            return Ok(ActionOutcome::noop("no shMON to redeem"));
        }

        info!("{} Redeem {} shMON", ctx.tag(), format_amount(shares, 18));
        let request = ActionRequest::new(
            ctx.config.contracts.shmonad,
            abi::shmonad_redeem(shares, ctx.credential.address()),
        )
        .gas_limit(ctx.config.shmonad.redeem_gas_limit);

        let receipt = send_and_confirm(ctx, "shmonad-redeem", request).await?;
        Ok(ActionOutcome::Executed(receipt))
    }
}

/// Bond a fixed share of the remaining shMON under the configured policy
pub struct Bond;

#[async_trait]
impl ActionPrimitive for Bond {
    fn name(&self) -> &str {
        "shmonad-bond"
    }

    fn kind(&self) -> ActionKind {
        ActionKind::Bond
    }

    async fn execute(&self, ctx: &mut StepContext<'_>) -> Result<ActionOutcome> {
        let balance = shmon_balance(ctx).await?;
        let amount = percent_of(balance, ctx.config.shmonad.bond_pct);
        if amount.is_zero() {
            return Ok(ActionOutcome::noop("no shMON to bond"));
        }

        let policy_id = ctx.config.shmonad.policy_id;
        info!(
            "{} Bond {} shMON under policy {}",
            ctx.tag(),
            format_amount(amount, 18),
            policy_id
        );
        let request = ActionRequest::new(
            ctx.config.contracts.shmonad,
            abi::shmonad_bond(policy_id, ctx.credential.address(), amount),
        )
        .gas_limit(ctx.config.shmonad.bond_gas_limit);

        let receipt = send_and_confirm(ctx, "shmonad-bond", request).await?;
        Ok(ActionOutcome::Executed(receipt))
    }
}
