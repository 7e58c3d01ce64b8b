//! Native coin <-> WMON

use alloy::primitives::U256;
use async_trait::async_trait;
use tracing::info;

use super::{send_and_confirm, ActionKind, ActionOutcome, ActionPrimitive, StepContext};
use crate::chain::{abi, format_amount, ActionRequest, AssetDescriptor};
use crate::error::Result;
use crate::pacing::random_amount;

/// Wrap a random share of the native balance; the amount is carried to
/// [`Unwrap`]
pub struct Wrap;

#[async_trait]
impl ActionPrimitive for Wrap {
    fn name(&self) -> &str {
        "wrap"
    }

    fn kind(&self) -> ActionKind {
        ActionKind::Wrap
    }

    async fn execute(&self, ctx: &mut StepContext<'_>) -> Result<ActionOutcome> {
        let band = ctx.amount_band()?;
        let amount = random_amount(
            ctx.chain,
            ctx.rng,
            ctx.credential.address(),
            &AssetDescriptor::native("MON"),
            &band,
        )
        .await;

        info!("{} Wrap {} MON -> WMON", ctx.tag(), format_amount(amount, 18));
        let receipt = wrap_native(ctx, amount).await?;
        ctx.scratch.carried_amount = Some(amount);
        Ok(ActionOutcome::Executed(receipt))
    }
}

/// Unwrap the amount wrapped earlier in the cycle
pub struct Unwrap;

#[async_trait]
impl ActionPrimitive for Unwrap {
    fn name(&self) -> &str {
        "unwrap"
    }

    fn kind(&self) -> ActionKind {
        ActionKind::Unwrap
    }

    async fn execute(&self, ctx: &mut StepContext<'_>) -> Result<ActionOutcome> {
        let amount = match ctx.scratch.carried_amount.take() {
            Some(amount) => amount,
            None => return Ok(ActionOutcome::noop("nothing wrapped this cycle")),
        };

        info!("{} Unwrap {} WMON -> MON", ctx.tag(), format_amount(amount, 18));
        let receipt = unwrap_native(ctx, amount).await?;
        Ok(ActionOutcome::Executed(receipt))
    }
}

pub(crate) async fn wrap_native(
    ctx: &StepContext<'_>,
    amount: U256,
) -> Result<crate::chain::Receipt> {
    let request = ActionRequest::new(ctx.config.contracts.wmon, abi::wrap())
        .value(amount)
        .gas_limit(ctx.config.swap.wrap_gas_limit);
    send_and_confirm(ctx, "wrap", request).await
}

pub(crate) async fn unwrap_native(
    ctx: &StepContext<'_>,
    amount: U256,
) -> Result<crate::chain::Receipt> {
    let request = ActionRequest::new(ctx.config.contracts.wmon, abi::unwrap(amount))
        .gas_limit(ctx.config.swap.wrap_gas_limit);
    send_and_confirm(ctx, "unwrap", request).await
}
