//! Liquid staking: Apriori vault and Kintsu

use alloy::primitives::U256;
use async_trait::async_trait;
use tracing::info;

use super::{send_and_confirm, ActionKind, ActionOutcome, ActionPrimitive, StepContext};
use crate::chain::{abi, format_amount, ActionRequest, AssetDescriptor, FeeData};
use crate::config::parse_amount;
use crate::error::Result;
use crate::pacing::random_amount;

/// Deposit a random share of MON into the Apriori vault
pub struct VaultStake;

#[async_trait]
impl ActionPrimitive for VaultStake {
    fn name(&self) -> &str {
        "apriori-stake"
    }

    fn kind(&self) -> ActionKind {
        ActionKind::VaultStake
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

        info!("{} Stake {} MON into Apriori", ctx.tag(), format_amount(amount, 18));
        let request = ActionRequest::new(
            ctx.config.contracts.apriori_vault,
            abi::apriori_deposit(amount, owner),
        )
        .value(amount)
        .gas_limit(ctx.config.apriori.stake_gas_limit);

        let receipt = send_and_confirm(ctx, "apriori-stake", request).await?;
        ctx.scratch.carried_amount = Some(amount);
        Ok(ActionOutcome::Executed(receipt))
    }
}

/// Request redemption of the shares minted earlier in the cycle
pub struct VaultUnstake;

#[async_trait]
impl ActionPrimitive for VaultUnstake {
    fn name(&self) -> &str {
        "apriori-unstake"
    }

    fn kind(&self) -> ActionKind {
        ActionKind::VaultUnstake
    }

    async fn execute(&self, ctx: &mut StepContext<'_>) -> Result<ActionOutcome> {
        let shares = match ctx.scratch.carried_amount {
            Some(shares) if !shares.is_zero() => shares,
            _ => return Ok(ActionOutcome::noop("nothing staked this cycle")),
        };
        let owner = ctx.credential.address();

        info!("{} Request unstake of {} aprMON", ctx.tag(), format_amount(shares, 18));
        let request = ActionRequest::new(
            ctx.config.contracts.apriori_vault,
            abi::apriori_request_redeem(shares, owner),
        )
        .gas_limit(ctx.config.apriori.unstake_gas_limit);

        let receipt = send_and_confirm(ctx, "apriori-unstake", request).await?;
        Ok(ActionOutcome::Executed(receipt))
    }
}

/// Random gas limit and bumped fees shared by Kintsu calls
async fn kintsu_gas(ctx: &mut StepContext<'_>) -> Result<(u64, FeeData)> {
    let cfg = &ctx.config.kintsu;
    let gas_limit = ctx.rng.random_gas_limit(cfg.gas_min, cfg.gas_max);
    let fees = ctx.chain.fee_data().await?.bumped(cfg.fee_bump_pct);
    Ok((gas_limit, fees))
}

/// Stake a fixed-band amount with Kintsu, paying a bumped fee
pub struct Stake;

#[async_trait]
impl ActionPrimitive for Stake {
    fn name(&self) -> &str {
        "kintsu-stake"
    }

    fn kind(&self) -> ActionKind {
        ActionKind::Stake
    }

    async fn execute(&self, ctx: &mut StepContext<'_>) -> Result<ActionOutcome> {
        let cfg = &ctx.config.kintsu;
        let min = parse_amount(&cfg.stake_min, 18)?;
        let max = parse_amount(&cfg.stake_max, 18)?;
        let amount = ctx.rng.uniform_between(min, max);
        let (gas_limit, fees) = kintsu_gas(ctx).await?;

        info!("{} Stake {} MON with Kintsu", ctx.tag(), format_amount(amount, 18));
        let request = ActionRequest::new(ctx.config.contracts.kintsu, abi::kintsu_stake())
            .value(amount)
            .gas_limit(gas_limit)
            .fees(fees);

        let receipt = send_and_confirm(ctx, "kintsu-stake", request).await?;
        ctx.scratch.carried_amount = Some(amount);
        Ok(ActionOutcome::Executed(receipt))
    }
}

/// Unstake the run's token id once the sMON balance clears the threshold
pub struct Unstake;

#[async_trait]
impl ActionPrimitive for Unstake {
    fn name(&self) -> &str {
        "kintsu-unstake"
    }

    fn kind(&self) -> ActionKind {
        ActionKind::Unstake
    }

    async fn execute(&self, ctx: &mut StepContext<'_>) -> Result<ActionOutcome> {
        let contract = ctx.config.contracts.kintsu;
        let threshold = parse_amount(&ctx.config.kintsu.unstake_threshold, 18)?;
        let smon = ctx
            .chain
            .token_balance(contract, ctx.credential.address())
            .await?;

        info!("{} sMON balance: {}", ctx.tag(), format_amount(smon, 18));
        if smon <= threshold {
            return Ok(ActionOutcome::noop(format!(
                "sMON balance {} at or below {}",
                format_amount(smon, 18),
                ctx.config.kintsu.unstake_threshold
            )));
        }

        let token_id = U256::from(ctx.run.kintsu_token_id);
        let (gas_limit, fees) = kintsu_gas(ctx).await?;
        let request = ActionRequest::new(contract, abi::kintsu_unstake(token_id))
            .gas_limit(gas_limit)
            .fees(fees);

        let receipt = send_and_confirm(ctx, "kintsu-unstake", request).await?;
        Ok(ActionOutcome::Executed(receipt))
    }
}
