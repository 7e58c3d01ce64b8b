//! Bean router swaps
//!
//! An account sweeps leftover tokens back to MON before its first cycle. A
//! cycle swaps along a random pair and later swaps back along the same pair.
//! Quotes are taken before anything is sent, so a missing pool costs no gas.

use alloy::primitives::{Address, U256};
use async_trait::async_trait;
use chrono::Utc;
use tracing::{info, warn};

use super::wrap::{unwrap_native, wrap_native};
use super::{
    send_and_confirm, ActionKind, ActionOutcome, ActionPrimitive, StepContext, SwapPair,
};
use crate::chain::{abi, format_amount, ActionRequest, AssetDescriptor, Receipt};
use crate::config::parse_amount;
use crate::error::{Error, Result};
use crate::pacing::{amount_from_balance, random_amount, AmountBand};

/// Share of the balance sent when swapping back to the native coin
const TO_NATIVE_PCT: u64 = 99;

fn configured_assets(ctx: &StepContext<'_>) -> Vec<AssetDescriptor> {
    ctx.config
        .swap
        .assets
        .iter()
        .map(AssetDescriptor::from)
        .collect()
}

fn native_asset(ctx: &StepContext<'_>) -> AssetDescriptor {
    configured_assets(ctx)
        .into_iter()
        .find(|a| a.is_native())
        .unwrap_or_else(|| AssetDescriptor::native("MON"))
}

/// Router path entry: the native coin routes through WMON
fn route_address(asset: &AssetDescriptor, wmon: Address) -> Address {
    asset.token_address().unwrap_or(wmon)
}

fn path_for(from: &AssetDescriptor, to: &AssetDescriptor, wmon: Address) -> Vec<Address> {
    vec![route_address(from, wmon), route_address(to, wmon)]
}

/// Minimum acceptable output after slippage
pub fn min_out(quote: U256, slippage_bps: u32) -> U256 {
    let keep = 10_000u64.saturating_sub(slippage_bps as u64);
    quote * U256::from(keep) / U256::from(10_000u64)
}

fn quote_error(from: &AssetDescriptor, to: &AssetDescriptor, reason: impl ToString) -> Error {
    Error::QuoteOrPath {
        from: from.symbol.clone(),
        to: to.symbol.clone(),
        reason: reason.to_string(),
    }
}

fn dust(ctx: &StepContext<'_>, asset: &AssetDescriptor) -> Result<U256> {
    Ok(parse_amount(&ctx.config.swap.dust_amount, asset.decimals)?)
}

/// Expected output of `amount_in` along `from -> to`
pub async fn quote(
    ctx: &StepContext<'_>,
    from: &AssetDescriptor,
    to: &AssetDescriptor,
    amount_in: U256,
) -> Result<U256> {
    let wmon = ctx.config.contracts.wmon;
    let data = abi::get_amounts_out(amount_in, path_for(from, to, wmon));
    let out = ctx
        .chain
        .call(ctx.config.contracts.bean_router, data)
        .await
        .map_err(|e| quote_error(from, to, e))?;
    let amounts = abi::decode_amounts_out(&out).map_err(|e| quote_error(from, to, e))?;

    match amounts.last() {
        Some(amount) if !amount.is_zero() => Ok(*amount),
        _ => Err(quote_error(from, to, "zero output")),
    }
}

/// Approve the router for the max amount when the allowance is short
async fn ensure_allowance(ctx: &StepContext<'_>, token: Address, amount: U256) -> Result<()> {
    let router = ctx.config.contracts.bean_router;
    let current = ctx
        .chain
        .allowance(token, ctx.credential.address(), router)
        .await?;
    if current >= amount {
        return Ok(());
    }

    info!("{} Approving {} for the router", ctx.tag(), token);
    let request = ActionRequest::new(token, abi::approve(router, U256::MAX));
    send_and_confirm(ctx, "approve", request).await?;
    Ok(())
}

/// Swap exactly `amount` of `from` into `to`.
///
/// MON <-> WMON goes straight to the WMON contract.
pub async fn swap_exact(
    ctx: &mut StepContext<'_>,
    from: &AssetDescriptor,
    to: &AssetDescriptor,
    amount: U256,
) -> Result<Receipt> {
    let wmon = ctx.config.contracts.wmon;
    if from.is_native() && to.token_address() == Some(wmon) {
        return wrap_native(ctx, amount).await;
    }
    if from.token_address() == Some(wmon) && to.is_native() {
        return unwrap_native(ctx, amount).await;
    }
    if amount.is_zero() {
        return Err(quote_error(from, to, "zero input"));
    }

    let expected = quote(ctx, from, to, amount).await?;
    let minimum = min_out(expected, ctx.config.swap.slippage_bps);

    if let Some(token) = from.token_address() {
        ensure_allowance(ctx, token, amount).await?;
    }

    info!(
        "{} Swap {} -> {}",
        ctx.tag(),
        from.display(amount),
        to.display(expected)
    );

    let owner = ctx.credential.address();
    let path = path_for(from, to, wmon);
    let deadline = U256::from(Utc::now().timestamp() as u64 + ctx.config.swap.deadline_secs);
    let (data, value) = if from.is_native() {
        (
            abi::swap_exact_eth_for_tokens(minimum, path, owner, deadline),
            amount,
        )
    } else if to.is_native() {
        (
            abi::swap_exact_tokens_for_eth(amount, minimum, path, owner, deadline),
            U256::ZERO,
        )
    } else {
        (
            abi::swap_exact_tokens_for_tokens(amount, minimum, path, owner, deadline),
            U256::ZERO,
        )
    };

    let gas_limit = ctx
        .rng
        .random_gas_limit(ctx.config.swap.gas_min, ctx.config.swap.gas_max);
    let fees = ctx.chain.fee_data().await?;
    let request = ActionRequest::new(ctx.config.contracts.bean_router, data)
        .value(value)
        .gas_limit(gas_limit)
        .fees(fees);

    let label = format!("swap {}->{}", from.symbol, to.symbol);
    send_and_confirm(ctx, &label, request).await
}

/// Amount of `asset` to swap: 99% when heading to the native coin,
/// otherwise a random share floored at dust
async fn swap_amount(
    ctx: &mut StepContext<'_>,
    asset: &AssetDescriptor,
    to_native: bool,
) -> Result<U256> {
    let limits = ctx.amount_band()?;
    let band = AmountBand {
        floor: dust(ctx, asset)?,
        fallback: parse_amount(&ctx.config.limits.default_amount, asset.decimals)?,
        ..limits
    };

    match ctx
        .chain
        .asset_balance(ctx.credential.address(), asset)
        .await
    {
        Ok(balance) if to_native => {
            Ok(balance * U256::from(TO_NATIVE_PCT) / U256::from(100u64))
        }
        Ok(balance) => Ok(amount_from_balance(ctx.rng, balance, &band)),
        Err(e) => {
            warn!("{} Balance read failed ({}), using default amount", ctx.tag(), e);
            Ok(band.fallback)
        }
    }
}

/// Buy some `asset` with MON so a swap out of it is possible
async fn top_up(ctx: &mut StepContext<'_>, asset: &AssetDescriptor) -> Result<()> {
    let native = native_asset(ctx);
    let owner = ctx.credential.address();
    let min_native = parse_amount(&ctx.config.swap.min_native_for_topup, 18)?;
    let native_balance = ctx.chain.balance(owner).await?;
    if native_balance < min_native {
        return Err(Error::InsufficientBalance {
            asset: native.symbol.clone(),
            available: format_amount(native_balance, 18),
            required: ctx.config.swap.min_native_for_topup.clone(),
        });
    }

    info!("{} {} balance too low, buying some with MON", ctx.tag(), asset.symbol);
    let band = ctx.amount_band()?;
    let amount = random_amount(ctx.chain, ctx.rng, owner, &native, &band).await;
    swap_exact(ctx, &native, asset, amount).await?;
    Ok(())
}

async fn balance_or_zero(ctx: &StepContext<'_>, asset: &AssetDescriptor) -> U256 {
    match ctx
        .chain
        .asset_balance(ctx.credential.address(), asset)
        .await
    {
        Ok(balance) => balance,
        Err(e) => {
            warn!("{} {} balance read failed: {}", ctx.tag(), asset.symbol, e);
            U256::ZERO
        }
    }
}

/// Pick two distinct assets, skipping excluded inputs
fn pick_pair(ctx: &mut StepContext<'_>) -> Result<SwapPair> {
    let candidates: Vec<AssetDescriptor> = configured_assets(ctx)
        .into_iter()
        .filter(|a| !ctx.scratch.excluded_inputs.contains(&a.symbol))
        .collect();
    if candidates.len() < 2 {
        return Err(Error::QuoteOrPath {
            from: "*".to_string(),
            to: "*".to_string(),
            reason: "not enough assets left to pick a pair".to_string(),
        });
    }

    let len = candidates.len();
    let a = ctx.rng.pick_index(len).unwrap_or(0);
    let offset = ctx.rng.pick_index(len - 1).unwrap_or(0);
    let b = (a + 1 + offset) % len;

    Ok(SwapPair {
        from: candidates[a].clone(),
        to: candidates[b].clone(),
    })
}

/// Swap a random amount along a random pair.
///
/// On failure the input asset is recorded as excluded so a retry picks a
/// different pair. A successful retry leaves no pair for the reverse step.
pub struct ForwardSwap;

impl ForwardSwap {
    async fn attempt(ctx: &mut StepContext<'_>, pair: &SwapPair) -> Result<Receipt> {
        let from = &pair.from;
        let to = &pair.to;

        let balance = balance_or_zero(ctx, from).await;
        info!("{} {} balance: {}", ctx.tag(), from.symbol, from.display(balance));
        let dust = dust(ctx, from)?;
        if balance >= dust {
            let amount = swap_amount(ctx, from, to.is_native()).await?;
            return swap_exact(ctx, from, to, amount).await;
        }
        if from.is_native() {
            return Err(Error::InsufficientBalance {
                asset: from.symbol.clone(),
                available: format_amount(balance, from.decimals),
                required: ctx.config.swap.dust_amount.clone(),
            });
        }

        // Buying the input is only worth it when the pair routes
        check_route(ctx, from, to, dust).await?;
        top_up(ctx, from).await?;

        let swapped = match swap_amount(ctx, from, to.is_native()).await {
            Ok(amount) => swap_exact(ctx, from, to, amount).await,
            Err(e) => Err(e),
        };
        swapped.map_err(|e| after_top_up(from, e))
    }
}

/// Mark a failure that followed a successful top-up
fn after_top_up(asset: &AssetDescriptor, e: Error) -> Error {
    match e {
        Error::Cancelled => e,
        e => Error::AfterTopUp {
            asset: asset.symbol.clone(),
            source: Box::new(e),
        },
    }
}

/// Quote `from -> to` without sending anything; MON <-> WMON always routes
async fn check_route(
    ctx: &StepContext<'_>,
    from: &AssetDescriptor,
    to: &AssetDescriptor,
    amount: U256,
) -> Result<()> {
    let wmon = ctx.config.contracts.wmon;
    let direct = (from.is_native() && to.token_address() == Some(wmon))
        || (from.token_address() == Some(wmon) && to.is_native());
    if !direct {
        quote(ctx, from, to, amount).await?;
    }
    Ok(())
}

#[async_trait]
impl ActionPrimitive for ForwardSwap {
    fn name(&self) -> &str {
        "swap"
    }

    fn kind(&self) -> ActionKind {
        ActionKind::ForwardSwap
    }

    async fn execute(&self, ctx: &mut StepContext<'_>) -> Result<ActionOutcome> {
        let pair = pick_pair(ctx)?;
        info!(
            "{} Selected pair {} -> {}{}",
            ctx.tag(),
            pair.from.symbol,
            pair.to.symbol,
            if ctx.attempt > 0 { " (retry)" } else { "" }
        );

        match Self::attempt(ctx, &pair).await {
            Ok(receipt) => {
                if ctx.attempt == 0 {
                    ctx.scratch.pair = Some(pair);
                }
                Ok(ActionOutcome::Executed(receipt))
            }
            Err(e) => {
                ctx.scratch.excluded_inputs.push(pair.from.symbol.clone());
                Err(e)
            }
        }
    }
}

/// Swap back along the pair chosen by [`ForwardSwap`]
pub struct ReverseSwap;

#[async_trait]
impl ActionPrimitive for ReverseSwap {
    fn name(&self) -> &str {
        "reverse-swap"
    }

    fn kind(&self) -> ActionKind {
        ActionKind::ReverseSwap
    }

    async fn execute(&self, ctx: &mut StepContext<'_>) -> Result<ActionOutcome> {
        let pair = match ctx.scratch.pair.take() {
            Some(pair) => pair,
            None => return Ok(ActionOutcome::noop("no forward swap to reverse")),
        };
        let from = &pair.to;
        let to = &pair.from;

        let balance = balance_or_zero(ctx, from).await;
        let topped_up = balance < dust(ctx, from)?;
        if topped_up {
            if from.is_native() {
                return Ok(ActionOutcome::noop("MON balance too low to reverse"));
            }
            if let Err(e) = top_up(ctx, from).await {
                if matches!(e, Error::Cancelled) {
                    return Err(e);
                }
                warn!("{} Could not top up {}: {}", ctx.tag(), from.symbol, e);
                return Ok(ActionOutcome::noop(format!(
                    "no {} to swap back",
                    from.symbol
                )));
            }
        }

        let swapped = match swap_amount(ctx, from, to.is_native()).await {
            Ok(amount) => swap_exact(ctx, from, to, amount).await,
            Err(e) => Err(e),
        };
        match swapped {
            Ok(receipt) => Ok(ActionOutcome::Executed(receipt)),
            Err(e) if topped_up => Err(after_top_up(from, e)),
            Err(e) => Err(e),
        }
    }
}

/// Convert token holdings worth more than the sweep threshold back to MON.
///
/// Per-token failures are logged and skipped.
pub struct Sweep;

#[async_trait]
impl ActionPrimitive for Sweep {
    fn name(&self) -> &str {
        "sweep"
    }

    fn kind(&self) -> ActionKind {
        ActionKind::Sweep
    }

    async fn execute(&self, ctx: &mut StepContext<'_>) -> Result<ActionOutcome> {
        let threshold = parse_amount(&ctx.config.swap.sweep_threshold, 18)?;
        let wmon = ctx.config.contracts.wmon;
        let native = native_asset(ctx);
        let mut last_receipt = None;

        for asset in configured_assets(ctx) {
            if ctx.cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            let is_wmon = asset.token_address() == Some(wmon);
            if asset.is_native() {
                continue;
            }

            let balance = balance_or_zero(ctx, &asset).await;
            if balance.is_zero() {
                continue;
            }

            let value = if is_wmon {
                balance
            } else {
                match quote(ctx, &asset, &native, balance).await {
                    Ok(value) => value,
                    Err(e) => {
                        warn!("{} Could not value {}: {}", ctx.tag(), asset.symbol, e);
                        continue;
                    }
                }
            };
            info!(
                "{} {} balance {} (~{} MON)",
                ctx.tag(),
                asset.symbol,
                asset.display(balance),
                format_amount(value, 18)
            );
            if value <= threshold {
                continue;
            }

            let amount = balance * U256::from(TO_NATIVE_PCT) / U256::from(100u64);
            match swap_exact(ctx, &asset, &native, amount).await {
                Ok(receipt) => last_receipt = Some(receipt),
                Err(Error::Cancelled) => return Err(Error::Cancelled),
                Err(e) => warn!("{} Sweep of {} failed: {}", ctx.tag(), asset.symbol, e),
            }
        }

        Ok(match last_receipt {
            Some(receipt) => ActionOutcome::Executed(receipt),
            None => ActionOutcome::noop("nothing above the sweep threshold"),
        })
    }
}
