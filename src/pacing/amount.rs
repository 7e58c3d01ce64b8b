//! Amounts as a random share of the current balance

use alloy::primitives::{Address, U256};
use tracing::{debug, warn};

use super::Randomizer;
use crate::chain::{format_amount, AssetDescriptor, ChainClient};
use crate::config::{parse_amount, TransactionLimits};
use crate::error::Result;

/// Percentage band in basis points plus the floor and fallback amounts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AmountBand {
    pub min_bps: u64,
    pub max_bps: u64,
    pub floor: U256,
    pub fallback: U256,
}

impl AmountBand {
    pub fn from_limits(limits: &TransactionLimits) -> Result<Self> {
        Ok(Self {
            min_bps: (limits.min_percentage * 100.0).round() as u64,
            max_bps: (limits.max_percentage * 100.0).round() as u64,
            floor: parse_amount(&limits.minimum_amount, 18)?,
            fallback: parse_amount(&limits.default_amount, 18)?,
        })
    }
}

/// Random amount in `[balance * min, balance * max]`.
///
/// A minimum below the floor returns the floor; an empty band returns the
/// minimum.
pub fn amount_from_balance(rng: &mut Randomizer, balance: U256, band: &AmountBand) -> U256 {
    let bps = U256::from(10_000u64);
    let min = balance.saturating_mul(U256::from(band.min_bps)) / bps;
    let max = balance.saturating_mul(U256::from(band.max_bps)) / bps;

    if min < band.floor {
        return band.floor;
    }
    if max <= min {
        return min;
    }
    rng.uniform_between(min, max)
}

/// Query a fresh balance and draw an amount from it.
///
/// Never fails: any read error logs a warning and yields the fallback amount.
pub async fn random_amount(
    chain: &dyn ChainClient,
    rng: &mut Randomizer,
    owner: Address,
    asset: &AssetDescriptor,
    band: &AmountBand,
) -> U256 {
    match chain.asset_balance(owner, asset).await {
        Ok(balance) => {
            let amount = amount_from_balance(rng, balance, band);
            debug!(
                "Balance {} -> amount {}",
                asset.display(balance),
                format_amount(amount, asset.decimals)
            );
            amount
        }
        Err(e) => {
            warn!(
                "Balance read failed ({}), using default amount {}",
                e,
                format_amount(band.fallback, asset.decimals)
            );
            band.fallback
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedChain;

    fn band(min_pct: u64, max_pct: u64, floor: u64) -> AmountBand {
        AmountBand {
            min_bps: min_pct * 100,
            max_bps: max_pct * 100,
            floor: U256::from(floor),
            fallback: U256::from(777u64),
        }
    }

    #[test]
    fn test_amount_within_band() {
        let mut rng = Randomizer::new(Some(5));
        let band = band(1, 5, 1);
        for _ in 0..200 {
            let amount = amount_from_balance(&mut rng, U256::from(1000u64), &band);
            assert!(amount >= U256::from(10u64) && amount <= U256::from(50u64));
        }
    }

    #[test]
    fn test_small_balance_returns_floor() {
        let mut rng = Randomizer::new(Some(5));
        let amount = amount_from_balance(&mut rng, U256::from(50u64), &band(1, 5, 1));
        assert_eq!(amount, U256::from(1u64));
    }

    #[test]
    fn test_equal_percentages_return_min() {
        let mut rng = Randomizer::new(Some(5));
        let amount = amount_from_balance(&mut rng, U256::from(1000u64), &band(3, 3, 1));
        assert_eq!(amount, U256::from(30u64));
    }

    #[test]
    fn test_fractional_percentages() {
        let limits = TransactionLimits {
            min_percentage: 0.5,
            max_percentage: 1.5,
            ..Default::default()
        };
        let band = AmountBand::from_limits(&limits).unwrap();
        assert_eq!(band.min_bps, 50);
        assert_eq!(band.max_bps, 150);
        assert_eq!(band.floor, parse_amount("0.01", 18).unwrap());
    }

    #[tokio::test]
    async fn test_random_amount_falls_back_on_error() {
        let chain = ScriptedChain::new();
        chain.fail_balance_reads("unavailable");
        let mut rng = Randomizer::new(Some(1));
        let amount = random_amount(
            &chain,
            &mut rng,
            Address::ZERO,
            &AssetDescriptor::native("MON"),
            &band(1, 5, 1),
        )
        .await;
        assert_eq!(amount, U256::from(777u64));
    }

    #[tokio::test]
    async fn test_random_amount_reads_balance() {
        let chain = ScriptedChain::new();
        chain.set_native_balance(Address::ZERO, U256::from(1000u64));
        let mut rng = Randomizer::new(Some(1));
        let amount = random_amount(
            &chain,
            &mut rng,
            Address::ZERO,
            &AssetDescriptor::native("MON"),
            &band(1, 5, 1),
        )
        .await;
        assert!(amount >= U256::from(10u64) && amount <= U256::from(50u64));
    }
}
