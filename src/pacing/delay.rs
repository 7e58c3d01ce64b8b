//! Random pauses between actions

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::Randomizer;
use crate::error::{Error, Result};

/// Inclusive millisecond range for a random pause
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayBand {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl DelayBand {
    pub const fn new(min_ms: u64, max_ms: u64) -> Self {
        Self { min_ms, max_ms }
    }
}

impl Randomizer {
    /// Delay with a whole-millisecond length in the band
    pub fn delay(&mut self, band: DelayBand) -> Duration {
        Duration::from_millis(self.gen_millis(band.min_ms, band.max_ms))
    }
}

/// Sleep for `duration` unless `cancel` fires first
pub async fn pause(duration: Duration, cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }
    if duration.is_zero() {
        return Ok(());
    }
    debug!("Pausing for {:.1}s", duration.as_secs_f64());
    tokio::select! {
        _ = tokio::time::sleep(duration) => Ok(()),
        _ = cancel.cancelled() => Err(Error::Cancelled),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_within_bounds() {
        let mut rng = Randomizer::new(Some(9));
        let band = DelayBand::new(30_000, 60_000);
        for _ in 0..500 {
            let d = rng.delay(band);
            assert!(d >= Duration::from_millis(30_000));
            assert!(d <= Duration::from_millis(60_000));
            assert_eq!(d.subsec_nanos() % 1_000_000, 0);
        }
    }

    #[test]
    fn test_fixed_band() {
        let mut rng = Randomizer::new(Some(9));
        assert_eq!(
            rng.delay(DelayBand::new(3_000, 3_000)),
            Duration::from_millis(3_000)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_completes() {
        let cancel = CancellationToken::new();
        assert!(pause(Duration::from_secs(30), &cancel).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_cancelled() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            trigger.cancel();
        });
        let result = pause(Duration::from_secs(3600), &cancel).await;
        assert!(matches!(result, Err(Error::Cancelled)));
    }

    #[tokio::test]
    async fn test_pause_already_cancelled() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert!(matches!(
            pause(Duration::ZERO, &cancel).await,
            Err(Error::Cancelled)
        ));
    }
}
