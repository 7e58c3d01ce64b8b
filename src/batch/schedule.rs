//! Recurring passes
//!
//! A pass runs, its report is published on a channel, then the task sleeps
//! for the interval and starts over. Without an interval the task runs one
//! pass and exits. Dropping the receiver or cancelling the token stops it.

use std::future::Future;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

const REPORT_CHANNEL_CAPACITY: usize = 8;

/// Spawn the recurring task; returns its handle and the report stream
pub fn spawn_recurring<T, F, Fut>(
    interval: Option<Duration>,
    cancel: CancellationToken,
    mut pass: F,
) -> (JoinHandle<()>, mpsc::Receiver<T>)
where
    T: Send + 'static,
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = T> + Send + 'static,
{
    let (tx, rx) = mpsc::channel(REPORT_CHANNEL_CAPACITY);

    let handle = tokio::spawn(async move {
        let mut pass_number: u64 = 0;
        loop {
            if cancel.is_cancelled() {
                break;
            }
            pass_number += 1;
            info!("Starting pass {}", pass_number);

            let report = pass().await;
            if tx.send(report).await.is_err() {
                debug!("Report receiver dropped, stopping schedule");
                break;
            }

            let Some(interval) = interval else {
                break;
            };
            let next = chrono::Duration::from_std(interval)
                .map(|d| (Utc::now() + d).format("%Y-%m-%d %H:%M:%S UTC").to_string())
                .unwrap_or_else(|_| "much later".to_string());
            info!(
                "Pass {} done; next pass in {:.1}h (at {})",
                pass_number,
                interval.as_secs_f64() / 3600.0,
                next
            );

            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = cancel.cancelled() => break,
            }
        }
        info!("Schedule stopped after {} pass(es)", pass_number);
    });

    (handle, rx)
}
