//! Cycle orchestration
//!
//! A cycle runs an ordered [`CyclePlan`] for one credential. Each step carries
//! its own [`StepPolicy`], so the same orchestrator serves every automation:
//!
//! - `Fatal`: a failure aborts the cycle and marks the remaining steps skipped
//! - `Soft`: a failure is logged and the cycle moves on
//! - `RetryAlternatePair`: one retry with the failed input excluded; a failed
//!   retry is fatal
//!
//! Cancellation is checked before every step and during every pause, and
//! aborts the cycle regardless of policy.

use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::TxHash;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::actions::{ActionKind, ActionOutcome, ActionPrimitive, CycleScratch, StepContext};
use crate::chain::ChainClient;
use crate::config::{Config, RunConfiguration};
use crate::error::{Error, FailureKind, Result};
use crate::pacing::{pause, DelayBand, Randomizer};
use crate::wallet::Credential;

/// What a step failure does to the rest of the cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepPolicy {
    Fatal,
    Soft,
    RetryAlternatePair,
}

/// Wait inserted before a step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pause {
    Random(DelayBand),
    Fixed(Duration),
}

impl Pause {
    pub fn duration(&self, rng: &mut Randomizer) -> Duration {
        match self {
            Pause::Random(band) => rng.delay(*band),
            Pause::Fixed(duration) => *duration,
        }
    }
}

#[derive(Clone)]
pub struct CycleStep {
    pub primitive: Arc<dyn ActionPrimitive>,
    pub policy: StepPolicy,
    pub pause_before: Option<Pause>,
}

impl CycleStep {
    pub fn fatal(primitive: Arc<dyn ActionPrimitive>) -> Self {
        Self {
            primitive,
            policy: StepPolicy::Fatal,
            pause_before: None,
        }
    }

    pub fn soft(primitive: Arc<dyn ActionPrimitive>) -> Self {
        Self {
            policy: StepPolicy::Soft,
            ..Self::fatal(primitive)
        }
    }

    pub fn retry_alternate_pair(primitive: Arc<dyn ActionPrimitive>) -> Self {
        Self {
            policy: StepPolicy::RetryAlternatePair,
            ..Self::fatal(primitive)
        }
    }

    /// Wait `pause` before running this step
    pub fn after(mut self, pause: Pause) -> Self {
        self.pause_before = Some(pause);
        self
    }
}

/// Ordered steps of one cycle
#[derive(Clone, Default)]
pub struct CyclePlan {
    steps: Vec<CycleStep>,
}

impl CyclePlan {
    pub fn new(steps: Vec<CycleStep>) -> Self {
        Self { steps }
    }

    pub fn then(mut self, step: CycleStep) -> Self {
        self.steps.push(step);
        self
    }

    pub fn steps(&self) -> &[CycleStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Step names in order, for logs and menus
    pub fn describe(&self) -> String {
        self.steps
            .iter()
            .map(|s| s.primitive.name())
            .collect::<Vec<_>>()
            .join(" -> ")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepOutcome {
    Succeeded {
        tx_hash: TxHash,
        block_number: Option<u64>,
    },
    NoOp {
        reason: String,
    },
    Failed {
        error: String,
        kind: FailureKind,
    },
    Skipped,
}

#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    pub name: String,
    pub kind: ActionKind,
    pub policy: StepPolicy,
    pub attempts: u32,
    #[serde(flatten)]
    pub outcome: StepOutcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleStatus {
    Completed,
    Aborted,
}

#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    /// 1-based
    pub index: u32,
    pub status: CycleStatus,
    pub steps: Vec<StepReport>,
}

impl CycleReport {
    pub fn is_completed(&self) -> bool {
        self.status == CycleStatus::Completed
    }

    /// Steps that confirmed a transaction
    pub fn transactions(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| matches!(s.outcome, StepOutcome::Succeeded { .. }))
            .count()
    }

    pub fn was_cancelled(&self) -> bool {
        self.steps.iter().any(|s| {
            matches!(
                s.outcome,
                StepOutcome::Failed {
                    kind: FailureKind::Cancelled,
                    ..
                }
            )
        })
    }
}

/// Runs plans for one credential
pub struct CycleOrchestrator<'a> {
    credential: &'a Credential,
    chain: &'a dyn ChainClient,
    config: &'a Config,
    run: &'a RunConfiguration,
    cancel: &'a CancellationToken,
}

impl<'a> CycleOrchestrator<'a> {
    pub fn new(
        credential: &'a Credential,
        chain: &'a dyn ChainClient,
        config: &'a Config,
        run: &'a RunConfiguration,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            credential,
            chain,
            config,
            run,
            cancel,
        }
    }

    /// Execute `plan` as cycle number `index`
    pub async fn run(&self, plan: &CyclePlan, rng: &mut Randomizer, index: u32) -> CycleReport {
        let mut ctx = StepContext {
            credential: self.credential,
            chain: self.chain,
            config: self.config,
            run: self.run,
            rng,
            cancel: self.cancel,
            cycle: index,
            attempt: 0,
            scratch: CycleScratch::default(),
        };
        let mut steps = Vec::with_capacity(plan.len());
        let mut aborted = false;

        for step in plan.steps() {
            let name = step.primitive.name().to_string();
            let mut report = StepReport {
                name: name.clone(),
                kind: step.primitive.kind(),
                policy: step.policy,
                attempts: 0,
                outcome: StepOutcome::Skipped,
            };
            if aborted {
                steps.push(report);
                continue;
            }

            let result = match self.wait_before(step, &mut ctx).await {
                Ok(()) => Self::execute(step, &mut ctx, &mut report.attempts).await,
                Err(e) => Err(e),
            };

            report.outcome = match result {
                Ok(ActionOutcome::Executed(receipt)) => StepOutcome::Succeeded {
                    tx_hash: receipt.tx_hash,
                    block_number: receipt.block_number,
                },
                Ok(ActionOutcome::NoOp(reason)) => {
                    info!("{} {} skipped: {}", ctx.tag(), name, reason);
                    StepOutcome::NoOp { reason }
                }
                Err(e) => {
                    let cancelled = matches!(e, Error::Cancelled);
                    if cancelled || step.policy != StepPolicy::Soft {
                        error!("{} {} failed: {}", ctx.tag(), name, e);
                        aborted = true;
                    } else {
                        warn!("{} {} failed, continuing: {}", ctx.tag(), name, e);
                    }
                    StepOutcome::Failed {
                        error: e.to_string(),
                        kind: e.kind(),
                    }
                }
            };
            steps.push(report);
        }

        let status = if aborted {
            CycleStatus::Aborted
        } else {
            CycleStatus::Completed
        };
        CycleReport {
            index,
            status,
            steps,
        }
    }

    async fn wait_before(&self, step: &CycleStep, ctx: &mut StepContext<'_>) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        if let Some(p) = &step.pause_before {
            let duration = p.duration(ctx.rng);
            if !duration.is_zero() {
                info!(
                    "{} Waiting {:.0}s before {}",
                    ctx.tag(),
                    duration.as_secs_f64(),
                    step.primitive.name()
                );
            }
            pause(duration, self.cancel).await?;
        }
        Ok(())
    }

    async fn execute(
        step: &CycleStep,
        ctx: &mut StepContext<'_>,
        attempts: &mut u32,
    ) -> Result<ActionOutcome> {
        ctx.attempt = 0;
        *attempts = 1;
        let first = step.primitive.execute(ctx).await;

        match first {
            Err(e)
                if step.policy == StepPolicy::RetryAlternatePair
                    && !matches!(e, Error::Cancelled) =>
            {
                warn!(
                    "{} {} failed ({}), retrying with another pair",
                    ctx.tag(),
                    step.primitive.name(),
                    e
                );
                ctx.attempt = 1;
                *attempts = 2;
                step.primitive.execute(ctx).await
            }
            other => other,
        }
    }
}
