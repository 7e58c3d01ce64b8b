//! Beanswap: sweep once per account, then swap along a random pair and
//! swap back after a pause

use std::sync::Arc;

use super::{action_delay, Automation, AutomationId};
use crate::actions::swap::{ForwardSwap, ReverseSwap, Sweep};
use crate::batch::{AccountPolicy, CycleAbortPolicy};
use crate::config::Config;
use crate::cycle::{CyclePlan, CycleStep, Pause};
use crate::pacing::DelayBand;

pub struct Beanswap;

impl Automation for Beanswap {
    fn id(&self) -> AutomationId {
        AutomationId::Beanswap
    }

    fn plan(&self, config: &Config) -> CyclePlan {
        let reverse =
            CycleStep::soft(Arc::new(ReverseSwap)).after(Pause::Random(action_delay(config)));
        CyclePlan::default()
            .then(CycleStep::retry_alternate_pair(Arc::new(ForwardSwap)))
            .then(reverse)
    }

    /// Leftover tokens go back to MON once, before the first cycle
    fn account_setup(&self, _config: &Config) -> Option<CyclePlan> {
        Some(CyclePlan::default().then(CycleStep::soft(Arc::new(Sweep))))
    }

    fn account_policy(&self, config: &Config) -> AccountPolicy {
        let band = action_delay(config);
        AccountPolicy {
            on_cycle_abort: CycleAbortPolicy::ContinueCycles,
            // twice the action delay between cycles
            inter_cycle_pause: Some(Pause::Random(DelayBand::new(
                band.min_ms.saturating_mul(2),
                band.max_ms.saturating_mul(2),
            ))),
        }
    }
}
