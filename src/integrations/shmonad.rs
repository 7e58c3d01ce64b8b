//! shMonad: deposit, redeem most of it, bond part of the rest

use std::sync::Arc;

use super::{action_delay, Automation, AutomationId};
use crate::actions::vault::{Bond, Deposit, Redeem};
use crate::batch::{AccountPolicy, CycleAbortPolicy};
use crate::config::Config;
use crate::cycle::{CyclePlan, CycleStep, Pause};

pub struct Shmonad;

impl Automation for Shmonad {
    fn id(&self) -> AutomationId {
        AutomationId::Shmonad
    }

    fn plan(&self, config: &Config) -> CyclePlan {
        let delay = Pause::Random(action_delay(config));
        CyclePlan::default()
            .then(CycleStep::fatal(Arc::new(Deposit)))
            .then(CycleStep::fatal(Arc::new(Redeem)).after(delay))
            .then(CycleStep::fatal(Arc::new(Bond)).after(delay))
    }

    fn account_policy(&self, config: &Config) -> AccountPolicy {
        AccountPolicy {
            on_cycle_abort: CycleAbortPolicy::SkipRemainingCycles,
            inter_cycle_pause: Some(Pause::Random(action_delay(config))),
        }
    }
}
