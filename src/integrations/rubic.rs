//! Rubic: wrap a random share of MON, then unwrap the same amount

use std::sync::Arc;

use super::{Automation, AutomationId};
use crate::actions::wrap::{Unwrap, Wrap};
use crate::batch::{AccountPolicy, CycleAbortPolicy};
use crate::config::Config;
use crate::cycle::{CyclePlan, CycleStep};

pub struct Rubic;

impl Automation for Rubic {
    fn id(&self) -> AutomationId {
        AutomationId::Rubic
    }

    fn plan(&self, _config: &Config) -> CyclePlan {
        CyclePlan::default()
            .then(CycleStep::fatal(Arc::new(Wrap)))
            .then(CycleStep::fatal(Arc::new(Unwrap)))
    }

    fn account_policy(&self, _config: &Config) -> AccountPolicy {
        AccountPolicy {
            on_cycle_abort: CycleAbortPolicy::ContinueCycles,
            inter_cycle_pause: None,
        }
    }
}
