//! Kintsu: stake a small fixed band, then unstake once sMON is worth it

use std::sync::Arc;

use super::{Automation, AutomationId};
use crate::actions::staking::{Stake, Unstake};
use crate::batch::{AccountPolicy, CycleAbortPolicy};
use crate::config::Config;
use crate::cycle::{CyclePlan, CycleStep, Pause};
use crate::pacing::DelayBand;

pub struct Kintsu;

fn kintsu_delay(config: &Config) -> DelayBand {
    DelayBand::new(config.kintsu.delay_min_ms, config.kintsu.delay_max_ms)
}

impl Automation for Kintsu {
    fn id(&self) -> AutomationId {
        AutomationId::Kintsu
    }

    fn plan(&self, config: &Config) -> CyclePlan {
        CyclePlan::default()
            .then(CycleStep::fatal(Arc::new(Stake)))
            .then(CycleStep::fatal(Arc::new(Unstake)).after(Pause::Random(kintsu_delay(config))))
    }

    fn account_policy(&self, config: &Config) -> AccountPolicy {
        AccountPolicy {
            on_cycle_abort: CycleAbortPolicy::SkipRemainingCycles,
            inter_cycle_pause: Some(Pause::Random(kintsu_delay(config))),
        }
    }
}
