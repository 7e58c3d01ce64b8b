//! Per-protocol automations
//!
//! An automation only declares what a cycle looks like and how the batch
//! runner treats an aborted cycle; execution is shared.

pub mod apriori;
pub mod beanswap;
pub mod kintsu;
pub mod rubic;
pub mod shmonad;

use std::fmt;
use std::sync::Arc;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::batch::AccountPolicy;
use crate::config::Config;
use crate::cycle::CyclePlan;
use crate::error::Result;
use crate::pacing::DelayBand;

pub use apriori::Apriori;
pub use beanswap::Beanswap;
pub use kintsu::Kintsu;
pub use rubic::Rubic;
pub use shmonad::Shmonad;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum AutomationId {
    Rubic,
    Beanswap,
    Apriori,
    Kintsu,
    Shmonad,
}

impl AutomationId {
    pub const ALL: [AutomationId; 5] = [
        AutomationId::Rubic,
        AutomationId::Beanswap,
        AutomationId::Apriori,
        AutomationId::Kintsu,
        AutomationId::Shmonad,
    ];

    pub fn display_name(&self) -> &'static str {
        match self {
            AutomationId::Rubic => "Rubic",
            AutomationId::Beanswap => "Beanswap",
            AutomationId::Apriori => "Apriori",
            AutomationId::Kintsu => "Kintsu",
            AutomationId::Shmonad => "shMonad",
        }
    }
}

impl fmt::Display for AutomationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// A protocol integration: its cycle plan plus account-level policy
pub trait Automation: Send + Sync {
    fn id(&self) -> AutomationId;

    fn plan(&self, config: &Config) -> CyclePlan;

    fn account_policy(&self, config: &Config) -> AccountPolicy;

    /// Steps run once per account, before its first cycle
    fn account_setup(&self, _config: &Config) -> Option<CyclePlan> {
        None
    }
}

/// Default action delay from `[pacing]`
pub(crate) fn action_delay(config: &Config) -> DelayBand {
    DelayBand::new(config.pacing.delay_min_ms, config.pacing.delay_max_ms)
}

pub fn build(id: AutomationId, config: &Config) -> Result<Arc<dyn Automation>> {
    Ok(match id {
        AutomationId::Rubic => Arc::new(Rubic),
        AutomationId::Beanswap => Arc::new(Beanswap),
        AutomationId::Apriori => Arc::new(Apriori::from_config(config)?),
        AutomationId::Kintsu => Arc::new(Kintsu),
        AutomationId::Shmonad => Arc::new(Shmonad),
    })
}

/// Every automation, in menu order
pub fn build_all(config: &Config) -> Result<Vec<Arc<dyn Automation>>> {
    AutomationId::ALL
        .iter()
        .map(|id| build(*id, config))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_all_matches_ids() {
        let config = Config::default();
        let all = build_all(&config).unwrap();
        let ids: Vec<AutomationId> = all.iter().map(|a| a.id()).collect();
        assert_eq!(ids, AutomationId::ALL.to_vec());
        assert!(all.iter().all(|a| !a.plan(&config).is_empty()));
    }

    #[test]
    fn test_id_serde_and_display() {
        assert_eq!(serde_json::to_string(&AutomationId::Shmonad).unwrap(), "\"shmonad\"");
        assert_eq!(AutomationId::Shmonad.to_string(), "shMonad");
        assert_eq!(
            AutomationId::from_str("beanswap", true).unwrap(),
            AutomationId::Beanswap
        );
    }
}
