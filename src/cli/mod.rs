//! Command-line surface: flag parsing helpers, prompts and commands

pub mod commands;
pub mod prompt;

use clap::Args;

use crate::config::RunConfiguration;

/// Run parameters given as flags instead of prompts
#[derive(Debug, Clone, Args)]
pub struct RunArgs {
    /// Cycles per account
    #[arg(long, default_value_t = 1)]
    pub cycles: u32,

    /// Repeat the whole run every N hours (0 or absent runs once)
    #[arg(long, value_name = "HOURS")]
    pub interval_hours: Option<f64>,

    /// Kintsu unstake token id
    #[arg(long, default_value_t = 1)]
    pub token_id: u64,
}

impl RunArgs {
    pub fn to_run_configuration(&self) -> anyhow::Result<RunConfiguration> {
        RunConfiguration::new(self.cycles, self.interval_hours, self.token_id)
    }
}
