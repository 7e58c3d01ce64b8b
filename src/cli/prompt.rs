//! Interactive prompts
//!
//! Everything here runs before a batch starts; the core never prompts.

use std::time::Duration;

use anyhow::Result;
use dialoguer::{Input, Select};

use crate::config::RunConfiguration;
use crate::selector::MenuChoice;

pub fn menu_items() -> Vec<&'static str> {
    MenuChoice::ALL.iter().map(|c| c.label()).collect()
}

/// Show the main menu; Esc or `q` counts as Exit
pub fn choose_menu() -> Result<MenuChoice> {
    let selection = Select::new()
        .with_prompt("Select an automation")
        .items(&menu_items())
        .default(0)
        .interact_opt()?;

    Ok(selection
        .and_then(|i| MenuChoice::ALL.get(i).copied())
        .unwrap_or(MenuChoice::Exit))
}

/// Ask for cycles, interval and (for Kintsu runs) the token id
pub fn run_configuration(choice: MenuChoice) -> Result<RunConfiguration> {
    let cycles: u32 = Input::new()
        .with_prompt("How many cycles per account?")
        .default(1)
        .validate_with(|v: &u32| {
            if *v >= 1 {
                Ok(())
            } else {
                Err("must be at least 1")
            }
        })
        .interact_text()?;

    let hours: f64 = Input::new()
        .with_prompt("Repeat every how many hours? (0 = run once)")
        .default(0.0)
        .validate_with(|v: &f64| valid_interval_hours(*v))
        .interact_text()?;

    let token_id: u64 = if choice.needs_token_id() {
        Input::new()
            .with_prompt("Kintsu unstake token id")
            .default(1)
            .interact_text()?
    } else {
        1
    };

    RunConfiguration::new(cycles, Some(hours), token_id)
}

fn valid_interval_hours(hours: f64) -> std::result::Result<(), &'static str> {
    if !hours.is_finite() || hours < 0.0 {
        return Err("must be a non-negative number");
    }
    if Duration::try_from_secs_f64(hours * 3600.0).is_err() {
        return Err("interval is too large");
    }
    Ok(())
}
