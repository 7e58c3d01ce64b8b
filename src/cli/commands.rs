//! CLI command implementations

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::prompt;
use crate::batch::{BatchReport, BatchRunner};
use crate::chain::AlloyChainClient;
use crate::config::{Config, RunConfiguration};
use crate::integrations;
use crate::selector::{MenuChoice, Selector};
use crate::wallet::{AccountSource, Credential};

/// Loaded wallets plus a ready selector
pub struct Session {
    selector: Arc<Selector>,
    credentials: Arc<Vec<Credential>>,
    cancel: CancellationToken,
}

impl Session {
    /// Load the wallet file and connect the RPC client.
    ///
    /// Fails on unreadable or empty wallet files; the caller exits with 1.
    pub fn open(config: Config, cancel: CancellationToken) -> Result<Self> {
        let credentials = AccountSource::new(&config.wallet.path)
            .load()
            .with_context(|| format!("Failed to load wallets from {}", config.wallet.path))?;

        info!("Connecting to {} (chain {})", config.masked_rpc(), config.rpc.chain_id);
        let chain = AlloyChainClient::new(&config.rpc).context("Failed to create RPC client")?;

        let config = Arc::new(config);
        let automations = integrations::build_all(&config).context("Failed to set up automations")?;
        let runner = BatchRunner::new(Arc::new(chain), config, cancel.clone());

        Ok(Self {
            selector: Arc::new(Selector::new(Arc::new(runner), automations)),
            credentials: Arc::new(credentials),
            cancel,
        })
    }

    pub fn wallet_count(&self) -> usize {
        self.credentials.len()
    }
}

/// Interactive main menu; returns after Exit or Ctrl-C
pub async fn menu(session: &Session, json: bool) -> Result<()> {
    println!("\n=== MONAD TESTNET AUTOPILOT ===");
    println!("{} wallet(s) loaded\n", session.wallet_count());

    loop {
        let choice = prompt::choose_menu()?;
        if choice == MenuChoice::Exit {
            info!("Exiting");
            return Ok(());
        }

        let run = prompt::run_configuration(choice)?;
        execute(session, choice, run, json).await?;

        if session.cancel.is_cancelled() {
            return Ok(());
        }
    }
}

/// Non-interactive run of a single choice
pub async fn run(
    session: &Session,
    choice: MenuChoice,
    run: RunConfiguration,
    json: bool,
) -> Result<()> {
    execute(session, choice, run, json).await
}

async fn execute(
    session: &Session,
    choice: MenuChoice,
    run: RunConfiguration,
    json: bool,
) -> Result<()> {
    let (handle, mut reports) = session
        .selector
        .execute(choice, Arc::clone(&session.credentials), run)?;

    while let Some(pass) = reports.recv().await {
        for report in &pass {
            print_report(report, json)?;
        }
    }
    handle.await.context("Run task panicked")?;

    if session.cancel.is_cancelled() {
        warn!("Stopped by user");
    }
    Ok(())
}

fn print_report(report: &BatchReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    println!("\n=== {} ===", report.automation);
    for account in &report.accounts {
        println!(
            "  #{:<3} {}  cycles {}/{}  tx {}  balance {} MON{}",
            account.index,
            crate::wallet::short_address(&account.address),
            account.completed_cycles(),
            account.cycles_requested,
            account.transactions(),
            account.balance_change().unwrap_or_else(|| "?".to_string()),
            account
                .error
                .as_ref()
                .map(|e| format!("  error: {}", e))
                .unwrap_or_default()
        );
    }
    println!("{}", report.summary());
    Ok(())
}

/// Show current configuration (secrets masked)
pub fn show_config(config: &Config) -> Result<()> {
    println!("{}", config.masked_display());
    Ok(())
}
