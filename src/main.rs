//! Monad testnet autopilot
//!
//! Runs staking, swap and wrap automations across every wallet in the wallet
//! file, optionally on a recurring schedule.
//!
//! # WARNING
//! - Keys are read from a plaintext file. Keep it private and use test wallets only.
//! - Every cycle sends real testnet transactions and spends gas.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use monad_autopilot::cli::commands::{self, Session};
use monad_autopilot::cli::RunArgs;
use monad_autopilot::config::Config;
use monad_autopilot::integrations::AutomationId;
use monad_autopilot::selector::MenuChoice;

/// Monad testnet autopilot - scheduled multi-wallet automations
#[derive(Parser)]
#[command(name = "autopilot")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Print final reports as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive menu (default)
    Menu,

    /// Run one automation
    Run {
        #[arg(value_enum)]
        automation: AutomationId,

        #[command(flatten)]
        args: RunArgs,
    },

    /// Run a chain of automations with a shared configuration
    Chain {
        /// Add Kintsu and shMonad after the basic chain
        #[arg(long)]
        extended: bool,

        #[command(flatten)]
        args: RunArgs,
    },

    /// Show current configuration (secrets masked)
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("monad_autopilot=info".parse()?),
        )
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let config = match Config::load(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Failed to load configuration: {:#}", e);
            std::process::exit(1);
        }
    };

    let command = cli.command.unwrap_or(Commands::Menu);
    if let Commands::Config = command {
        return commands::show_config(&config);
    }

    // Run parameters come from flags or prompts before anything connects
    let planned = match &command {
        Commands::Run { automation, args } => {
            Some((MenuChoice::from(*automation), args.to_run_configuration()))
        }
        Commands::Chain { extended, args } => {
            let choice = if *extended {
                MenuChoice::ExtendedChain
            } else {
                MenuChoice::BasicChain
            };
            Some((choice, args.to_run_configuration()))
        }
        _ => None,
    };

    startup_checks(&config);

    let cancel = CancellationToken::new();
    spawn_ctrl_c_handler(cancel.clone());

    let session = match Session::open(config, cancel) {
        Ok(session) => session,
        Err(e) => {
            error!("{:#}", e);
            std::process::exit(1);
        }
    };

    let result = match planned {
        Some((choice, run)) => match run {
            Ok(run) => commands::run(&session, choice, run, cli.json).await,
            Err(e) => {
                error!("Invalid run parameters: {:#}", e);
                std::process::exit(1);
            }
        },
        None => commands::menu(&session, cli.json).await,
    };

    if let Err(e) = result {
        error!("Command failed: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// Cancel the run on Ctrl-C; in-flight confirmations stop waiting
fn spawn_ctrl_c_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Ctrl-C received, stopping after the current step");
            cancel.cancel();
        }
    });
}

/// Warn about a wallet file other users can read
fn startup_checks(config: &Config) {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;

        if let Ok(metadata) = std::fs::metadata(&config.wallet.path) {
            let mode = metadata.permissions().mode();
            if mode & 0o077 != 0 {
                warn!(
                    "Wallet file {} has permissions {:o}. Run 'chmod 600 {}' to restrict it.",
                    config.wallet.path,
                    mode & 0o777,
                    config.wallet.path
                );
            } else {
                info!("Wallet file permissions OK");
            }
        }
    }
    #[cfg(not(unix))]
    let _ = config;
}
