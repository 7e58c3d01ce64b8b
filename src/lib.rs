//! Monad testnet autopilot library
//!
//! Multi-wallet automation of staking, swap and wrap flows on the Monad
//! testnet: per-account cycles with randomized amounts and delays, a batch
//! runner over accounts and a top-level selector.

pub mod actions;
pub mod batch;
pub mod chain;
pub mod cli;
pub mod config;
pub mod cycle;
pub mod error;
pub mod integrations;
pub mod pacing;
pub mod selector;
pub mod wallet;

#[cfg(test)]
mod testing;

// Re-export commonly used types
pub use config::Config;
pub use error::{Error, Result};
