//! Wallet access
//!
//! Credentials are loaded once per batch pass from a local key file and held
//! in memory only.

pub mod credentials;

pub use credentials::{short_address, AccountSource, Credential};
