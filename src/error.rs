//! Error types for the automation core

use serde::Serialize;
use thiserror::Error;

/// Result type alias using our custom Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the automation core
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to load credentials: {0}")]
    CredentialLoad(String),

    #[error("Invalid credential on line {line}: {reason}")]
    InvalidCredential { line: usize, reason: String },

    // RPC errors
    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("RPC timeout after {0}ms")]
    RpcTimeout(u64),

    // Quote / routing errors (no transaction was sent)
    #[error("No viable route for {from} -> {to}: {reason}")]
    QuoteOrPath {
        from: String,
        to: String,
        reason: String,
    },

    #[error("Insufficient {asset} balance: have {available}, need {required}")]
    InsufficientBalance {
        asset: String,
        available: String,
        required: String,
    },

    /// A later failure in a step that already bought its input asset
    #[error("{source} (after topping up {asset})")]
    AfterTopUp {
        asset: String,
        #[source]
        source: Box<Error>,
    },

    // Transaction lifecycle errors
    #[error("Transaction submission failed: {0}")]
    Submission(String),

    #[error("Transaction {tx_hash} not confirmed within {timeout_secs}s")]
    ConfirmationTimeout { tx_hash: String, timeout_secs: u64 },

    #[error("Transaction {tx_hash} reverted")]
    ConfirmationFailed { tx_hash: String },

    // ABI errors
    #[error("ABI decode failed for {call}: {reason}")]
    Abi { call: String, reason: String },

    // Claim status endpoint errors
    #[error("HTTP error: {0}")]
    Http(String),

    // Control flow
    #[error("Operation cancelled")]
    Cancelled,

    // I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

/// Coarse failure classes surfaced in step reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    ConfigLoad,
    QuoteOrPath,
    Submission,
    ConfirmationTimeout,
    ConfirmationFailed,
    Rpc,
    Cancelled,
    Other,
}

impl Error {
    /// Check if this error is retryable (transient, read-only path)
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Rpc(_) | Error::RpcTimeout(_) | Error::Http(_))
    }

    /// True when no transaction reached the network
    pub fn is_side_effect_free(&self) -> bool {
        !matches!(
            self,
            Error::ConfirmationTimeout { .. }
                | Error::ConfirmationFailed { .. }
                | Error::AfterTopUp { .. }
        )
    }

    /// Classify for reporting
    pub fn kind(&self) -> FailureKind {
        match self {
            Error::Config(_) | Error::CredentialLoad(_) | Error::InvalidCredential { .. } => {
                FailureKind::ConfigLoad
            }
            Error::QuoteOrPath { .. } | Error::InsufficientBalance { .. } => {
                FailureKind::QuoteOrPath
            }
            Error::AfterTopUp { source, .. } => match source.kind() {
                FailureKind::QuoteOrPath => FailureKind::Other,
                kind => kind,
            },
            Error::Submission(_) => FailureKind::Submission,
            Error::ConfirmationTimeout { .. } => FailureKind::ConfirmationTimeout,
            Error::ConfirmationFailed { .. } => FailureKind::ConfirmationFailed,
            Error::Rpc(_) | Error::RpcTimeout(_) | Error::Http(_) => FailureKind::Rpc,
            Error::Cancelled => FailureKind::Cancelled,
            _ => FailureKind::Other,
        }
    }
}

// Conversion from serde_json errors
impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Internal(format!("JSON error: {}", e))
    }
}

// Conversion from I/O errors
impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}

// Conversion from reqwest errors
impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Http(e.to_string())
    }
}
