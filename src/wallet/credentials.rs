//! Credential loading
//!
//! Reads `wallet.txt`: one hex private key per line, blank lines ignored,
//! `0x` prefix optional.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, info};

use crate::error::{Error, Result};

lazy_static! {
    static ref PRIVATE_KEY_RE: Regex = Regex::new(r"^0x[0-9a-fA-F]{64}$").unwrap();
}

/// A signing key and the address it controls
#[derive(Clone)]
pub struct Credential {
    signer: PrivateKeySigner,
    address: Address,
    /// 1-based position in the source file
    index: usize,
}

impl Credential {
    /// Parse a single key, adding the `0x` prefix when absent
    pub fn parse(raw: &str, index: usize) -> Result<Self> {
        let trimmed = raw.trim();
        let key = if trimmed.starts_with("0x") || trimmed.starts_with("0X") {
            format!("0x{}", &trimmed[2..])
        } else {
            format!("0x{}", trimmed)
        };

        if !PRIVATE_KEY_RE.is_match(&key) {
            return Err(Error::InvalidCredential {
                line: index,
                reason: "expected 32-byte hex private key".to_string(),
            });
        }

        let signer = PrivateKeySigner::from_str(&key).map_err(|e| Error::InvalidCredential {
            line: index,
            reason: e.to_string(),
        })?;
        let address = signer.address();

        Ok(Self {
            signer,
            address,
            index,
        })
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn signer(&self) -> &PrivateKeySigner {
        &self.signer
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// `0x1234...abcd` for progress lines
    pub fn short_address(&self) -> String {
        short_address(&self.address)
    }
}

// Never print the key
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("address", &self.address)
            .field("index", &self.index)
            .finish_non_exhaustive()
    }
}

pub fn short_address(address: &Address) -> String {
    let full = address.to_string();
    format!("{}...{}", &full[..6], &full[full.len() - 4..])
}

/// File-backed list of credentials
pub struct AccountSource {
    path: PathBuf,
}

impl AccountSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load every credential in file order.
    ///
    /// A missing or unreadable file, an empty file, or any malformed line is
    /// an error; the caller treats all of them as fatal.
    pub fn load(&self) -> Result<Vec<Credential>> {
        let content = std::fs::read_to_string(&self.path).map_err(|e| {
            Error::CredentialLoad(format!("Failed to read {}: {}", self.path.display(), e))
        })?;

        let credentials = parse_credentials(&content)?;
        if credentials.is_empty() {
            return Err(Error::CredentialLoad(format!(
                "No private keys found in {}",
                self.path.display()
            )));
        }

        info!(
            "Loaded {} wallet(s) from {}",
            credentials.len(),
            self.path.display()
        );
        for cred in &credentials {
            debug!("Wallet {}: {}", cred.index(), cred.address());
        }

        Ok(credentials)
    }
}

fn parse_credentials(content: &str) -> Result<Vec<Credential>> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| Credential::parse(line, i + 1))
        .collect()
}
