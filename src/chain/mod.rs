//! Chain access
//!
//! Everything that talks to the JSON-RPC endpoint goes through
//! [`ChainClient`]. Production uses [`rpc::AlloyChainClient`]; tests use an
//! in-memory fake.

pub mod abi;
pub mod rpc;

use alloy::primitives::utils::format_units;
use alloy::primitives::{Address, Bytes, TxHash, U256};
use async_trait::async_trait;
use serde::Serialize;

use crate::config::AssetConfig;
use crate::error::Result;
use crate::wallet::Credential;

pub use rpc::AlloyChainClient;

/// EIP-1559 fee pair, in wei
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FeeData {
    pub max_fee_per_gas: u128,
    pub max_priority_fee_per_gas: u128,
}

impl FeeData {
    /// Scale max fee by `pct` percent and use it for the priority fee too
    pub fn bumped(&self, pct: u64) -> Self {
        let max_fee = self.max_fee_per_gas.saturating_mul(pct as u128) / 100;
        Self {
            max_fee_per_gas: max_fee,
            max_priority_fee_per_gas: max_fee,
        }
    }
}

/// A single state-changing call, built fresh and submitted once
#[derive(Debug, Clone)]
pub struct ActionRequest {
    pub to: Address,
    pub data: Bytes,
    pub value: U256,
    pub gas_limit: u64,
    /// `None` lets the provider fill fees
    pub fees: Option<FeeData>,
}

impl ActionRequest {
    pub fn new(to: Address, data: Bytes) -> Self {
        Self {
            to,
            data,
            value: U256::ZERO,
            gas_limit: 0,
            fees: None,
        }
    }

    pub fn value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }

    pub fn gas_limit(mut self, gas_limit: u64) -> Self {
        self.gas_limit = gas_limit;
        self
    }

    pub fn fees(mut self, fees: FeeData) -> Self {
        self.fees = Some(fees);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Receipt {
    pub tx_hash: TxHash,
    pub block_number: Option<u64>,
    pub gas_used: u64,
    pub success: bool,
}

/// Native coin or ERC-20 token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum AssetKind {
    Native,
    Token(Address),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssetDescriptor {
    pub symbol: String,
    pub kind: AssetKind,
    pub decimals: u8,
}

impl AssetDescriptor {
    pub fn native(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            kind: AssetKind::Native,
            decimals: 18,
        }
    }

    pub fn token(symbol: impl Into<String>, address: Address, decimals: u8) -> Self {
        Self {
            symbol: symbol.into(),
            kind: AssetKind::Token(address),
            decimals,
        }
    }

    pub fn is_native(&self) -> bool {
        matches!(self.kind, AssetKind::Native)
    }

    pub fn token_address(&self) -> Option<Address> {
        match self.kind {
            AssetKind::Native => None,
            AssetKind::Token(address) => Some(address),
        }
    }

    /// Human-readable amount, e.g. `1.5 USDC`
    pub fn display(&self, amount: U256) -> String {
        format!("{} {}", format_amount(amount, self.decimals), self.symbol)
    }
}

impl From<&AssetConfig> for AssetDescriptor {
    fn from(cfg: &AssetConfig) -> Self {
        Self {
            symbol: cfg.symbol.clone(),
            kind: cfg.address.map_or(AssetKind::Native, AssetKind::Token),
            decimals: cfg.decimals,
        }
    }
}

/// Format base units with `decimals`, falling back to the raw integer
pub fn format_amount(amount: U256, decimals: u8) -> String {
    format_units(amount, decimals).unwrap_or_else(|_| amount.to_string())
}

/// Blockchain operations used by the automations
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Native balance in wei
    async fn balance(&self, owner: Address) -> Result<U256>;

    async fn fee_data(&self) -> Result<FeeData>;

    /// Read-only `eth_call`
    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes>;

    /// Sign and broadcast; never retried
    async fn submit(&self, credential: &Credential, request: &ActionRequest) -> Result<TxHash>;

    /// Wait for the receipt of a submitted transaction
    async fn confirm(&self, tx_hash: TxHash) -> Result<Receipt>;

    /// Explorer link for logs
    fn explorer_url(&self, tx_hash: &TxHash) -> String;

    async fn token_balance(&self, token: Address, owner: Address) -> Result<U256> {
        let out = self.call(token, abi::balance_of(owner)).await?;
        abi::decode_uint("balanceOf", &out)
    }

    async fn allowance(&self, token: Address, owner: Address, spender: Address) -> Result<U256> {
        let out = self.call(token, abi::allowance(owner, spender)).await?;
        abi::decode_uint("allowance", &out)
    }

    async fn asset_balance(&self, owner: Address, asset: &AssetDescriptor) -> Result<U256> {
        match asset.kind {
            AssetKind::Native => self.balance(owner).await,
            AssetKind::Token(token) => self.token_balance(token, owner).await,
        }
    }
}
