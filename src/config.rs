//! Configuration loading and validation

use alloy::primitives::utils::{parse_units, ParseUnits};
use alloy::primitives::{address, Address, U256};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub rpc: RpcConfig,
    #[serde(default)]
    pub wallet: WalletConfig,
    #[serde(default)]
    pub limits: TransactionLimits,
    #[serde(default)]
    pub pacing: PacingConfig,
    #[serde(default)]
    pub batch: BatchConfig,
    #[serde(default)]
    pub contracts: ContractsConfig,
    #[serde(default)]
    pub swap: SwapConfig,
    #[serde(default)]
    pub apriori: AprioriConfig,
    #[serde(default)]
    pub kintsu: KintsuConfig,
    #[serde(default)]
    pub shmonad: ShmonadConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcConfig {
    #[serde(default = "default_rpc_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_chain_id")]
    pub chain_id: u64,
    #[serde(default = "default_explorer_tx_url")]
    pub explorer_tx_url: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// How long to wait for a receipt before giving up on a submitted tx
    #[serde(default = "default_confirmation_timeout_secs")]
    pub confirmation_timeout_secs: u64,
    #[serde(default = "default_receipt_poll_interval_ms")]
    pub receipt_poll_interval_ms: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    /// Cap on in-flight requests to the endpoint, shared by all accounts
    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            endpoint: default_rpc_endpoint(),
            chain_id: default_chain_id(),
            explorer_tx_url: default_explorer_tx_url(),
            timeout_ms: default_timeout_ms(),
            confirmation_timeout_secs: default_confirmation_timeout_secs(),
            receipt_poll_interval_ms: default_receipt_poll_interval_ms(),
            max_retries: default_max_retries(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            max_concurrent_requests: default_max_concurrent_requests(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WalletConfig {
    /// Plain text file, one private key per line
    #[serde(default = "default_wallet_path")]
    pub path: String,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            path: default_wallet_path(),
        }
    }
}

/// Percentage-of-balance band used for randomized amounts
#[derive(Debug, Clone, Deserialize)]
pub struct TransactionLimits {
    #[serde(default = "default_min_percentage")]
    pub min_percentage: f64,
    #[serde(default = "default_max_percentage")]
    pub max_percentage: f64,
    /// Floor, in native units ("0.01" = 0.01 MON)
    #[serde(default = "default_minimum_amount")]
    pub minimum_amount: String,
    /// Fallback when the balance cannot be read
    #[serde(default = "default_default_amount")]
    pub default_amount: String,
}

impl Default for TransactionLimits {
    fn default() -> Self {
        Self {
            min_percentage: default_min_percentage(),
            max_percentage: default_max_percentage(),
            minimum_amount: default_minimum_amount(),
            default_amount: default_default_amount(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PacingConfig {
    #[serde(default = "default_delay_min_ms")]
    pub delay_min_ms: u64,
    #[serde(default = "default_delay_max_ms")]
    pub delay_max_ms: u64,
    #[serde(default = "default_account_switch_delay_ms")]
    pub account_switch_delay_ms: u64,
    /// Pause between automations in a chained run
    #[serde(default = "default_chain_pause_ms")]
    pub chain_pause_ms: u64,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            delay_min_ms: default_delay_min_ms(),
            delay_max_ms: default_delay_max_ms(),
            account_switch_delay_ms: default_account_switch_delay_ms(),
            chain_pause_ms: default_chain_pause_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BatchConfig {
    /// 1 keeps the strictly sequential account order
    #[serde(default = "default_max_parallel_accounts")]
    pub max_parallel_accounts: usize,
    /// Optional fixed RNG seed, for reproducible dry runs
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_parallel_accounts: default_max_parallel_accounts(),
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContractsConfig {
    #[serde(default = "default_wmon")]
    pub wmon: Address,
    #[serde(default = "default_apriori_vault")]
    pub apriori_vault: Address,
    #[serde(default = "default_kintsu")]
    pub kintsu: Address,
    #[serde(default = "default_shmonad")]
    pub shmonad: Address,
    #[serde(default = "default_bean_router")]
    pub bean_router: Address,
}

impl Default for ContractsConfig {
    fn default() -> Self {
        Self {
            wmon: default_wmon(),
            apriori_vault: default_apriori_vault(),
            kintsu: default_kintsu(),
            shmonad: default_shmonad(),
            bean_router: default_bean_router(),
        }
    }
}

/// One tradable asset; `address = None` marks the native coin
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AssetConfig {
    pub symbol: String,
    #[serde(default)]
    pub address: Option<Address>,
    pub decimals: u8,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SwapConfig {
    #[serde(default = "default_slippage_bps")]
    pub slippage_bps: u32,
    #[serde(default = "default_deadline_secs")]
    pub deadline_secs: u64,
    /// Below this (in the asset's own units) a balance counts as empty
    #[serde(default = "default_dust_amount")]
    pub dust_amount: String,
    /// Token holdings quoted above this many MON get swept back to MON
    #[serde(default = "default_sweep_threshold")]
    pub sweep_threshold: String,
    /// Skip the MON top-up when MON itself is below this
    #[serde(default = "default_min_native_for_topup")]
    pub min_native_for_topup: String,
    #[serde(default = "default_swap_gas_min")]
    pub gas_min: u64,
    #[serde(default = "default_swap_gas_max")]
    pub gas_max: u64,
    #[serde(default = "default_wrap_gas_limit")]
    pub wrap_gas_limit: u64,
    #[serde(default = "default_assets")]
    pub assets: Vec<AssetConfig>,
}

impl Default for SwapConfig {
    fn default() -> Self {
        Self {
            slippage_bps: default_slippage_bps(),
            deadline_secs: default_deadline_secs(),
            dust_amount: default_dust_amount(),
            sweep_threshold: default_sweep_threshold(),
            min_native_for_topup: default_min_native_for_topup(),
            gas_min: default_swap_gas_min(),
            gas_max: default_swap_gas_max(),
            wrap_gas_limit: default_wrap_gas_limit(),
            assets: default_assets(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AprioriConfig {
    #[serde(default = "default_apriori_status_url")]
    pub status_api_url: String,
    /// Fixed wait between the unstake request and the claim check
    #[serde(default = "default_claim_wait_secs")]
    pub claim_wait_secs: u64,
    #[serde(default = "default_apriori_stake_gas")]
    pub stake_gas_limit: u64,
    #[serde(default = "default_apriori_unstake_gas")]
    pub unstake_gas_limit: u64,
    #[serde(default = "default_apriori_claim_gas")]
    pub claim_gas_limit: u64,
}

impl Default for AprioriConfig {
    fn default() -> Self {
        Self {
            status_api_url: default_apriori_status_url(),
            claim_wait_secs: default_claim_wait_secs(),
            stake_gas_limit: default_apriori_stake_gas(),
            unstake_gas_limit: default_apriori_unstake_gas(),
            claim_gas_limit: default_apriori_claim_gas(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct KintsuConfig {
    #[serde(default = "default_kintsu_stake_min")]
    pub stake_min: String,
    #[serde(default = "default_kintsu_stake_max")]
    pub stake_max: String,
    #[serde(default = "default_kintsu_unstake_threshold")]
    pub unstake_threshold: String,
    #[serde(default = "default_kintsu_delay_min_ms")]
    pub delay_min_ms: u64,
    #[serde(default = "default_kintsu_delay_max_ms")]
    pub delay_max_ms: u64,
    #[serde(default = "default_kintsu_gas_min")]
    pub gas_min: u64,
    #[serde(default = "default_kintsu_gas_max")]
    pub gas_max: u64,
    /// Max fee = network max fee * fee_bump_pct / 100
    #[serde(default = "default_fee_bump_pct")]
    pub fee_bump_pct: u64,
}

impl Default for KintsuConfig {
    fn default() -> Self {
        Self {
            stake_min: default_kintsu_stake_min(),
            stake_max: default_kintsu_stake_max(),
            unstake_threshold: default_kintsu_unstake_threshold(),
            delay_min_ms: default_kintsu_delay_min_ms(),
            delay_max_ms: default_kintsu_delay_max_ms(),
            gas_min: default_kintsu_gas_min(),
            gas_max: default_kintsu_gas_max(),
            fee_bump_pct: default_fee_bump_pct(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShmonadConfig {
    #[serde(default = "default_shmonad_deposit_gas")]
    pub deposit_gas_limit: u64,
    #[serde(default = "default_shmonad_redeem_gas")]
    pub redeem_gas_limit: u64,
    #[serde(default = "default_shmonad_bond_gas")]
    pub bond_gas_limit: u64,
    #[serde(default = "default_redeem_pct")]
    pub redeem_pct: u64,
    #[serde(default = "default_bond_pct")]
    pub bond_pct: u64,
    #[serde(default = "default_policy_id")]
    pub policy_id: u64,
}

impl Default for ShmonadConfig {
    fn default() -> Self {
        Self {
            deposit_gas_limit: default_shmonad_deposit_gas(),
            redeem_gas_limit: default_shmonad_redeem_gas(),
            bond_gas_limit: default_shmonad_bond_gas(),
            redeem_pct: default_redeem_pct(),
            bond_pct: default_bond_pct(),
            policy_id: default_policy_id(),
        }
    }
}

/// Parameters supplied once per batch, from flags or prompts.
///
/// Never mutated after construction; cloned into chained runs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunConfiguration {
    pub cycles: u32,
    /// Re-run the full pass after this long; `None` runs once
    pub interval: Option<Duration>,
    pub kintsu_token_id: u64,
}

impl RunConfiguration {
    pub fn new(cycles: u32, interval_hours: Option<f64>, kintsu_token_id: u64) -> Result<Self> {
        if cycles == 0 {
            anyhow::bail!("cycle count must be at least 1");
        }
        let interval = match interval_hours {
            Some(h) if h < 0.0 || !h.is_finite() => {
                anyhow::bail!("interval must be a non-negative number of hours, got {}", h)
            }
            Some(h) if h > 0.0 => match Duration::try_from_secs_f64(h * 3600.0) {
                Ok(interval) => Some(interval),
                Err(_) => anyhow::bail!("interval of {} hours is too large", h),
            },
            _ => None,
        };
        Ok(Self {
            cycles,
            interval,
            kintsu_token_id: kintsu_token_id.max(1),
        })
    }

    /// Single pass, one cycle
    pub fn once() -> Self {
        Self {
            cycles: 1,
            interval: None,
            kintsu_token_id: 1,
        }
    }
}

fn default_rpc_endpoint() -> String {
    "https://testnet-rpc.monad.xyz/".to_string()
}

fn default_chain_id() -> u64 {
    10143
}

fn default_explorer_tx_url() -> String {
    "https://testnet.monadexplorer.com/tx/".to_string()
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_confirmation_timeout_secs() -> u64 {
    300
}

fn default_receipt_poll_interval_ms() -> u64 {
    1_000
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    250
}

fn default_max_concurrent_requests() -> usize {
    4
}

fn default_wallet_path() -> String {
    "wallet.txt".to_string()
}

fn default_min_percentage() -> f64 {
    1.0
}

fn default_max_percentage() -> f64 {
    5.0
}

fn default_minimum_amount() -> String {
    "0.01".to_string()
}

fn default_default_amount() -> String {
    "0.01".to_string()
}

fn default_delay_min_ms() -> u64 {
    30_000
}

fn default_delay_max_ms() -> u64 {
    60_000
}

fn default_account_switch_delay_ms() -> u64 {
    3_000
}

fn default_chain_pause_ms() -> u64 {
    5_000
}

fn default_max_parallel_accounts() -> usize {
    1
}

fn default_wmon() -> Address {
    address!("760AfE86e5de5fa0Ee542fc7B7B713e1c5425701")
}

fn default_apriori_vault() -> Address {
    address!("b2f82D0f38dc453D596Ad40A37799446Cc89274A")
}

fn default_kintsu() -> Address {
    address!("07AabD925866E8353407E67C1D157836f7Ad923e")
}

fn default_shmonad() -> Address {
    address!("3a98250F98Dd388C211206983453837C8365BDc1")
}

fn default_bean_router() -> Address {
    address!("Ca810D095e90Daae6e867c19DF6D9A8C56db2c89")
}

fn default_slippage_bps() -> u32 {
    500
}

fn default_deadline_secs() -> u64 {
    6 * 3600
}

fn default_dust_amount() -> String {
    "0.0001".to_string()
}

fn default_sweep_threshold() -> String {
    "0.5".to_string()
}

fn default_min_native_for_topup() -> String {
    "0.001".to_string()
}

fn default_swap_gas_min() -> u64 {
    250_000
}

fn default_swap_gas_max() -> u64 {
    350_000
}

fn default_wrap_gas_limit() -> u64 {
    500_000
}

fn default_assets() -> Vec<AssetConfig> {
    vec![
        AssetConfig {
            symbol: "MON".to_string(),
            address: None,
            decimals: 18,
        },
        AssetConfig {
            symbol: "WMON".to_string(),
            address: Some(default_wmon()),
            decimals: 18,
        },
        AssetConfig {
            symbol: "USDC".to_string(),
            address: Some(address!("62534E4bBD6D9ebAC0ac99aeaa0aa48E56372df0")),
            decimals: 6,
        },
        AssetConfig {
            symbol: "BEAN".to_string(),
            address: Some(address!("268E4E24E0051EC27b3D27A95977E71cE6875a05")),
            decimals: 18,
        },
        AssetConfig {
            symbol: "JAI".to_string(),
            address: Some(address!("70F893f65E3C1d7f82aad72f71615eb220b74D10")),
            decimals: 6,
        },
    ]
}

fn default_apriori_status_url() -> String {
    "https://stake-api.apr.io/withdrawal_requests".to_string()
}

fn default_claim_wait_secs() -> u64 {
    660
}

fn default_apriori_stake_gas() -> u64 {
    500_000
}

fn default_apriori_unstake_gas() -> u64 {
    800_000
}

fn default_apriori_claim_gas() -> u64 {
    800_000
}

fn default_kintsu_stake_min() -> String {
    "0.05".to_string()
}

fn default_kintsu_stake_max() -> String {
    "0.1".to_string()
}

fn default_kintsu_unstake_threshold() -> String {
    "0.01".to_string()
}

fn default_kintsu_delay_min_ms() -> u64 {
    30_000
}

fn default_kintsu_delay_max_ms() -> u64 {
    120_000
}

fn default_kintsu_gas_min() -> u64 {
    150_000
}

fn default_kintsu_gas_max() -> u64 {
    250_000
}

fn default_fee_bump_pct() -> u64 {
    105
}

fn default_shmonad_deposit_gas() -> u64 {
    500_000
}

fn default_shmonad_redeem_gas() -> u64 {
    800_000
}

fn default_shmonad_bond_gas() -> u64 {
    600_000
}

fn default_redeem_pct() -> u64 {
    98
}

fn default_bond_pct() -> u64 {
    50
}

fn default_policy_id() -> u64 {
    4
}

/// Parse a decimal amount string ("0.05") into base units
pub fn parse_amount(amount: &str, decimals: u8) -> Result<U256> {
    let parsed = parse_units(amount.trim(), decimals)
        .with_context(|| format!("Invalid amount '{}' for {} decimals", amount, decimals))?;
    match parsed {
        ParseUnits::U256(value) => Ok(value),
        ParseUnits::I256(_) => anyhow::bail!("Amount '{}' must not be negative", amount),
    }
}

impl Config {
    /// Load configuration from file and environment variables
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let settings = config::Config::builder()
            // Start with defaults
            .set_default("rpc.endpoint", default_rpc_endpoint())?
            .set_default("rpc.timeout_ms", default_timeout_ms() as i64)?
            .set_default("rpc.max_retries", default_max_retries() as i64)?
            // Load from file if exists
            .add_source(config::File::from(path).required(false))
            // Override with environment variables (prefix AUTOPILOT_)
            .add_source(
                config::Environment::with_prefix("AUTOPILOT")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let config: Config = settings
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        // Validate configuration
        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.rpc.endpoint)
            .with_context(|| format!("Invalid RPC endpoint: {}", self.rpc.endpoint))?;
        url::Url::parse(&self.apriori.status_api_url).with_context(|| {
            format!("Invalid status API URL: {}", self.apriori.status_api_url)
        })?;

        let limits = &self.limits;
        for pct in [limits.min_percentage, limits.max_percentage] {
            if !(0.0..=100.0).contains(&pct) {
                anyhow::bail!("Transaction percentage {} outside 0..=100", pct);
            }
        }
        if limits.min_percentage > limits.max_percentage {
            anyhow::bail!(
                "min_percentage ({}) cannot exceed max_percentage ({})",
                limits.min_percentage,
                limits.max_percentage
            );
        }
        parse_amount(&limits.minimum_amount, 18)?;
        parse_amount(&limits.default_amount, 18)?;

        check_band("pacing delay", self.pacing.delay_min_ms, self.pacing.delay_max_ms)?;
        check_band("kintsu delay", self.kintsu.delay_min_ms, self.kintsu.delay_max_ms)?;
        check_band("swap gas", self.swap.gas_min, self.swap.gas_max)?;
        check_band("kintsu gas", self.kintsu.gas_min, self.kintsu.gas_max)?;

        let stake_min = parse_amount(&self.kintsu.stake_min, 18)?;
        let stake_max = parse_amount(&self.kintsu.stake_max, 18)?;
        if stake_min > stake_max {
            anyhow::bail!("kintsu stake_min cannot exceed stake_max");
        }
        parse_amount(&self.kintsu.unstake_threshold, 18)?;

        if self.swap.slippage_bps >= 10_000 {
            anyhow::bail!("slippage_bps must be below 10000, got {}", self.swap.slippage_bps);
        }
        parse_amount(&self.swap.sweep_threshold, 18)?;
        parse_amount(&self.swap.min_native_for_topup, 18)?;

        let natives = self.swap.assets.iter().filter(|a| a.address.is_none()).count();
        if natives != 1 {
            anyhow::bail!("swap.assets must contain exactly one native asset, found {}", natives);
        }
        if self.swap.assets.len() < 3 {
            anyhow::bail!("swap.assets needs at least 3 assets to pick alternate pairs");
        }
        for asset in &self.swap.assets {
            parse_amount(&self.swap.dust_amount, asset.decimals)
                .with_context(|| format!("dust_amount invalid for {}", asset.symbol))?;
        }

        for pct in [self.shmonad.redeem_pct, self.shmonad.bond_pct] {
            if pct > 100 {
                anyhow::bail!("shmonad percentages must be within 0..=100, got {}", pct);
            }
        }

        if self.batch.max_parallel_accounts == 0 {
            anyhow::bail!("batch.max_parallel_accounts must be at least 1");
        }
        if self.rpc.max_concurrent_requests == 0 {
            anyhow::bail!("rpc.max_concurrent_requests must be at least 1");
        }
        if self.batch.max_parallel_accounts > 1 {
            tracing::warn!(
                "Running up to {} accounts in parallel; per-account order is still sequential",
                self.batch.max_parallel_accounts
            );
        }

        Ok(())
    }

    /// RPC endpoint with any query string hidden
    pub fn masked_rpc(&self) -> String {
        mask_url(&self.rpc.endpoint)
    }

    /// Get masked configuration for display (hide secrets)
    pub fn masked_display(&self) -> String {
        format!(
            r#"Configuration:
  RPC:
    endpoint: {}
    chain_id: {}
    confirmation_timeout: {}s
    max_concurrent_requests: {}
  Wallet:
    path: {}
  Limits:
    band: {}% - {}% of balance
    minimum: {} MON
    default: {} MON
  Pacing:
    delay: {}ms - {}ms
    account_switch: {}ms
  Batch:
    max_parallel_accounts: {}
  Swap:
    slippage: {}bps
    assets: {}
  Apriori:
    status_api: {}
    claim_wait: {}s
"#,
            mask_url(&self.rpc.endpoint),
            self.rpc.chain_id,
            self.rpc.confirmation_timeout_secs,
            self.rpc.max_concurrent_requests,
            self.wallet.path,
            self.limits.min_percentage,
            self.limits.max_percentage,
            self.limits.minimum_amount,
            self.limits.default_amount,
            self.pacing.delay_min_ms,
            self.pacing.delay_max_ms,
            self.pacing.account_switch_delay_ms,
            self.batch.max_parallel_accounts,
            self.swap.slippage_bps,
            self.swap
                .assets
                .iter()
                .map(|a| a.symbol.as_str())
                .collect::<Vec<_>>()
                .join(", "),
            mask_url(&self.apriori.status_api_url),
            self.apriori.claim_wait_secs,
        )
    }
}

fn check_band(name: &str, min: u64, max: u64) -> Result<()> {
    if min > max {
        anyhow::bail!("{} band is inverted: min {} > max {}", name, min, max);
    }
    Ok(())
}

/// Mask URL for display (hide API keys in query params)
fn mask_url(url: &str) -> String {
    if let Some(idx) = url.find('?') {
        format!("{}?***", &url[..idx])
    } else {
        url.to_string()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rpc: RpcConfig::default(),
            wallet: WalletConfig::default(),
            limits: TransactionLimits::default(),
            pacing: PacingConfig::default(),
            batch: BatchConfig::default(),
            contracts: ContractsConfig::default(),
            swap: SwapConfig::default(),
            apriori: AprioriConfig::default(),
            kintsu: KintsuConfig::default(),
            shmonad: ShmonadConfig::default(),
        }
    }
}
