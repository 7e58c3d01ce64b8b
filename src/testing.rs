//! In-memory chain and scripted primitives for tests

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use alloy::primitives::{Address, Bytes, TxHash, U256};
use alloy::sol_types::{SolCall, SolValue};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::actions::{ActionKind, ActionOutcome, ActionPrimitive, CycleScratch, StepContext};
use crate::chain::abi::{IUniswapV2Router, IERC20};
use crate::chain::{ActionRequest, ChainClient, FeeData, Receipt};
use crate::config::{Config, RunConfiguration};
use crate::error::{Error, Result};
use crate::pacing::Randomizer;
use crate::wallet::Credential;

#[derive(Default)]
struct ChainState {
    native: HashMap<Address, U256>,
    tokens: HashMap<(Address, Address), U256>,
    allowances: HashMap<(Address, Address, Address), U256>,
    balance_error: Option<String>,
    failing_quotes: HashSet<Address>,
    submitted: Vec<(Address, ActionRequest)>,
    submit_error: Option<String>,
    /// Submissions accepted before `submit_error` applies
    submit_allowance: usize,
    revert_all: bool,
    reads: usize,
}

/// Fake chain: balances and quotes are scripted, submissions are recorded
pub struct ScriptedChain {
    state: Mutex<ChainState>,
}

impl ScriptedChain {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ChainState::default()),
        }
    }

    pub fn set_native_balance(&self, owner: Address, amount: U256) {
        self.state.lock().unwrap().native.insert(owner, amount);
    }

    pub fn set_token_balance(&self, token: Address, owner: Address, amount: U256) {
        self.state
            .lock()
            .unwrap()
            .tokens
            .insert((token, owner), amount);
    }

    pub fn set_allowance(&self, token: Address, owner: Address, spender: Address, amount: U256) {
        self.state
            .lock()
            .unwrap()
            .allowances
            .insert((token, owner, spender), amount);
    }

    pub fn fail_balance_reads(&self, message: &str) {
        self.state.lock().unwrap().balance_error = Some(message.to_string());
    }

    /// Quotes touching `token` revert like an empty pool
    pub fn fail_quotes_for(&self, token: Address) {
        self.state.lock().unwrap().failing_quotes.insert(token);
    }

    pub fn fail_submissions(&self, message: &str) {
        self.state.lock().unwrap().submit_error = Some(message.to_string());
    }

    /// Accept `accepted` submissions, then fail the rest
    pub fn fail_submissions_after(&self, accepted: usize, message: &str) {
        let mut state = self.state.lock().unwrap();
        state.submit_allowance = accepted;
        state.submit_error = Some(message.to_string());
    }

    pub fn revert_all(&self, revert: bool) {
        self.state.lock().unwrap().revert_all = revert;
    }

    pub fn submitted(&self) -> Vec<(Address, ActionRequest)> {
        self.state.lock().unwrap().submitted.clone()
    }

    pub fn submitted_by(&self, owner: Address) -> Vec<ActionRequest> {
        self.submitted()
            .into_iter()
            .filter(|(from, _)| *from == owner)
            .map(|(_, req)| req)
            .collect()
    }

    pub fn reads(&self) -> usize {
        self.state.lock().unwrap().reads
    }
}

impl Default for ScriptedChain {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChainClient for ScriptedChain {
    async fn balance(&self, owner: Address) -> Result<U256> {
        let mut state = self.state.lock().unwrap();
        state.reads += 1;
        if let Some(msg) = &state.balance_error {
            return Err(Error::Rpc(msg.clone()));
        }
        Ok(state.native.get(&owner).copied().unwrap_or_default())
    }

    async fn fee_data(&self) -> Result<FeeData> {
        Ok(FeeData {
            max_fee_per_gas: 100_000_000_000,
            max_priority_fee_per_gas: 2_000_000_000,
        })
    }

    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes> {
        let mut state = self.state.lock().unwrap();
        state.reads += 1;
        let selector: [u8; 4] = data
            .get(..4)
            .and_then(|s| s.try_into().ok())
            .ok_or_else(|| Error::Rpc("empty calldata".into()))?;

        match selector {
            IERC20::balanceOfCall::SELECTOR => {
                if let Some(msg) = &state.balance_error {
                    return Err(Error::Rpc(msg.clone()));
                }
                let call = IERC20::balanceOfCall::abi_decode(&data)
                    .map_err(|e| Error::Rpc(e.to_string()))?;
                let balance = state
                    .tokens
                    .get(&(to, call.owner))
                    .copied()
                    .unwrap_or_default();
                Ok(balance.abi_encode().into())
            }
            IERC20::allowanceCall::SELECTOR => {
                let call = IERC20::allowanceCall::abi_decode(&data)
                    .map_err(|e| Error::Rpc(e.to_string()))?;
                let allowance = state
                    .allowances
                    .get(&(to, call.owner, call.spender))
                    .copied()
                    .unwrap_or_default();
                Ok(allowance.abi_encode().into())
            }
            IUniswapV2Router::getAmountsOutCall::SELECTOR => {
                let call = IUniswapV2Router::getAmountsOutCall::abi_decode(&data)
                    .map_err(|e| Error::Rpc(e.to_string()))?;
                if call.path.iter().any(|t| state.failing_quotes.contains(t)) {
                    return Err(Error::Rpc(
                        "execution reverted: INSUFFICIENT_LIQUIDITY".into(),
                    ));
                }
                // 1:1 pool
                let amounts = vec![call.amountIn; call.path.len()];
                Ok((amounts,).abi_encode_params().into())
            }
            _ => Err(Error::Rpc(format!("unscripted call to {}", to))),
        }
    }

    async fn submit(&self, credential: &Credential, request: &ActionRequest) -> Result<TxHash> {
        let mut state = self.state.lock().unwrap();
        if let Some(msg) = &state.submit_error {
            if state.submitted.len() >= state.submit_allowance {
                return Err(Error::Submission(msg.clone()));
            }
        }
        state
            .submitted
            .push((credential.address(), request.clone()));
        Ok(TxHash::with_last_byte(state.submitted.len() as u8))
    }

    async fn confirm(&self, tx_hash: TxHash) -> Result<Receipt> {
        let state = self.state.lock().unwrap();
        Ok(Receipt {
            tx_hash,
            block_number: Some(1),
            gas_used: 21_000,
            success: !state.revert_all,
        })
    }

    fn explorer_url(&self, tx_hash: &TxHash) -> String {
        format!("https://explorer.test/tx/{}", tx_hash)
    }
}

/// Deterministic credential; `index` doubles as the private key scalar
pub fn test_credential(index: usize) -> Credential {
    Credential::parse(&format!("{:064x}", index), index).unwrap()
}

/// Config with every pause zeroed
pub fn fast_config() -> Config {
    let mut config = Config::default();
    config.pacing.delay_min_ms = 0;
    config.pacing.delay_max_ms = 0;
    config.pacing.account_switch_delay_ms = 0;
    config.pacing.chain_pause_ms = 0;
    config.kintsu.delay_min_ms = 0;
    config.kintsu.delay_max_ms = 0;
    config.apriori.claim_wait_secs = 0;
    config
}

pub fn ok_receipt(n: u8) -> Receipt {
    Receipt {
        tx_hash: TxHash::with_last_byte(n),
        block_number: Some(1),
        gas_used: 21_000,
        success: true,
    }
}

/// Owns the pieces a [`StepContext`] borrows
pub struct TestHarness {
    pub config: Config,
    pub run: RunConfiguration,
    pub rng: Randomizer,
    pub cancel: CancellationToken,
}

impl TestHarness {
    pub fn new() -> Self {
        Self {
            config: fast_config(),
            run: RunConfiguration::once(),
            rng: Randomizer::new(Some(42)),
            cancel: CancellationToken::new(),
        }
    }

    pub fn context<'a>(
        &'a mut self,
        credential: &'a Credential,
        chain: &'a dyn ChainClient,
    ) -> StepContext<'a> {
        StepContext {
            credential,
            chain,
            config: &self.config,
            run: &self.run,
            rng: &mut self.rng,
            cancel: &self.cancel,
            cycle: 1,
            attempt: 0,
            scratch: CycleScratch::default(),
        }
    }
}

type StepFn = dyn Fn(&mut StepContext<'_>) -> Result<ActionOutcome> + Send + Sync;

/// Primitive whose behavior is a closure; counts its invocations
pub struct FnPrimitive {
    name: String,
    calls: AtomicUsize,
    f: Box<StepFn>,
}

impl FnPrimitive {
    pub fn new(
        name: &str,
        f: impl Fn(&mut StepContext<'_>) -> Result<ActionOutcome> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            calls: AtomicUsize::new(0),
            f: Box::new(f),
        })
    }

    pub fn succeeding(name: &str) -> Arc<Self> {
        Self::new(name, |_| Ok(ActionOutcome::Executed(ok_receipt(1))))
    }

    pub fn failing(name: &str) -> Arc<Self> {
        Self::new(name, |_| Err(Error::Submission("scripted failure".into())))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ActionPrimitive for FnPrimitive {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ActionKind {
        ActionKind::Wrap
    }

    async fn execute(&self, ctx: &mut StepContext<'_>) -> Result<ActionOutcome> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (self.f)(ctx)
    }
}
