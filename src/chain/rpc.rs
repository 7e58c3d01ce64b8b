//! JSON-RPC client on alloy
//!
//! One read provider shared by all accounts and one signing provider per
//! wallet, created on first use. Reads are retried with exponential backoff;
//! submissions are not.

use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use alloy::network::{EthereumWallet, ReceiptResponse, TransactionBuilder};
use alloy::primitives::{Address, Bytes, TxHash, U256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use async_trait::async_trait;
use backoff::{future::retry, ExponentialBackoff};
use dashmap::DashMap;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};
use url::Url;

use super::{ActionRequest, ChainClient, FeeData, Receipt};
use crate::config::RpcConfig;
use crate::error::{Error, Result};
use crate::wallet::Credential;

pub struct AlloyChainClient {
    url: Url,
    reader: DynProvider,
    writers: DashMap<Address, DynProvider>,
    permits: Arc<Semaphore>,
    config: RpcConfig,
}

impl AlloyChainClient {
    pub fn new(config: &RpcConfig) -> Result<Self> {
        let url: Url = config
            .endpoint
            .parse()
            .map_err(|e| Error::Config(format!("Invalid RPC endpoint: {}", e)))?;

        let reader = ProviderBuilder::new().connect_http(url.clone()).erased();

        info!("RPC client ready (chain {})", config.chain_id);

        Ok(Self {
            url,
            reader,
            writers: DashMap::new(),
            permits: Arc::new(Semaphore::new(config.max_concurrent_requests)),
            config: config.clone(),
        })
    }

    fn writer(&self, credential: &Credential) -> DynProvider {
        self.writers
            .entry(credential.address())
            .or_insert_with(|| {
                let wallet = EthereumWallet::from(credential.signer().clone());
                ProviderBuilder::new()
                    .wallet(wallet)
                    .connect_http(self.url.clone())
                    .erased()
            })
            .clone()
    }

    /// Run a read-only request under the rate cap, retrying transient errors
    async fn read<T, F, Fut>(&self, op: &'static str, f: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let base = Duration::from_millis(self.config.retry_base_delay_ms);
        let backoff = ExponentialBackoff {
            initial_interval: base,
            max_interval: base * 8,
            max_elapsed_time: Some(base * 8 * (self.config.max_retries + 1)),
            ..Default::default()
        };
        let attempts = AtomicU32::new(0);
        let timeout_ms = self.config.timeout_ms;

        retry(backoff, || {
            let f = &f;
            let attempts = &attempts;
            let permits = &self.permits;
            let max_retries = self.config.max_retries;
            async move {
                let _permit = permits
                    .acquire()
                    .await
                    .map_err(|_| backoff::Error::permanent(Error::Cancelled))?;

                let limit = Duration::from_millis(timeout_ms);
                let result = match tokio::time::timeout(limit, f()).await {
                    Ok(result) => result,
                    Err(_) => Err(Error::RpcTimeout(timeout_ms)),
                };

                match result {
                    Ok(value) => Ok(value),
                    Err(e)
                        if e.is_retryable()
                            && attempts.fetch_add(1, Ordering::Relaxed) < max_retries =>
                    {
                        warn!("Retryable RPC error on {}: {}", op, e);
                        Err(backoff::Error::transient(e))
                    }
                    Err(e) => Err(backoff::Error::permanent(e)),
                }
            }
        })
        .await
    }
}

fn rpc_err(e: impl std::fmt::Display) -> Error {
    Error::Rpc(e.to_string())
}

#[async_trait]
impl ChainClient for AlloyChainClient {
    async fn balance(&self, owner: Address) -> Result<U256> {
        self.read("eth_getBalance", move || async move {
            self.reader.get_balance(owner).await.map_err(rpc_err)
        })
        .await
    }

    async fn fee_data(&self) -> Result<FeeData> {
        self.read("fee_data", move || async move {
            let estimate = self
                .reader
                .estimate_eip1559_fees()
                .await
                .map_err(rpc_err)?;
            Ok(FeeData {
                max_fee_per_gas: estimate.max_fee_per_gas,
                max_priority_fee_per_gas: estimate.max_priority_fee_per_gas,
            })
        })
        .await
    }

    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes> {
        self.read("eth_call", move || {
            let tx = TransactionRequest::default()
                .with_to(to)
                .with_input(data.clone());
            async move { self.reader.call(tx).await.map_err(rpc_err) }
        })
        .await
    }

    async fn submit(&self, credential: &Credential, request: &ActionRequest) -> Result<TxHash> {
        let provider = self.writer(credential);

        let mut tx = TransactionRequest::default()
            .with_from(credential.address())
            .with_to(request.to)
            .with_input(request.data.clone())
            .with_value(request.value)
            .with_chain_id(self.config.chain_id);
        if request.gas_limit > 0 {
            tx = tx.with_gas_limit(request.gas_limit);
        }
        if let Some(fees) = request.fees {
            tx = tx
                .with_max_fee_per_gas(fees.max_fee_per_gas)
                .with_max_priority_fee_per_gas(fees.max_priority_fee_per_gas);
        }

        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| Error::Cancelled)?;

        let pending = provider
            .send_transaction(tx)
            .await
            .map_err(|e| Error::Submission(e.to_string()))?;
        let tx_hash = *pending.tx_hash();

        debug!("Submitted {} from {}", tx_hash, credential.address());
        Ok(tx_hash)
    }

    async fn confirm(&self, tx_hash: TxHash) -> Result<Receipt> {
        let timeout_secs = self.config.confirmation_timeout_secs;
        let poll = Duration::from_millis(self.config.receipt_poll_interval_ms);

        let wait = async {
            loop {
                let fetched = {
                    let _permit = self
                        .permits
                        .acquire()
                        .await
                        .map_err(|_| Error::Cancelled)?;
                    self.reader.get_transaction_receipt(tx_hash).await
                };

                match fetched {
                    Ok(Some(receipt)) => {
                        return Ok::<_, Error>(Receipt {
                            tx_hash: receipt.transaction_hash(),
                            block_number: receipt.block_number(),
                            gas_used: receipt.gas_used(),
                            success: receipt.status(),
                        });
                    }
                    Ok(None) => {}
                    Err(e) => debug!("Receipt poll for {} failed: {}", tx_hash, e),
                }
                tokio::time::sleep(poll).await;
            }
        };

        match tokio::time::timeout(Duration::from_secs(timeout_secs), wait).await {
            Ok(result) => result,
            Err(_) => Err(Error::ConfirmationTimeout {
                tx_hash: tx_hash.to_string(),
                timeout_secs,
            }),
        }
    }

    fn explorer_url(&self, tx_hash: &TxHash) -> String {
        format!("{}{}", self.config.explorer_tx_url, tx_hash)
    }
}
