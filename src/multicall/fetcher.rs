use std::time::Duration;

use alloy::primitives::{Address, Bytes};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use anyhow::{Context, Result};
use log::{debug, warn};
use url::Url;

use crate::abis::{Call3, CallResult, IMulticall3};
use crate::config::MulticallSettings;

use super::{CallKey, CallStore};

/// Settles pending calls of a [`CallStore`] through Multicall3.
#[derive(Clone)]
pub struct MulticallFetcher {
    provider: DynProvider,
    multicall_address: Address,
    batch_size: usize,
    max_retries: u32,
    retry_delay: Duration,
    call_timeout: Duration,
}

impl MulticallFetcher {
    pub fn new(rpc_url: &str, multicall_address: Address, settings: &MulticallSettings) -> Result<Self> {
        let url = Url::parse(rpc_url).with_context(|| format!("Invalid RPC URL {rpc_url}"))?;
        let client = ProviderBuilder::new().connect_http(url);

        Ok(Self::with_provider(
            DynProvider::new(client),
            multicall_address,
            settings,
        ))
    }

    pub fn with_provider(
        provider: DynProvider,
        multicall_address: Address,
        settings: &MulticallSettings,
    ) -> Self {
        Self {
            provider,
            multicall_address,
            batch_size: settings.batch_size.max(1),
            max_retries: settings.max_retries.max(1),
            retry_delay: Duration::from_millis(settings.retry_delay_ms),
            call_timeout: Duration::from_secs(settings.timeout_secs),
        }
    }

    /// Fetch every pending call of `store` and record the outcomes.
    ///
    /// Returns how many calls were settled. Chunks that keep failing after
    /// all retries are left pending for the next round.
    pub async fn fetch_pending(&self, store: &CallStore) -> usize {
        let pending = store.pending_calls();
        if pending.is_empty() {
            return 0;
        }

        let mut settled = 0;
        for chunk in pending.chunks(self.batch_size) {
            match self.fetch_chunk_with_retry(chunk).await {
                Ok(results) => {
                    // aggregate3 answers in call order
                    for (key, result) in chunk.iter().zip(results) {
                        let data = result.success.then_some(result.returnData);
                        store.record(key.clone(), data);
                        settled += 1;
                    }
                },
                Err(e) => {
                    warn!(
                        "Multicall of {} calls failed after {} attempts, falling back to single calls: {:#}",
                        chunk.len(),
                        self.max_retries,
                        e
                    );
                    for (key, data) in chunk.iter().zip(self.fetch_individually(chunk).await) {
                        if let Some(data) = data {
                            store.record(key.clone(), Some(data));
                            settled += 1;
                        }
                    }
                },
            }
        }

        debug!("Settled {} of {} pending calls", settled, pending.len());
        settled
    }

    /// Fetch a chunk with exponential backoff
    async fn fetch_chunk_with_retry(&self, chunk: &[CallKey]) -> Result<Vec<CallResult>> {
        let mut attempt = 0;
        loop {
            match self.fetch_chunk(chunk).await {
                Ok(results) => return Ok(results),
                Err(e) if attempt + 1 < self.max_retries => {
                    debug!("Multicall attempt {} failed: {:#}", attempt + 1, e);
                    tokio::time::sleep(self.retry_delay * 2_u32.pow(attempt)).await;
                    attempt += 1;
                },
                Err(e) => return Err(e),
            }
        }
    }

    /// Latest block as seen by the multicall contract.
    pub async fn block_number(&self) -> Result<u64> {
        let multicall = IMulticall3::new(self.multicall_address, &self.provider);
        let block = tokio::time::timeout(self.call_timeout, multicall.getBlockNumber().call())
            .await
            .context("Block number timeout")?
            .context("Failed to fetch block number")?;
        Ok(block.saturating_to::<u64>())
    }

    /// Fallback: issue each call on its own when multicall keeps failing.
    /// Calls that still fail stay pending.
    async fn fetch_individually(&self, chunk: &[CallKey]) -> Vec<Option<Bytes>> {
        let tasks = chunk.iter().map(|key| self.fetch_single(key));
        futures::future::join_all(tasks).await
    }

    async fn fetch_single(&self, key: &CallKey) -> Option<Bytes> {
        let tx = TransactionRequest::default()
            .to(key.target)
            .input(Bytes::clone(&key.calldata).into());

        match tokio::time::timeout(self.call_timeout, self.provider.call(tx)).await {
            Ok(Ok(data)) => Some(data),
            Ok(Err(e)) => {
                debug!("Call to {} failed: {}", key.target, e);
                None
            },
            Err(_) => {
                debug!("Call to {} timed out", key.target);
                None
            },
        }
    }

    async fn fetch_chunk(&self, chunk: &[CallKey]) -> Result<Vec<CallResult>> {
        let multicall = IMulticall3::new(self.multicall_address, &self.provider);
        let calls: Vec<Call3> = chunk
            .iter()
            .map(|key| Call3 {
                target: key.target,
                allowFailure: true,
                callData: Bytes::clone(&key.calldata),
            })
            .collect();

        let results = tokio::time::timeout(self.call_timeout, multicall.aggregate3(calls).call())
            .await
            .context("Multicall timeout")?
            .context("Multicall aggregate3 failed")?;

        anyhow::ensure!(
            results.len() == chunk.len(),
            "Multicall returned {} results for {} calls",
            results.len(),
            chunk.len()
        );
        Ok(results)
    }
}
