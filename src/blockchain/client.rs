use crate::blockchain::models;
use crate::config::Config;
use crate::metrics::{ChainReport, ErrorCounter, ExplorerReport};
use crate::models::{AddressHistory, Transfer};
use async_trait::async_trait;
use ethers::providers::{Http, Middleware, Provider, ProviderError as NodeError};
use ethers::types::{BlockId, BlockNumber, U64};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::Client;
use std::future::Future;
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Node error: {0}")]
    Node(#[from] NodeError),

    #[error("Node request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Invalid endpoint: {0}")]
    Endpoint(String),

    #[error("Block not found: {0}")]
    BlockNotFound(u64),

    #[error("Malformed provider response: {0}")]
    Malformed(String),

    #[error("Explorer error: {0}")]
    Explorer(String),
}

/// Upstream chain data used by the sync loops and the address tracker.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Height of the chain head.
    async fn latest_height(&self) -> Result<u64, ProviderError>;

    /// Transfers of the block at `height`, or its empty-block placeholder.
    async fn block_transfers(&self, height: u64) -> Result<Vec<Transfer>, ProviderError>;

    /// Full transfer history of `address` from an indexed source.
    async fn address_history(&self, address: &str) -> Result<AddressHistory, ProviderError>;

    fn report(&self) -> ChainReport {
        ChainReport::default()
    }
}

/// Node JSON-RPC plus block-explorer client.
pub struct EthereumClient {
    provider: Provider<Http>,
    pub(crate) http: Client,
    pub(crate) explorer_url: String,
    pub(crate) explorer_key: String,
    timeout: Duration,
    limiter: Option<Arc<DefaultDirectRateLimiter>>,
    node_errors: ErrorCounter,
    pub(crate) explorer_errors: ErrorCounter,
    pub(crate) txlist_hits: AtomicU64,
}

impl EthereumClient {
    pub fn new(config: &Config) -> Result<Self, ProviderError> {
        let provider = Provider::<Http>::try_from(config.eth_rpc_url.as_str())
            .map_err(|e| ProviderError::Endpoint(format!("{}: {}", config.eth_rpc_url, e)))?;

        let timeout = Duration::from_secs(config.rpc_timeout_secs);
        let http = Client::builder().timeout(timeout).build()?;

        let limiter = config
            .rpc_rate_limit
            .and_then(NonZeroU32::new)
            .map(|rate| Arc::new(RateLimiter::direct(Quota::per_second(rate))));

        info!(
            "Initializing Ethereum client with RPC endpoint: {}, rate limit: {:?}",
            config.eth_rpc_url, config.rpc_rate_limit
        );

        Ok(Self {
            provider,
            http,
            explorer_url: config.etherscan_url.clone(),
            explorer_key: config.etherscan_key.clone(),
            timeout,
            limiter,
            node_errors: ErrorCounter::default(),
            explorer_errors: ErrorCounter::default(),
            txlist_hits: AtomicU64::new(0),
        })
    }

    /// Wait for a request slot when a rate limit is configured.
    pub(crate) async fn throttle(&self) {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }
    }

    /// Run one node call under the rate limit and the request timeout.
    async fn node<T>(&self, call: impl Future<Output = Result<T, NodeError>>) -> Result<T, ProviderError> {
        self.throttle().await;
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(ProviderError::Timeout(self.timeout)),
        }
    }

    async fn fetch_block(&self, height: u64) -> Result<Vec<Transfer>, ProviderError> {
        let id = BlockId::Number(BlockNumber::Number(U64::from(height)));
        let block = self
            .node(self.provider.get_block_with_txs(id))
            .await?
            .ok_or(ProviderError::BlockNotFound(height))?;

        let transfers = models::block_transfers(block)?;
        if transfers.iter().any(|t| t.block != height) {
            return Err(ProviderError::Malformed(format!("node answered a different block for {}", height)));
        }

        debug!("Fetched block {} with {} transfer rows", height, transfers.len());
        Ok(transfers)
    }
}

#[async_trait]
impl ChainClient for EthereumClient {
    async fn latest_height(&self) -> Result<u64, ProviderError> {
        let result = self.node(self.provider.get_block_number()).await;
        if result.is_err() {
            self.node_errors.record();
        }
        Ok(result?.as_u64())
    }

    async fn block_transfers(&self, height: u64) -> Result<Vec<Transfer>, ProviderError> {
        let result = self.fetch_block(height).await;
        if result.is_err() {
            self.node_errors.record();
        }
        result
    }

    async fn address_history(&self, address: &str) -> Result<AddressHistory, ProviderError> {
        self.fetch_address_history(address).await
    }

    fn report(&self) -> ChainReport {
        ChainReport {
            eth: self.node_errors.report(),
            etherscan: ExplorerReport {
                errors: self.explorer_errors.report(),
                txlist_for_address_hits: self.txlist_hits.load(Ordering::Relaxed),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_bad_rpc_url() {
        let config = Config {
            eth_rpc_url: "not a url".to_string(),
            ..Config::from_env()
        };
        assert!(matches!(EthereumClient::new(&config), Err(ProviderError::Endpoint(_))));
    }

    #[tokio::test]
    async fn test_unreachable_node_counts_errors() {
        let config = Config {
            eth_rpc_url: "http://127.0.0.1:1".to_string(),
            rpc_timeout_secs: 2,
            ..Config::from_env()
        };
        let client = EthereumClient::new(&config).unwrap();

        assert!(client.latest_height().await.is_err());
        assert!(client.block_transfers(5).await.is_err());

        let report = client.report();
        assert_eq!(report.eth.errors, 2);
        assert_eq!(report.eth.errors_delta, 2);
        assert_eq!(client.report().eth.errors_delta, 0);
    }
}
