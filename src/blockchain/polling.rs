use crate::blockchain::client::{ChainClient, ProviderError};
use crate::config::Config;
use crate::db::{LedgerStore, StoreError};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Result of one forward-sync tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwardTick {
    /// Chain head is not yet deep enough to have a confirmed block.
    Idle,
    /// Empty store seeded with the confirmed head block.
    Bootstrapped(u64),
    /// Frontier advanced by `appended` blocks.
    Advanced { appended: u64, frontier: u64 },
    /// A fork or gap was detected and staging was rolled back from `from`.
    RolledBack { from: u64 },
}

/// Result of one backward-seed tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedTick {
    /// Nothing staged yet; forward sync has to bootstrap first.
    Waiting,
    /// Blocks `lowest..=highest` were seeded.
    Seeded { lowest: u64, highest: u64 },
    /// Block 0 has been seeded.
    Complete,
}

/// Follows the chain head, `confirmations` blocks behind it.
pub struct ForwardSync {
    store: LedgerStore,
    chain: Arc<dyn ChainClient>,
    confirmations: u64,
    period: Duration,
}

impl ForwardSync {
    pub fn new(store: LedgerStore, chain: Arc<dyn ChainClient>, confirmations: u64, period: Duration) -> Self {
        Self {
            store,
            chain,
            confirmations,
            period,
        }
    }

    pub async fn tick(&self) -> Result<ForwardTick, SyncError> {
        let latest = self.chain.latest_height().await?;
        let Some(target) = latest.checked_sub(self.confirmations) else {
            return Ok(ForwardTick::Idle);
        };

        let Some(frontier) = self.store.frontier().await? else {
            let transfers = self.chain.block_transfers(target).await?;
            self.store.append_block_unchecked(&transfers).await?;
            info!("Empty ledger, added first block {}", target);
            return Ok(ForwardTick::Bootstrapped(target));
        };

        let mut appended = 0;
        for height in (frontier + 1)..=target {
            let transfers = self.chain.block_transfers(height).await?;

            match self.store.append_block(&transfers).await {
                Ok(()) => {
                    appended += 1;
                    let count = transfers.iter().filter(|t| !t.is_empty_block()).count();
                    info!("Added block {} ({} txs)", height, count);
                }
                Err(StoreError::Continuity(err)) => {
                    let from = err.height().saturating_sub(1);
                    warn!("Deleting blocks >= {} after insertion error: {}", from, err);
                    self.store.delete_from(from).await?;
                    return Ok(ForwardTick::RolledBack { from });
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(ForwardTick::Advanced {
            appended,
            frontier: frontier + appended,
        })
    }

    /// Delay before the next tick. A rollback retries right away.
    pub fn next_delay(&self, outcome: &Result<ForwardTick, SyncError>) -> Duration {
        match outcome {
            Ok(ForwardTick::RolledBack { .. }) => Duration::ZERO,
            _ => self.period,
        }
    }

    pub async fn run(self, shutdown: CancellationToken) {
        info!("Starting forward sync, {} confirmations behind head", self.confirmations);

        loop {
            let outcome = self.tick().await;
            match &outcome {
                Ok(tick) => debug!("Forward sync tick: {:?}", tick),
                Err(e) => error!("Forward sync tick failed: {}", e),
            }
            let delay = self.next_delay(&outcome);

            tokio::select! {
                _ = sleep(delay) => {}
                _ = shutdown.cancelled() => {
                    info!("Shutting down forward sync");
                    break;
                }
            }
        }
    }
}

/// Walks staging backwards from its lowest block down to genesis.
pub struct BackwardSeed {
    store: LedgerStore,
    chain: Arc<dyn ChainClient>,
    batch: u64,
    period: Duration,
    /// Lowest height seeded so far. Forward pruning raises the staged minimum, so
    /// progress is kept here.
    cursor: Option<u64>,
}

impl BackwardSeed {
    pub fn new(store: LedgerStore, chain: Arc<dyn ChainClient>, batch: u64, period: Duration) -> Self {
        Self {
            store,
            chain,
            batch: batch.max(1),
            period,
            cursor: None,
        }
    }

    pub async fn tick(&mut self) -> Result<SeedTick, SyncError> {
        let Some(min) = self.store.min_frontier().await? else {
            return Ok(SeedTick::Waiting);
        };

        let start = self.cursor.map_or(min, |cursor| cursor.min(min));
        if start == 0 {
            return Ok(SeedTick::Complete);
        }

        let highest = start - 1;
        let lowest = start.saturating_sub(self.batch);
        for height in (lowest..=highest).rev() {
            let transfers = self.chain.block_transfers(height).await?;
            self.store.append_block_unchecked(&transfers).await?;
            self.cursor = Some(height);
        }

        info!("Seeded blocks {} -> {}", lowest, highest);
        Ok(SeedTick::Seeded { lowest, highest })
    }

    pub async fn run(mut self, shutdown: CancellationToken) {
        info!("Starting backward seeding, {} blocks per tick", self.batch);

        loop {
            match self.tick().await {
                Ok(SeedTick::Complete) => {
                    info!("Backward seeding reached block 0, stopping");
                    break;
                }
                Ok(SeedTick::Waiting) => debug!("Backward seeding waiting for first block"),
                Ok(SeedTick::Seeded { .. }) => {}
                Err(e) => error!("Backward seeding tick failed: {}", e),
            }

            tokio::select! {
                _ = sleep(self.period) => {}
                _ = shutdown.cancelled() => {
                    info!("Shutting down backward seeding");
                    break;
                }
            }
        }
    }
}

/// Spawn the forward sync and, when enabled, the backward seeding loop.
pub fn start_sync(
    store: LedgerStore,
    chain: Arc<dyn ChainClient>,
    config: &Config,
    shutdown: CancellationToken,
) -> Vec<JoinHandle<()>> {
    let mut handles = Vec::new();

    let forward = ForwardSync::new(
        store.clone(),
        chain.clone(),
        config.expected_confirmations,
        config.update_latest_period,
    );
    handles.push(tokio::spawn(forward.run(shutdown.clone())));

    if config.seed_older_enabled {
        let backward = BackwardSeed::new(store, chain, config.seed_older_batch, config.seed_older_period);
        handles.push(tokio::spawn(backward.run(shutdown)));
    }

    handles
}
