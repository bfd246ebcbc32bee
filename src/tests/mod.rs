//! Shared fixtures: in-memory ledger, a scriptable chain and a fixed-rate normalizer.

mod signature_tests;

use crate::blockchain::{ChainClient, ProviderError};
use crate::db::{connection, LedgerStore};
use crate::models::{AddressHistory, Transfer, Wei};
use crate::service::normalizer::{DatedValue, RateNormalizationError, RateNormalizer};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

pub const ALICE: &str = "0x046c88317b23dc57f6945bf4140140f73c8fc80f";
pub const BOB: &str = "0xd6106c445a07a6a1caf02fc8050f1fde30d7ce8b";
pub const CAROL: &str = "0x9ab5a49b2dc5eb8e3ae0aa28d1f1bd2b1f4a1e3c";

pub async fn setup_store() -> LedgerStore {
    let pool = connection::establish_in_memory()
        .await
        .expect("Failed to create in-memory database");
    LedgerStore::new(pool)
}

pub fn block_hash(height: u64) -> String {
    format!("0x{:064x}", height)
}

/// Hash of the block at `height` on a fork labelled `fork`.
pub fn fork_hash(height: u64, fork: u8) -> String {
    format!("0x{:02x}{:062x}", fork, height)
}

pub fn block_time(height: u64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_600_000_000 + height as i64 * 12, 0).unwrap()
}

pub fn transfer(height: u64, from: &str, to: &str, value: Wei, tx: &str) -> Transfer {
    Transfer {
        block: height,
        from: Some(from.to_string()),
        to: Some(to.to_string()),
        value,
        time: block_time(height),
        block_hash: block_hash(height),
        tx_hash: tx.to_string(),
        parent_hash: Some(block_hash(height.saturating_sub(1))),
    }
}

pub fn empty_block(height: u64) -> Vec<Transfer> {
    vec![Transfer::empty_block(
        height,
        block_time(height),
        &block_hash(height),
        &block_hash(height.saturating_sub(1)),
    )]
}

/// Same block with its hash and parent hash rewritten.
pub fn rehash(mut transfers: Vec<Transfer>, hash: &str, parent: &str) -> Vec<Transfer> {
    for t in &mut transfers {
        if t.is_empty_block() {
            t.tx_hash = hash.to_string();
        }
        t.block_hash = hash.to_string();
        t.parent_hash = Some(parent.to_string());
    }
    transfers
}

/// Appends empty, hash-linked blocks `from..=to` after bootstrapping at `from`.
pub async fn stage_chain(store: &LedgerStore, from: u64, to: u64) {
    store.append_block_unchecked(&empty_block(from)).await.unwrap();
    for height in (from + 1)..=to {
        store.append_block(&empty_block(height)).await.unwrap();
    }
}

/// Chain whose blocks and histories are set by the test.
#[derive(Default)]
pub struct MockChain {
    pub head: Mutex<u64>,
    pub blocks: Mutex<HashMap<u64, Vec<Transfer>>>,
    pub histories: Mutex<HashMap<String, AddressHistory>>,
    pub history_calls: AtomicUsize,
    pub block_calls: AtomicUsize,
}

impl MockChain {
    pub fn with_head(head: u64) -> Self {
        let chain = Self::default();
        *chain.head.lock().unwrap() = head;
        chain
    }

    pub fn set_block(&self, transfers: Vec<Transfer>) {
        let height = transfers[0].block;
        self.blocks.lock().unwrap().insert(height, transfers);
    }

    pub fn set_history(&self, address: &str, transfers: Vec<Transfer>) {
        self.histories
            .lock()
            .unwrap()
            .insert(address.to_string(), AddressHistory::new(transfers, false));
    }

    /// The indexer lists transactions for `address`, none of which moved value.
    pub fn set_activity_only(&self, address: &str) {
        self.histories
            .lock()
            .unwrap()
            .insert(address.to_string(), AddressHistory::new(Vec::new(), true));
    }

    pub fn history_calls(&self) -> usize {
        self.history_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChainClient for MockChain {
    async fn latest_height(&self) -> Result<u64, ProviderError> {
        Ok(*self.head.lock().unwrap())
    }

    async fn block_transfers(&self, height: u64) -> Result<Vec<Transfer>, ProviderError> {
        self.block_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(transfers) = self.blocks.lock().unwrap().get(&height) {
            return Ok(transfers.clone());
        }
        if height > *self.head.lock().unwrap() {
            return Err(ProviderError::BlockNotFound(height));
        }
        Ok(empty_block(height))
    }

    async fn address_history(&self, address: &str) -> Result<AddressHistory, ProviderError> {
        self.history_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .histories
            .lock()
            .unwrap()
            .get(address)
            .cloned()
            .unwrap_or_default())
    }
}

/// One dollar per wei, so the dollar tally mirrors the wei tally.
#[derive(Default)]
pub struct MockNormalizer {
    pub calls: AtomicUsize,
    pub fail: bool,
}

#[async_trait]
impl RateNormalizer for MockNormalizer {
    async fn tally_dollars(&self, values: &[DatedValue]) -> Result<String, RateNormalizationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(RateNormalizationError::Status {
                status: 500,
                body: "rates unavailable".to_string(),
            });
        }
        let sum: i128 = values.iter().map(|v| v.value).sum();
        Ok(format!("{:.2}", sum as f64))
    }
}
