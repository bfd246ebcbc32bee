// Transfer and tracked-address models shared by the chain client, the ledger store
// and the tally engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Amount in the chain's smallest unit.
pub type Wei = u128;

/// A native-value transfer observed in a block.
///
/// A block without any value-carrying transaction is represented by a single
/// sentinel transfer with no `from`/`to` and a zero value, so that the block and its
/// hash still land in staging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub block: u64,
    pub from: Option<String>,
    pub to: Option<String>,
    pub value: Wei,
    pub time: DateTime<Utc>,
    pub block_hash: String,
    pub tx_hash: String,
    /// Only known for transfers fetched block-by-block from the node.
    pub parent_hash: Option<String>,
}

impl Transfer {
    /// The placeholder row for a block with no value transfers. The block hash
    /// doubles as the transaction hash.
    pub fn empty_block(block: u64, time: DateTime<Utc>, block_hash: &str, parent_hash: &str) -> Self {
        Self {
            block,
            from: None,
            to: None,
            value: 0,
            time,
            block_hash: block_hash.to_string(),
            tx_hash: block_hash.to_string(),
            parent_hash: Some(parent_hash.to_string()),
        }
    }

    pub fn is_empty_block(&self) -> bool {
        self.from.is_none() && self.to.is_none() && self.value == 0
    }
}

/// Backfilled history of one address.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressHistory {
    /// Value transfers, ready for the canonical table.
    pub transfers: Vec<Transfer>,
    /// The indexer listed at least one transaction, including failed and
    /// zero-value ones that never become transfers.
    pub active: bool,
}

impl AddressHistory {
    pub fn new(transfers: Vec<Transfer>, active: bool) -> Self {
        Self {
            active: active || !transfers.is_empty(),
            transfers,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackedAddress {
    pub address: String,
    pub last_checked: DateTime<Utc>,
    /// Staging frontier at the moment the address was backfilled.
    pub registered_block: i64,
    /// Any on-chain activity was found during backfill.
    pub active: bool,
}
