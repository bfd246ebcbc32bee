pub mod address;
pub mod connection;
pub mod migration;
pub mod staging;
pub mod transaction;

use crate::models::Transfer;
use chrono::{TimeZone, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use thiserror::Error;

/// Staging keeps this many blocks below the frontier for reorg detection.
pub const STAGING_DEPTH: u64 = 100;

/// Blocks below the appended one whose staging rows are (re)promoted to canonical.
pub const PROMOTION_WINDOW: u64 = 3;

/// Backfilled history is only accepted this far below the frontier; the rest comes
/// from staging.
pub const REGISTER_LAG_MARGIN: u64 = 3;

#[derive(Error, Debug)]
pub enum ContinuityError {
    #[error("staging is empty, cannot append block {height}")]
    Empty { height: u64 },

    #[error("block {height} does not extend frontier {frontier}")]
    Gap { height: u64, frontier: u64 },

    #[error("block {height} parent {expected} does not match staged hash {found}")]
    ParentMismatch {
        height: u64,
        expected: String,
        found: String,
    },
}

impl ContinuityError {
    /// Height of the block that failed to append.
    pub fn height(&self) -> u64 {
        match self {
            ContinuityError::Empty { height }
            | ContinuityError::Gap { height, .. }
            | ContinuityError::ParentMismatch { height, .. } => *height,
        }
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Continuity error: {0}")]
    Continuity(#[from] ContinuityError),

    #[error("Invalid block: {0}")]
    InvalidBlock(String),

    #[error("Ledger has not synced any block yet")]
    NotSynced,

    #[error("Malformed stored value: {0}")]
    Malformed(String),

    #[error("Database operation failed: {0}")]
    Operation(#[from] sqlx::Error),
}

/// Transactional ledger over the staging, canonical and tracked-address tables.
///
/// Every write runs in a single SQLite transaction; readers never observe a
/// partially applied block.
#[derive(Clone)]
pub struct LedgerStore {
    pool: SqlitePool,
}

impl LedgerStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Transaction holding the write lock from its first statement. A deferred
    /// transaction that reads before writing fails with `SQLITE_BUSY` instead of
    /// waiting when another writer commits in between.
    pub(crate) async fn begin_write(&self) -> Result<Transaction<'static, Sqlite>, sqlx::Error> {
        self.pool.begin_with("BEGIN IMMEDIATE").await
    }
}

/// Map a staging or canonical row to a `Transfer`.
pub(crate) fn transfer_from_row(row: &SqliteRow) -> Result<Transfer, StoreError> {
    let value: String = row.try_get("value")?;
    let value = value
        .parse()
        .map_err(|_| StoreError::Malformed(format!("value {}", value)))?;

    let blockts: i64 = row.try_get("blockts")?;
    let time = Utc
        .timestamp_opt(blockts, 0)
        .single()
        .ok_or_else(|| StoreError::Malformed(format!("timestamp {}", blockts)))?;

    Ok(Transfer {
        block: row.try_get::<i64, _>("block")? as u64,
        from: row.try_get("fromaddr")?,
        to: row.try_get("toaddr")?,
        value,
        time,
        block_hash: row.try_get("bkhash")?,
        tx_hash: row.try_get("txhash")?,
        parent_hash: None,
    })
}
