//! Staging buffer: block ingestion with hash-chain continuity, promotion to the
//! canonical table, pruning and reorg rollback.

use super::{ContinuityError, LedgerStore, StoreError, PROMOTION_WINDOW, STAGING_DEPTH};
use crate::models::Transfer;
use sqlx::{Sqlite, Transaction};
use tracing::{debug, info};

/// Rows removed by a rollback.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RollbackSummary {
    pub staging_rows: u64,
    pub canonical_rows: u64,
    pub tracked_addresses: u64,
}

/// Height, hash and parent hash shared by every transfer of one block.
struct BlockHeader<'a> {
    height: u64,
    hash: &'a str,
    parent_hash: Option<&'a str>,
}

fn block_header(transfers: &[Transfer]) -> Result<BlockHeader<'_>, StoreError> {
    let first = transfers
        .first()
        .ok_or_else(|| StoreError::InvalidBlock("no transfers".to_string()))?;

    if transfers.iter().any(|t| t.block != first.block) {
        return Err(StoreError::InvalidBlock(format!(
            "transfers span multiple blocks starting at {}",
            first.block
        )));
    }
    if transfers.iter().any(|t| t.block_hash != first.block_hash) {
        return Err(StoreError::InvalidBlock(format!(
            "transfers of block {} disagree on the block hash",
            first.block
        )));
    }
    if transfers.iter().any(|t| t.parent_hash != first.parent_hash) {
        return Err(StoreError::InvalidBlock(format!(
            "transfers of block {} disagree on the parent hash",
            first.block
        )));
    }

    Ok(BlockHeader {
        height: first.block,
        hash: &first.block_hash,
        parent_hash: first.parent_hash.as_deref(),
    })
}

impl LedgerStore {
    /// Append the next block on top of the frontier.
    ///
    /// Fails with a continuity error, leaving staging untouched, unless the
    /// frontier is exactly `height - 1` and its stored hash equals this block's
    /// parent hash.
    pub async fn append_block(&self, transfers: &[Transfer]) -> Result<(), StoreError> {
        let header = block_header(transfers)?;
        let mut tx = self.begin_write().await?;

        let tip: Option<(i64, String)> = sqlx::query_as(
            "SELECT block, bkhash FROM staging
             WHERE block = (SELECT MAX(block) FROM staging) LIMIT 1",
        )
        .fetch_optional(&mut *tx)
        .await?;

        let Some((frontier, tip_hash)) = tip else {
            return Err(ContinuityError::Empty { height: header.height }.into());
        };
        let frontier = frontier as u64;
        if frontier + 1 != header.height {
            return Err(ContinuityError::Gap {
                height: header.height,
                frontier,
            }
            .into());
        }
        if header.parent_hash != Some(tip_hash.as_str()) {
            return Err(ContinuityError::ParentMismatch {
                height: header.height,
                expected: header.parent_hash.unwrap_or_default().to_string(),
                found: tip_hash,
            }
            .into());
        }

        ingest(&mut tx, transfers, header.height).await?;
        tx.commit().await?;

        debug!("Appended block {} ({})", header.height, header.hash);
        Ok(())
    }

    /// Append a block without the continuity precondition. Used to bootstrap an
    /// empty store and to seed older blocks below the minimum frontier.
    pub async fn append_block_unchecked(&self, transfers: &[Transfer]) -> Result<(), StoreError> {
        let header = block_header(transfers)?;
        let mut tx = self.begin_write().await?;

        ingest(&mut tx, transfers, header.height).await?;
        tx.commit().await?;

        debug!("Appended unchecked block {} ({})", header.height, header.hash);
        Ok(())
    }

    /// Roll back everything at or above `height`: staging rows, canonical rows and
    /// addresses whose backfill was bounded by a frontier inside the removed range.
    /// Safe to repeat; re-ingestion can resume at `height` right after.
    pub async fn delete_from(&self, height: u64) -> Result<RollbackSummary, StoreError> {
        let height = height as i64;
        let mut tx = self.begin_write().await?;

        let staging_rows = sqlx::query("DELETE FROM staging WHERE block >= ?")
            .bind(height)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let canonical_rows = sqlx::query("DELETE FROM transfers WHERE block >= ?")
            .bind(height)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let tracked_addresses = sqlx::query("DELETE FROM tracked_addresses WHERE registered_block >= ?")
            .bind(height)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;

        let summary = RollbackSummary {
            staging_rows,
            canonical_rows,
            tracked_addresses,
        };
        info!("Rolled back ledger from block {}: {:?}", height, summary);
        Ok(summary)
    }

    /// Highest staged block.
    pub async fn frontier(&self) -> Result<Option<u64>, StoreError> {
        let max: Option<i64> = sqlx::query_scalar("SELECT MAX(block) FROM staging")
            .fetch_one(&self.pool)
            .await?;
        Ok(max.map(|b| b as u64))
    }

    /// Lowest staged block.
    pub async fn min_frontier(&self) -> Result<Option<u64>, StoreError> {
        let min: Option<i64> = sqlx::query_scalar("SELECT MIN(block) FROM staging")
            .fetch_one(&self.pool)
            .await?;
        Ok(min.map(|b| b as u64))
    }

    /// All staged rows of one block.
    pub async fn staged_block(&self, height: u64) -> Result<Vec<Transfer>, StoreError> {
        let rows = sqlx::query(
            "SELECT block, fromaddr, toaddr, blockts, bkhash, txhash, value
             FROM staging WHERE block = ? ORDER BY txhash",
        )
        .bind(height as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(super::transfer_from_row).collect()
    }

    pub async fn staging_count(&self) -> Result<i64, StoreError> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM staging")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

/// Insert into staging, promote tracked rows of the recent window to canonical and
/// prune staging below the retained depth, all inside the caller's transaction.
async fn ingest(
    tx: &mut Transaction<'_, Sqlite>,
    transfers: &[Transfer],
    height: u64,
) -> Result<(), StoreError> {
    for transfer in transfers {
        sqlx::query(
            "INSERT OR IGNORE INTO staging (block, fromaddr, toaddr, blockts, bkhash, txhash, value)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(height as i64)
        .bind(&transfer.from)
        .bind(&transfer.to)
        .bind(transfer.time.timestamp())
        .bind(&transfer.block_hash)
        .bind(&transfer.tx_hash)
        .bind(transfer.value.to_string())
        .execute(&mut **tx)
        .await?;
    }

    sqlx::query(
        "INSERT OR IGNORE INTO transfers (block, fromaddr, toaddr, blockts, bkhash, txhash, value)
         SELECT block, fromaddr, toaddr, blockts, bkhash, txhash, value FROM staging
         WHERE block >= ? AND block <= ?
           AND (fromaddr IN (SELECT address FROM tracked_addresses)
                OR toaddr IN (SELECT address FROM tracked_addresses))",
    )
    .bind(height.saturating_sub(PROMOTION_WINDOW) as i64)
    .bind(height as i64)
    .execute(&mut **tx)
    .await?;

    // Relative to the appended block, so seeding below the window prunes nothing
    if height > STAGING_DEPTH {
        sqlx::query("DELETE FROM staging WHERE block < ?")
            .bind((height - STAGING_DEPTH) as i64)
            .execute(&mut **tx)
            .await?;
    }

    Ok(())
}
