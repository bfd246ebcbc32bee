use super::{LedgerStore, StoreError, PROMOTION_WINDOW, REGISTER_LAG_MARGIN};
use crate::models::{AddressHistory, TrackedAddress, Transfer};
use chrono::{TimeZone, Utc};
use sqlx::Row;
use tracing::debug;

impl LedgerStore {
    /// Start tracking `address` with its backfilled `history`.
    pub async fn register_address(&self, address: &str, history: &[Transfer]) -> Result<(), StoreError> {
        self.register_history(address, &AddressHistory::new(history.to_vec(), false))
            .await
    }

    /// Start tracking `address`, recording whether the indexer knew it at all.
    ///
    /// Transfers are only taken up to `frontier - REGISTER_LAG_MARGIN`; the most
    /// recent blocks are taken from staging instead, which also covers blocks the
    /// forward sync staged before the address became tracked.
    pub async fn register_history(&self, address: &str, history: &AddressHistory) -> Result<(), StoreError> {
        let mut tx = self.begin_write().await?;

        let frontier: Option<i64> = sqlx::query_scalar("SELECT MAX(block) FROM staging")
            .fetch_one(&mut *tx)
            .await?;
        let frontier = frontier.ok_or(StoreError::NotSynced)? as u64;
        let history_limit = frontier.saturating_sub(REGISTER_LAG_MARGIN);

        let mut inserted = 0u64;
        for transfer in history.transfers.iter().filter(|t| t.block <= history_limit) {
            inserted += sqlx::query(
                "INSERT OR IGNORE INTO transfers (block, fromaddr, toaddr, blockts, bkhash, txhash, value)
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(transfer.block as i64)
            .bind(&transfer.from)
            .bind(&transfer.to)
            .bind(transfer.time.timestamp())
            .bind(&transfer.block_hash)
            .bind(&transfer.tx_hash)
            .bind(transfer.value.to_string())
            .execute(&mut *tx)
            .await?
            .rows_affected();
        }

        let promoted = sqlx::query(
            "INSERT OR IGNORE INTO transfers (block, fromaddr, toaddr, blockts, bkhash, txhash, value)
             SELECT block, fromaddr, toaddr, blockts, bkhash, txhash, value FROM staging
             WHERE (fromaddr = ? OR toaddr = ?) AND block >= ?",
        )
        .bind(address)
        .bind(address)
        .bind(frontier.saturating_sub(PROMOTION_WINDOW) as i64)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        sqlx::query(
            "INSERT INTO tracked_addresses (address, checked, registered_block, active) VALUES (?, ?, ?, ?)
             ON CONFLICT(address) DO NOTHING",
        )
        .bind(address)
        .bind(Utc::now().timestamp())
        .bind(frontier as i64)
        .bind(history.active)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        debug!(
            "Registered {} at frontier {}: {} backfilled, {} from staging, active {}",
            address, frontier, inserted, promoted, history.active
        );
        Ok(())
    }

    /// Whether `address` is tracked; refreshes its last-checked time when it is.
    pub async fn is_tracked(&self, address: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("UPDATE tracked_addresses SET checked = ? WHERE address = ?")
            .bind(Utc::now().timestamp())
            .bind(address)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn tracked_address(&self, address: &str) -> Result<Option<TrackedAddress>, StoreError> {
        let row = sqlx::query(
            "SELECT address, checked, registered_block, active FROM tracked_addresses WHERE address = ?",
        )
        .bind(address)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let checked: i64 = row.try_get("checked")?;
        Ok(Some(TrackedAddress {
            address: row.try_get("address")?,
            last_checked: Utc
                .timestamp_opt(checked, 0)
                .single()
                .ok_or_else(|| StoreError::Malformed(format!("timestamp {}", checked)))?,
            registered_block: row.try_get("registered_block")?,
            active: row.try_get("active")?,
        }))
    }
}
