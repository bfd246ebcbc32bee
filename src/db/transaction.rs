use super::{transfer_from_row, LedgerStore, StoreError};
use crate::models::Transfer;

impl LedgerStore {
    /// Canonical transfers from `from` to `to`, newest first.
    pub async fn query(&self, from: &str, to: &str) -> Result<Vec<Transfer>, StoreError> {
        let rows = sqlx::query(
            r#"SELECT block, fromaddr, toaddr, blockts, bkhash, txhash, value
               FROM transfers
               WHERE fromaddr = ? AND toaddr = ?
               ORDER BY blockts DESC, block DESC"#,
        )
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(transfer_from_row).collect()
    }

    /// Canonical rows touching `address` in either direction.
    pub async fn count_transfers(&self, address: &str) -> Result<i64, StoreError> {
        let count = sqlx::query_scalar(
            "SELECT COUNT(*) FROM transfers WHERE fromaddr = ? OR toaddr = ?",
        )
        .bind(address)
        .bind(address)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    pub async fn canonical_count(&self) -> Result<i64, StoreError> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM transfers")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
