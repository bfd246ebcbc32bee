//! Address history from the block explorer's account `txlist` endpoint.

use crate::blockchain::client::{EthereumClient, ProviderError};
use crate::blockchain::models::{history_transfer, ExplorerResponse, ExplorerTransaction};
use crate::models::AddressHistory;
use std::collections::HashSet;
use std::sync::atomic::Ordering;
use tracing::debug;

/// The explorer caps a single `txlist` answer at this many rows.
pub const EXPLORER_PAGE_CAP: usize = 10_000;

const NO_TRANSACTIONS: &str = "No transactions found";

/// Start block of the next page, `None` once the history is complete.
///
/// A full page whose rows all sit in `start_block` cannot be paged past, so the
/// history would be incomplete; that is an error rather than a silent cut.
fn next_start_block(page: &[ExplorerTransaction], start_block: u64) -> Result<Option<u64>, ProviderError> {
    if page.len() < EXPLORER_PAGE_CAP {
        return Ok(None);
    }

    let highest = page
        .iter()
        .filter_map(|tx| tx.block_number.parse::<u64>().ok())
        .fold(start_block, u64::max);
    if highest == start_block {
        return Err(ProviderError::Explorer(format!(
            "block {} alone fills a {}-row page",
            start_block, EXPLORER_PAGE_CAP
        )));
    }

    Ok(Some(highest))
}

impl EthereumClient {
    /// Fetch every transfer of `address`, re-querying from the highest block seen
    /// while pages come back full.
    pub(crate) async fn fetch_address_history(&self, address: &str) -> Result<AddressHistory, ProviderError> {
        let result = self.collect_address_history(address).await;
        match &result {
            Ok(_) => {
                self.txlist_hits.fetch_add(1, Ordering::Relaxed);
            }
            Err(_) => self.explorer_errors.record(),
        }
        result
    }

    async fn collect_address_history(&self, address: &str) -> Result<AddressHistory, ProviderError> {
        let mut start_block = 0u64;
        let mut seen = HashSet::new();
        let mut transfers = Vec::new();
        let mut active = false;

        loop {
            let page = self.fetch_txlist_page(address, start_block).await?;
            active |= !page.is_empty();

            for tx in &page {
                let Some(transfer) = history_transfer(tx)? else {
                    continue;
                };
                if seen.insert(transfer.tx_hash.clone()) {
                    transfers.push(transfer);
                }
            }

            match next_start_block(&page, start_block)? {
                Some(next) => {
                    debug!(
                        "More than {} results from explorer for {}, fetching from block {}",
                        EXPLORER_PAGE_CAP, address, next
                    );
                    start_block = next;
                }
                None => break,
            }
        }

        debug!("Fetched {} historical transfers for {}", transfers.len(), address);
        Ok(AddressHistory::new(transfers, active))
    }

    async fn fetch_txlist_page(&self, address: &str, start_block: u64) -> Result<Vec<ExplorerTransaction>, ProviderError> {
        self.throttle().await;

        let start_block = start_block.to_string();
        let response = self
            .http
            .get(&self.explorer_url)
            .query(&[
                ("module", "account"),
                ("action", "txlist"),
                ("address", address),
                ("startblock", start_block.as_str()),
                ("sort", "asc"),
                ("apikey", self.explorer_key.as_str()),
            ])
            .header("Accept", "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(ProviderError::Explorer(format!("txlist for {} code: {} error: {}", address, status, text)));
        }

        let body: ExplorerResponse = response.json().await?;
        parse_txlist(body)
    }
}

fn parse_txlist(body: ExplorerResponse) -> Result<Vec<ExplorerTransaction>, ProviderError> {
    if body.status != "1" {
        if body.message.starts_with(NO_TRANSACTIONS) {
            return Ok(Vec::new());
        }
        return Err(ProviderError::Explorer(format!("{}: {}", body.message, body.result)));
    }

    serde_json::from_value(body.result).map_err(|e| ProviderError::Malformed(e.to_string()))
}
