//! Block-explorer wire models, and conversion of node blocks and explorer rows
//! into ledger transfers.

use crate::blockchain::client::ProviderError;
use crate::models::{Transfer, Wei};
use chrono::{DateTime, TimeZone, Utc};
use ethers::types::{Block, Transaction as EthTransaction};
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
pub struct ExplorerResponse {
    pub status: String,
    pub message: String,
    pub result: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplorerTransaction {
    pub block_number: String,
    pub time_stamp: String,
    pub hash: String,
    pub block_hash: String,
    pub from: String,
    #[serde(default)]
    pub to: String,
    pub value: String,
    #[serde(default)]
    pub is_error: Option<String>,
}

fn unix_time(seconds: u64) -> Result<DateTime<Utc>, ProviderError> {
    Utc.timestamp_opt(seconds as i64, 0)
        .single()
        .ok_or_else(|| ProviderError::Malformed(format!("timestamp {}", seconds)))
}

fn normalize(address: &str) -> Option<String> {
    if address.is_empty() {
        None
    } else {
        Some(address.to_lowercase())
    }
}

/// Value-carrying transfers of a block, or the single empty-block placeholder.
pub fn block_transfers(block: Block<EthTransaction>) -> Result<Vec<Transfer>, ProviderError> {
    let height = block
        .number
        .ok_or_else(|| ProviderError::Malformed("block without a number".to_string()))?
        .as_u64();
    let hash = block
        .hash
        .map(|h| format!("{:#x}", h))
        .ok_or_else(|| ProviderError::Malformed(format!("block {} without a hash", height)))?;
    let parent_hash = format!("{:#x}", block.parent_hash);
    let seconds = u64::try_from(block.timestamp)
        .map_err(|_| ProviderError::Malformed(format!("timestamp {}", block.timestamp)))?;
    let time = unix_time(seconds)?;

    let mut transfers = Vec::new();
    for tx in &block.transactions {
        if tx.value.is_zero() {
            continue;
        }
        let value = Wei::try_from(tx.value)
            .map_err(|_| ProviderError::Malformed(format!("value {} of {:#x}", tx.value, tx.hash)))?;
        transfers.push(Transfer {
            block: height,
            from: Some(format!("{:#x}", tx.from)),
            to: tx.to.map(|to| format!("{:#x}", to)),
            value,
            time,
            block_hash: hash.clone(),
            tx_hash: format!("{:#x}", tx.hash),
            parent_hash: Some(parent_hash.clone()),
        });
    }

    if transfers.is_empty() {
        transfers.push(Transfer::empty_block(height, time, &hash, &parent_hash));
    }

    Ok(transfers)
}

/// Explorer history entry as a transfer; failed and zero-value transactions are skipped.
pub fn history_transfer(tx: &ExplorerTransaction) -> Result<Option<Transfer>, ProviderError> {
    if tx.is_error.as_deref() == Some("1") {
        return Ok(None);
    }

    let value: Wei = tx
        .value
        .parse()
        .map_err(|_| ProviderError::Malformed(format!("value {}", tx.value)))?;
    if value == 0 {
        return Ok(None);
    }

    let block = tx
        .block_number
        .parse()
        .map_err(|_| ProviderError::Malformed(format!("block {}", tx.block_number)))?;
    let seconds = tx
        .time_stamp
        .parse()
        .map_err(|_| ProviderError::Malformed(format!("timestamp {}", tx.time_stamp)))?;

    Ok(Some(Transfer {
        block,
        from: normalize(&tx.from),
        to: normalize(&tx.to),
        value,
        time: unix_time(seconds)?,
        block_hash: tx.block_hash.to_lowercase(),
        tx_hash: tx.hash.to_lowercase(),
        parent_hash: None,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    use ethers::types::{Address, H256, U256};

    fn eth_block(transactions: Vec<EthTransaction>) -> Block<EthTransaction> {
        Block {
            number: Some(100u64.into()),
            hash: Some(H256::repeat_byte(0xab)),
            parent_hash: H256::repeat_byte(0xaa),
            timestamp: U256::from(100_000_000u64),
            transactions,
            ..Default::default()
        }
    }

    fn eth_transaction(hash: u8, to: Option<Address>, value: U256) -> EthTransaction {
        EthTransaction {
            hash: H256::repeat_byte(hash),
            from: Address::repeat_byte(0xa1),
            to,
            value,
            ..Default::default()
        }
    }

    #[test]
    fn test_block_without_value_becomes_placeholder() {
        let block = eth_block(vec![eth_transaction(
            0x01,
            Some(Address::repeat_byte(0xb2)),
            U256::zero(),
        )]);

        let transfers = block_transfers(block).unwrap();
        assert_eq!(transfers.len(), 1);
        assert!(transfers[0].is_empty_block());
        assert_eq!(transfers[0].block, 100);
        assert_eq!(transfers[0].tx_hash, format!("0x{}", "ab".repeat(32)));
        assert_eq!(transfers[0].parent_hash, Some(format!("0x{}", "aa".repeat(32))));
        assert_eq!(transfers[0].time.timestamp(), 100_000_000);
    }

    #[test]
    fn test_block_keeps_value_transfers_only() {
        let block = eth_block(vec![
            eth_transaction(0x01, Some(Address::repeat_byte(0xb2)), U256::exp10(18)),
            eth_transaction(0x02, None, U256::zero()),
        ]);

        let transfers = block_transfers(block).unwrap();
        assert_eq!(transfers.len(), 1);
        assert_eq!(transfers[0].value, 1_000_000_000_000_000_000);
        assert_eq!(transfers[0].from, Some(format!("0x{}", "a1".repeat(20))));
        assert_eq!(transfers[0].to, Some(format!("0x{}", "b2".repeat(20))));
        assert_eq!(transfers[0].tx_hash, format!("0x{}", "01".repeat(32)));
    }

    #[test]
    fn test_block_rejects_oversized_value() {
        let block = eth_block(vec![eth_transaction(0x01, None, U256::MAX)]);
        assert!(matches!(block_transfers(block), Err(ProviderError::Malformed(_))));
    }

    #[test]
    fn test_pending_block_is_malformed() {
        let block = Block::<EthTransaction> {
            number: None,
            ..eth_block(Vec::new())
        };
        assert!(matches!(block_transfers(block), Err(ProviderError::Malformed(_))));
    }

    #[test]
    fn test_history_transfer_skips_failed() {
        let tx = ExplorerTransaction {
            block_number: "12".to_string(),
            time_stamp: "1000".to_string(),
            hash: "0xff".to_string(),
            block_hash: "0xee".to_string(),
            from: "0xA".to_string(),
            to: "0xB".to_string(),
            value: "5".to_string(),
            is_error: Some("1".to_string()),
        };
        assert!(history_transfer(&tx).unwrap().is_none());

        let ok = ExplorerTransaction { is_error: Some("0".to_string()), ..tx };
        let transfer = history_transfer(&ok).unwrap().unwrap();
        assert_eq!(transfer.block, 12);
        assert_eq!(transfer.value, 5);
        assert_eq!(transfer.to.as_deref(), Some("0xb"));
    }
}
