//! Transfer listings and tallies between two addresses, with confirmation, time
//! window, refund and fiat semantics.

use crate::db::LedgerStore;
use crate::models::{Transfer, Wei};
use crate::service::normalizer::{DatedValue, RateNormalizer};
use crate::service::tracker::AddressTracker;
use crate::service::ServiceError;
use crate::validation::normalize_address;
use chrono::{DateTime, SubsecRound, Utc};
use serde::{Serialize, Serializer};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct TallyOptions {
    pub max_most_recent: Option<usize>,
    /// Inclusive lower time bound.
    pub since: Option<DateTime<Utc>>,
    /// Inclusive upper time bound; also the replay key of a previous answer.
    pub as_of: Option<DateTime<Utc>>,
    pub tally_only: bool,
    pub tally_dollars: bool,
    pub include_refunds: bool,
    pub confirmations: u64,
}

impl TallyOptions {
    /// Listing-free answers are the ones worth caching.
    pub fn is_cacheable(&self) -> bool {
        self.tally_only || self.tally_dollars
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tally {
    Wei(i128),
    Dollars(String),
}

impl Serialize for Tally {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Tally::Wei(value) => serializer.collect_str(value),
            Tally::Dollars(dollars) => serializer.serialize_str(dollars),
        }
    }
}

fn as_decimal_string<S: Serializer>(value: &Wei, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(value)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TallyEntry {
    #[serde(rename = "transaction-value", serialize_with = "as_decimal_string")]
    pub value: Wei,
    #[serde(rename = "transaction-date")]
    pub time: DateTime<Utc>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub block: u64,
    /// Transfer in the reverse direction, subtracted from the tally.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub refund: bool,
}

impl TallyEntry {
    fn new(transfer: Transfer, refund: bool) -> Self {
        Self {
            value: transfer.value,
            time: transfer.time,
            from: transfer.from,
            to: transfer.to,
            block: transfer.block,
            refund,
        }
    }

    pub fn signed_value(&self) -> Result<i128, ServiceError> {
        let value =
            i128::try_from(self.value).map_err(|_| ServiceError::ValueOverflow(format!("{} wei", self.value)))?;
        Ok(if self.refund { -value } else { value })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TallyResult {
    pub tally: Tally,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transactions: Option<Vec<TallyEntry>>,
    #[serde(rename = "as-of")]
    pub as_of: DateTime<Utc>,
}

/// Highest block a query may see: the frontier, pulled further back when the
/// caller wants more confirmations than the sync already waits for. Never closer to
/// the head than the default.
pub fn highest_allowed_block(frontier: Option<u64>, confirmations: u64, default_confirmations: u64) -> Option<u64> {
    let extra = confirmations.saturating_sub(default_confirmations);
    frontier.and_then(|f| f.checked_sub(extra))
}

/// Order newest first and apply `since`, `as_of` and `max_most_recent`.
pub fn select_entries(mut entries: Vec<TallyEntry>, options: &TallyOptions) -> Vec<TallyEntry> {
    entries.sort_by(|a, b| b.time.cmp(&a.time).then(b.block.cmp(&a.block)));

    let mut picked = Vec::new();
    for entry in entries {
        if options.since.is_some_and(|since| entry.time < since) {
            break;
        }
        if options.as_of.is_some_and(|as_of| entry.time > as_of) {
            continue;
        }
        if options.max_most_recent.is_some_and(|max| picked.len() >= max) {
            break;
        }
        picked.push(entry);
    }
    picked
}

#[derive(Clone)]
pub struct TallyEngine {
    store: LedgerStore,
    tracker: AddressTracker,
    normalizer: Arc<dyn RateNormalizer>,
    default_confirmations: u64,
}

impl TallyEngine {
    pub fn new(
        store: LedgerStore,
        tracker: AddressTracker,
        normalizer: Arc<dyn RateNormalizer>,
        default_confirmations: u64,
    ) -> Self {
        Self {
            store,
            tracker,
            normalizer,
            default_confirmations,
        }
    }

    pub async fn get_transactions(
        &self,
        from: &str,
        to: &str,
        options: &TallyOptions,
    ) -> Result<TallyResult, ServiceError> {
        let from = normalize_address(from)?;
        let to = normalize_address(to)?;

        if from == to {
            self.tracker.ensure_tracked(&from).await?;
        } else {
            futures::future::try_join(self.tracker.ensure_tracked(&from), self.tracker.ensure_tracked(&to)).await?;
        }

        let mut entries: Vec<TallyEntry> = self
            .store
            .query(&from, &to)
            .await?
            .into_iter()
            .map(|t| TallyEntry::new(t, false))
            .collect();
        if options.include_refunds {
            entries.extend(
                self.store
                    .query(&to, &from)
                    .await?
                    .into_iter()
                    .map(|t| TallyEntry::new(t, true)),
            );
        }

        let frontier = self.store.frontier().await?;
        let highest = highest_allowed_block(frontier, options.confirmations, self.default_confirmations);
        entries.retain(|e| highest.is_some_and(|h| e.block <= h));

        let picked = select_entries(entries, options);
        let signed = picked
            .iter()
            .map(TallyEntry::signed_value)
            .collect::<Result<Vec<_>, _>>()?;
        let sum = signed.iter().try_fold(0i128, |acc, v| {
            acc.checked_add(*v)
                .ok_or_else(|| ServiceError::ValueOverflow(format!("tally of {} transfers", signed.len())))
        })?;
        debug!(
            "Tally {} -> {}: {} transfers up to block {:?}, sum {}",
            from,
            to,
            picked.len(),
            highest,
            sum
        );

        let tally = if options.tally_dollars {
            let values: Vec<DatedValue> = picked
                .iter()
                .zip(&signed)
                .map(|(e, value)| DatedValue {
                    value: *value,
                    time: e.time,
                })
                .collect();
            Tally::Dollars(self.normalizer.tally_dollars(&values).await?)
        } else {
            Tally::Wei(sum)
        };

        let transactions = if options.tally_only || options.tally_dollars {
            None
        } else {
            Some(picked)
        };

        Ok(TallyResult {
            tally,
            transactions,
            as_of: options.as_of.unwrap_or_else(|| Utc::now().trunc_subsecs(0)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(value: Wei, refund: bool) -> TallyEntry {
        TallyEntry {
            value,
            time: Utc::now(),
            from: Some("0x01".to_string()),
            to: Some("0x02".to_string()),
            block: 1,
            refund,
        }
    }

    #[test]
    fn test_signed_value_applies_refund_sign() {
        assert_eq!(entry(40, true).signed_value().unwrap(), -40);
        assert_eq!(entry(40, false).signed_value().unwrap(), 40);
    }

    #[test]
    fn test_signed_value_rejects_values_beyond_i128() {
        assert!(matches!(
            entry(u128::MAX, false).signed_value(),
            Err(ServiceError::ValueOverflow(_))
        ));
        assert!(entry(i128::MAX as u128, true).signed_value().is_ok());
    }
}
