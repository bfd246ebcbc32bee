//! Counters reported by `/status.json`.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Error total plus the change since the previous report.
#[derive(Debug, Default)]
pub struct ErrorCounter {
    errors: AtomicU64,
    last_check: AtomicU64,
}

impl ErrorCounter {
    pub fn record(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn errors(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }

    /// Snapshot; the delta restarts from here.
    pub fn report(&self) -> ErrorReport {
        let errors = self.errors();
        let last = self.last_check.swap(errors, Ordering::Relaxed);
        ErrorReport {
            errors,
            errors_delta: errors.saturating_sub(last),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorReport {
    pub errors: u64,
    pub errors_delta: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplorerReport {
    #[serde(flatten)]
    pub errors: ErrorReport,
    pub txlist_for_address_hits: u64,
}

/// Node and explorer health of a chain client.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ChainReport {
    pub eth: ErrorReport,
    pub etherscan: ExplorerReport,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheReport {
    pub hits: u64,
    pub misses: u64,
    pub caches: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_delta_resets_per_report() {
        let counter = ErrorCounter::default();
        counter.record();
        counter.record();
        assert_eq!(counter.report(), ErrorReport { errors: 2, errors_delta: 2 });

        counter.record();
        assert_eq!(counter.report(), ErrorReport { errors: 3, errors_delta: 1 });
        assert_eq!(counter.report(), ErrorReport { errors: 3, errors_delta: 0 });
    }

    #[test]
    fn test_report_field_names() {
        let report = ExplorerReport {
            errors: ErrorReport { errors: 1, errors_delta: 1 },
            txlist_for_address_hits: 4,
        };
        let json = serde_json::to_value(report).unwrap();
        assert_eq!(json["errors"], 1);
        assert_eq!(json["errorsDelta"], 1);
        assert_eq!(json["txlistForAddressHits"], 4);
    }
}
