//! Cache key generation for tally replays

use crate::service::TallyOptions;
use chrono::{DateTime, Utc};
use std::fmt;

/// Identifies a tally answer: the address pair, every option that changes the
/// result, and the `as-of` instant it was computed for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TallyCacheKey {
    pub from: String,
    pub to: String,
    pub max_most_recent: Option<usize>,
    pub since: Option<DateTime<Utc>>,
    pub as_of: DateTime<Utc>,
    pub tally_dollars: bool,
    pub include_refunds: bool,
    pub confirmations: u64,
}

impl TallyCacheKey {
    /// Key for a request, or `None` when the request carries no `as-of`.
    pub fn for_request(from: &str, to: &str, options: &TallyOptions) -> Option<Self> {
        options.as_of.map(|as_of| Self::new(from, to, options, as_of))
    }

    /// Key under which an answer computed for `as_of` is stored.
    pub fn new(from: &str, to: &str, options: &TallyOptions, as_of: DateTime<Utc>) -> Self {
        Self {
            from: from.to_lowercase(),
            to: to.to_lowercase(),
            max_most_recent: options.max_most_recent,
            since: options.since,
            as_of,
            tally_dollars: options.tally_dollars,
            include_refunds: options.include_refunds,
            confirmations: options.confirmations,
        }
    }
}

impl fmt::Display for TallyCacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "tally:{}:{}:{:?}:{:?}:{}:{}:{}:{}",
            self.from,
            self.to,
            self.max_most_recent,
            self.since.map(|t| t.timestamp()),
            self.as_of.timestamp(),
            self.tally_dollars,
            self.include_refunds,
            self.confirmations
        )
    }
}
