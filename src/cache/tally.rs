//! Tally replay cache implementation using Moka

use super::keys::TallyCacheKey;
use crate::metrics::CacheReport;
use crate::service::TallyResult;
use moka::future::Cache;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Caches tally answers under their `as-of` so a resubmitted `as-of` replays the
/// identical answer.
#[derive(Clone)]
pub struct TallyCacheManager {
    cache: Cache<TallyCacheKey, TallyResult>,
    hits: Arc<AtomicU64>,
    misses: Arc<AtomicU64>,
    caches: Arc<AtomicU64>,
}

impl TallyCacheManager {
    pub fn new(capacity: u64, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(capacity)
            .time_to_live(ttl)
            .build();

        Self {
            cache,
            hits: Arc::new(AtomicU64::new(0)),
            misses: Arc::new(AtomicU64::new(0)),
            caches: Arc::new(AtomicU64::new(0)),
        }
    }

    pub async fn get(&self, key: &TallyCacheKey) -> Option<TallyResult> {
        let result = self.cache.get(key).await;
        if result.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            debug!("Cache hit for key: {}", key);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            debug!("Cache miss for key: {}", key);
        }
        result
    }

    pub async fn insert(&self, key: TallyCacheKey, value: TallyResult) {
        debug!("Cached tally for key: {}", key);
        self.cache.insert(key, value).await;
        self.caches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn report(&self) -> CacheReport {
        CacheReport {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            caches: self.caches.load(Ordering::Relaxed),
        }
    }
}
