use crate::blockchain::ChainClient;
use crate::cache::{self, TallyCacheManager};
use crate::config::Config;
use crate::db::LedgerStore;
use crate::service::{AddressTracker, RateNormalizer, TallyEngine};
use std::sync::Arc;

/// Services built once at startup and shared by every request handler.
pub struct AppState {
    pub config: Config,
    pub store: LedgerStore,
    pub chain: Arc<dyn ChainClient>,
    pub tracker: AddressTracker,
    pub tally: TallyEngine,
    pub cache: TallyCacheManager,
}

impl AppState {
    pub fn new(
        config: Config,
        store: LedgerStore,
        chain: Arc<dyn ChainClient>,
        normalizer: Arc<dyn RateNormalizer>,
    ) -> Self {
        let tracker = AddressTracker::new(store.clone(), chain.clone());
        let tally = TallyEngine::new(
            store.clone(),
            tracker.clone(),
            normalizer,
            config.expected_confirmations,
        );
        let cache = cache::init_cache(&config);

        Self {
            config,
            store,
            chain,
            tracker,
            tally,
            cache,
        }
    }
}
