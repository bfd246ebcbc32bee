pub mod keys;
pub mod tally;

pub use keys::TallyCacheKey;
pub use tally::TallyCacheManager;

use crate::config::Config;

pub fn init_cache(config: &Config) -> TallyCacheManager {
    TallyCacheManager::new(config.cache_max_capacity, config.cache_ttl)
}
