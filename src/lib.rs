pub mod api;
pub mod blockchain;
pub mod cache;
pub mod config;
pub mod db;
pub mod metrics;
pub mod models;
pub mod service;
pub mod state;
pub mod validation;

#[cfg(test)]
pub mod tests;

// Re-exports for convenience
pub use api::create_router;
pub use blockchain::{ChainClient, EthereumClient, ProviderError};
pub use db::{LedgerStore, StoreError};
pub use models::{AddressHistory, TrackedAddress, Transfer};
pub use service::{AddressTracker, ServiceError, TallyEngine, TallyOptions, TallyResult};
pub use state::AppState;
