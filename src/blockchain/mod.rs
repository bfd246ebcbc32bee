pub mod client;
pub mod explorer;
pub mod models;
pub mod polling;

// Re-exports for convenience
pub use client::{ChainClient, EthereumClient, ProviderError};
pub use polling::start_sync;
