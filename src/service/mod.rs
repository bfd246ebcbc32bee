pub mod normalizer;
pub mod signature;
pub mod tally;
pub mod tracker;

use crate::blockchain::ProviderError;
use crate::db::StoreError;
use crate::validation::ValidationError;
use normalizer::RateNormalizationError;
use signature::SignatureError;
use thiserror::Error;

pub use normalizer::{HttpRateNormalizer, RateNormalizer};
pub use tally::{Tally, TallyEngine, TallyEntry, TallyOptions, TallyResult};
pub use tracker::AddressTracker;

/// Errors surfaced to request-time callers. Nothing here is retried.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    RateNormalization(#[from] RateNormalizationError),

    #[error(transparent)]
    Signature(#[from] SignatureError),

    #[error("Value out of range: {0}")]
    ValueOverflow(String),
}
