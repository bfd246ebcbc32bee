use crate::blockchain::ChainClient;
use crate::db::LedgerStore;
use crate::service::signature::{recover_signer, SignatureError};
use crate::service::ServiceError;
use crate::validation::normalize_address;
use std::sync::Arc;
use tracing::info;

/// Lazily backfills addresses the first time a query references them.
#[derive(Clone)]
pub struct AddressTracker {
    store: LedgerStore,
    chain: Arc<dyn ChainClient>,
}

impl AddressTracker {
    pub fn new(store: LedgerStore, chain: Arc<dyn ChainClient>) -> Self {
        Self { store, chain }
    }

    /// Make sure `address` (already normalized) has complete canonical history.
    /// Returns `true` when this call performed the backfill.
    pub async fn ensure_tracked(&self, address: &str) -> Result<bool, ServiceError> {
        if self.store.is_tracked(address).await? {
            return Ok(false);
        }

        let history = self.chain.address_history(address).await?;
        self.store.register_history(address, &history).await?;
        info!(
            "Started tracking {} with {} historical transfers",
            address,
            history.transfers.len()
        );

        Ok(true)
    }

    /// Whether `address` has any activity on chain, tracking it as a side effect.
    /// Transactions that moved no value still count.
    pub async fn is_known_on_chain(&self, address: &str) -> Result<bool, ServiceError> {
        let address = normalize_address(address)?;
        self.ensure_tracked(&address).await?;

        let active = self
            .store
            .tracked_address(&address)
            .await?
            .is_some_and(|tracked| tracked.active);
        Ok(active || self.store.count_transfers(&address).await? > 0)
    }

    /// Check that `address`, which must be known on chain, signed `message`.
    /// Signature and message arrive base64-encoded.
    pub async fn verify_signature(&self, signature: &str, message: &str, address: &str) -> Result<(), ServiceError> {
        let address = normalize_address(address)?;
        if !self.is_known_on_chain(&address).await? {
            return Err(SignatureError::Unknown(address).into());
        }

        let signer = recover_signer(signature, message)?;
        if signer != address {
            return Err(SignatureError::Mismatch(address).into());
        }
        Ok(())
    }
}
