use crate::{
    api::{error::ApiError, response::with_cache_status},
    cache::TallyCacheKey,
    service::TallyOptions,
    state::AppState,
    validation::{normalize_address, parse_flag, validate_count, validate_timestamp, ValidationError},
};
use axum::{
    extract::{Path, Query, State},
    response::Response,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

// GET /get-transactions/{from}/{to} query parameters
#[derive(Debug, Default, Deserialize)]
pub struct TransactionsQuery {
    #[serde(rename = "max-most-recent")]
    pub max_most_recent: Option<String>,
    pub since: Option<String>,
    #[serde(rename = "as-of")]
    pub as_of: Option<String>,
    #[serde(rename = "tally-only")]
    pub tally_only: Option<String>,
    #[serde(rename = "tally-dollars")]
    pub tally_dollars: Option<String>,
    #[serde(rename = "include-refunds")]
    pub include_refunds: Option<String>,
    #[serde(rename = "confirmations-required")]
    pub confirmations_required: Option<String>,
}

impl TransactionsQuery {
    pub fn to_options(&self) -> Result<TallyOptions, ValidationError> {
        let max_most_recent = self
            .max_most_recent
            .as_deref()
            .map(|v| validate_count("max-most-recent", v).map(|n| n as usize))
            .transpose()?;
        let since = self
            .since
            .as_deref()
            .map(|v| validate_timestamp("since", v))
            .transpose()?;
        let as_of = self
            .as_of
            .as_deref()
            .map(|v| validate_timestamp("as-of", v))
            .transpose()?;
        let confirmations = self
            .confirmations_required
            .as_deref()
            .map(|v| validate_count("confirmations-required", v))
            .transpose()?
            .unwrap_or(0);

        Ok(TallyOptions {
            max_most_recent,
            since,
            as_of,
            tally_only: parse_flag(self.tally_only.as_deref()),
            tally_dollars: parse_flag(self.tally_dollars.as_deref()),
            include_refunds: parse_flag(self.include_refunds.as_deref()),
            confirmations,
        })
    }
}

// POST /is-signature-valid body; every field is base64
#[derive(Debug, Deserialize)]
pub struct SignatureRequest {
    pub signature: String,
    pub message: String,
    pub address: String,
}

// Create router with all routes
pub fn create_router(app_state: Arc<AppState>) -> Router {
    Router::new()
        .route("/get-transactions/{from}/{to}", get(get_transactions))
        .route("/is-address-known/{address}", get(is_address_known))
        .route("/is-signature-valid", post(is_signature_valid))
        .route("/status.json", get(status))
        .layer(CorsLayer::permissive())
        .with_state(app_state)
}

// GET /get-transactions handler
async fn get_transactions(
    State(state): State<Arc<AppState>>,
    Path((from, to)): Path<(String, String)>,
    Query(params): Query<TransactionsQuery>,
) -> Result<Response, ApiError> {
    let options = params.to_options()?;
    let from = normalize_address(&from)?;
    let to = normalize_address(&to)?;

    info!("Processing get-transactions {} -> {} with {:?}", from, to, options);

    if options.is_cacheable() {
        if let Some(key) = TallyCacheKey::for_request(&from, &to, &options) {
            if let Some(cached) = state.cache.get(&key).await {
                return Ok(with_cache_status(&cached, true));
            }
        }
    }

    let result = state.tally.get_transactions(&from, &to, &options).await?;

    if options.is_cacheable() {
        let key = TallyCacheKey::new(&from, &to, &options, result.as_of);
        state.cache.insert(key, result.clone()).await;
    }

    Ok(with_cache_status(&result, false))
}

// GET /is-address-known handler
async fn is_address_known(
    State(state): State<Arc<AppState>>,
    Path(address): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let known = state.tracker.is_known_on_chain(&address).await?;
    Ok(Json(json!({ "address": address.to_lowercase(), "known": known })))
}

// POST /is-signature-valid handler
async fn is_signature_valid(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SignatureRequest>,
) -> Result<Json<Value>, ApiError> {
    state
        .tracker
        .verify_signature(&request.signature, &request.message, &request.address)
        .await?;
    Ok(Json(json!({ "valid": true })))
}

/// Upstream error counters and tally cache effectiveness.
pub fn metrics(state: &AppState) -> Value {
    let chain = state.chain.report();
    json!({
        "eth": chain.eth,
        "etherscan": chain.etherscan,
        "tallyCache": state.cache.report(),
    })
}

// GET /status.json handler
async fn status(State(state): State<Arc<AppState>>) -> Json<Value> {
    let frontier = state.store.frontier().await;
    let min_frontier = state.store.min_frontier().await;
    let healthy = frontier.is_ok() && min_frontier.is_ok();

    Json(json!({
        "healthy": healthy,
        "frontier": frontier.ok().flatten(),
        "min-frontier": min_frontier.ok().flatten(),
        "expected-confirmations": state.config.expected_confirmations,
        "metrics": metrics(&state),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_to_options() {
        let query = TransactionsQuery {
            max_most_recent: Some("2".to_string()),
            since: Some("2021-01-01T00:00:00Z".to_string()),
            tally_only: Some("true".to_string()),
            include_refunds: Some("t".to_string()),
            confirmations_required: Some("12".to_string()),
            ..Default::default()
        };

        let options = query.to_options().unwrap();
        assert_eq!(options.max_most_recent, Some(2));
        assert_eq!(options.since.map(|t| t.timestamp()), Some(1609459200));
        assert!(options.tally_only);
        assert!(!options.tally_dollars);
        assert!(options.include_refunds);
        assert_eq!(options.confirmations, 12);
        assert!(options.as_of.is_none());
    }

    #[test]
    fn test_query_rejects_bad_values() {
        let query = TransactionsQuery {
            max_most_recent: Some("-1".to_string()),
            ..Default::default()
        };
        assert!(query.to_options().is_err());

        let query = TransactionsQuery {
            as_of: Some("not a date".to_string()),
            ..Default::default()
        };
        assert!(query.to_options().is_err());
    }
}
