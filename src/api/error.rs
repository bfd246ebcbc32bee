use crate::db::StoreError;
use crate::service::ServiceError;
use crate::validation::ValidationError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Ledger is still synchronizing")]
    NotReady,

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotReady => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ApiError::Database(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            ApiError::BadRequest(_) | ApiError::NotReady => self.to_string(),
            ApiError::Upstream(_) => "Upstream service error".to_string(),
            ApiError::Database(_) => "Database error occurred".to_string(),
            ApiError::Internal(_) => "Internal error".to_string(),
        };

        let body = Json(json!({
            "error": message,
        }));

        (status, body).into_response()
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Validation(e) => e.into(),
            ServiceError::Store(StoreError::NotSynced) => ApiError::NotReady,
            ServiceError::Store(e) => {
                error!("Store error while serving request: {}", e);
                ApiError::Database(e.to_string())
            }
            ServiceError::Provider(e) => {
                error!("Provider error while serving request: {}", e);
                ApiError::Upstream(e.to_string())
            }
            ServiceError::RateNormalization(e) => {
                error!("Rate normalization error while serving request: {}", e);
                ApiError::Upstream(e.to_string())
            }
            ServiceError::Signature(e) => ApiError::BadRequest(e.to_string()),
            ServiceError::ValueOverflow(e) => {
                error!("Value overflow while serving request: {}", e);
                ApiError::Internal(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::ProviderError;
    use crate::service::signature::SignatureError;

    #[test]
    fn test_service_error_mapping() {
        let bad: ApiError = ServiceError::from(ValidationError::InvalidAddress("0x1".to_string())).into();
        assert_eq!(bad.status(), StatusCode::BAD_REQUEST);

        let not_ready: ApiError = ServiceError::from(StoreError::NotSynced).into();
        assert_eq!(not_ready.status(), StatusCode::SERVICE_UNAVAILABLE);

        let upstream: ApiError = ServiceError::from(ProviderError::BlockNotFound(5)).into();
        assert_eq!(upstream.status(), StatusCode::BAD_GATEWAY);

        let db: ApiError = ServiceError::from(StoreError::Malformed("value".to_string())).into();
        assert_eq!(db.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let unsigned: ApiError = ServiceError::from(SignatureError::Mismatch("0x1".to_string())).into();
        assert_eq!(unsigned.status(), StatusCode::BAD_REQUEST);

        let overflow: ApiError = ServiceError::ValueOverflow("tally".to_string()).into();
        assert_eq!(overflow.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
