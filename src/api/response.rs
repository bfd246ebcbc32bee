use axum::{
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// JSON response marking whether it was replayed from the tally cache.
pub fn with_cache_status<T: Serialize>(data: &T, cached: bool) -> Response {
    let json = match serde_json::to_string(data) {
        Ok(json) => json,
        Err(_) => return StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    };

    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(
        "X-Cache",
        HeaderValue::from_static(if cached { "hit" } else { "miss" }),
    );

    (StatusCode::OK, headers, json).into_response()
}
