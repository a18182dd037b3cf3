//! HTTP handlers.

pub mod ads;
pub mod auth;
pub mod health;
pub mod metrics;
pub mod users;

use std::future::Future;
use std::time::Duration;

use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use listings::ListingId;

use crate::error::ApiError;

/// Returns the raw `Authorization` header value, if any.
pub(crate) fn auth_header(headers: &HeaderMap) -> Option<&str> {
    headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok())
}

pub(crate) fn parse_listing_id(id: &str) -> Result<ListingId, ApiError> {
    id.parse()
        .map_err(|e| ApiError::BadRequest(format!("Invalid listing id: {e}")))
}

/// Runs an identity call under `limit`.
pub(crate) async fn within<T, F>(limit: Duration, fut: F) -> Result<T, ApiError>
where
    F: Future<Output = identity::Result<T>>,
{
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| ApiError::DeadlineExceeded("identity call timed out".into()))?
        .map_err(ApiError::from)
}
