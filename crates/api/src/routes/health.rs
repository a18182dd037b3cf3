//! Readiness signal.

use axum::Json;
use serde::Serialize;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// GET /health: static ready signal. Does not touch any backing store.
pub async fn check() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}
