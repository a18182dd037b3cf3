//! HTTP gateway for the marketplace.
//!
//! Exposes registration, login and listing workflows over REST. Every listing
//! call goes through the [`orchestrator::AdOrchestrator`], which authenticates
//! the caller and applies per-call deadlines. Structured logging comes from
//! tracing, and Prometheus metrics are served at `/metrics`.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use config::{Config, ConfigError, LogFormat};
pub use error::ApiError;
pub use state::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/api/auth/register", post(routes::auth::register))
        .route("/api/auth/login", post(routes::auth::login))
        .route("/api/users/me", get(routes::users::me))
        .route("/api/ads", get(routes::ads::list).post(routes::ads::create))
        .route(
            "/api/ads/{id}",
            get(routes::ads::get)
                .patch(routes::ads::update)
                .put(routes::ads::update)
                .delete(routes::ads::delete),
        )
        .route(
            "/api/ads/{id}/media",
            post(routes::ads::attach_media).delete(routes::ads::detach_media),
        )
        .route("/api/ads/{id}/images", put(routes::ads::replace_images))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
