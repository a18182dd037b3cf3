//! Registration and login endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use listings::UserId;
use serde::{Deserialize, Serialize};

use super::within;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Serialize)]
pub struct RegisterResponse {
    pub user_id: UserId,
    pub token: String,
    pub email: String,
    pub name: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub token: String,
}

/// POST /api/auth/register: create an account and return a credential.
#[tracing::instrument(skip(state, payload))]
pub async fn register(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<RegisterResponse>), ApiError> {
    let Json(req) = payload?;

    let (user_id, token) = within(
        state.timeouts.read,
        state.identity.register(&req.email, &req.password, &req.name),
    )
    .await?;

    let response = RegisterResponse {
        user_id,
        token,
        email: req.email.trim().to_lowercase(),
        name: req.name.trim().to_string(),
    };
    Ok((StatusCode::CREATED, Json(response)))
}

/// POST /api/auth/login: exchange email and password for a credential.
#[tracing::instrument(skip(state, payload))]
pub async fn login(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, ApiError> {
    let Json(req) = payload?;

    let token = within(
        state.timeouts.read,
        state.identity.login(&req.email, &req.password),
    )
    .await?;

    Ok(Json(LoginResponse { token }))
}
