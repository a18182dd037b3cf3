//! Identity lookup for the calling user.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::HeaderMap;
use identity::Profile;
use orchestrator::Deadline;

use super::{auth_header, within};
use crate::error::ApiError;
use crate::state::AppState;

/// GET /api/users/me: profile of the credential's subject.
#[tracing::instrument(skip(state, headers))]
pub async fn me(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Profile>, ApiError> {
    let deadline = Deadline::after(state.timeouts.read);
    let user_id = state
        .ads
        .auth()
        .authenticate(auth_header(&headers), &deadline)?;

    let profile = within(deadline.remaining(), state.identity.profile(user_id)).await?;
    Ok(Json(profile))
}
