//! API error types with HTTP response mapping.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use identity::{IdentityError, TokenError};
use orchestrator::OrchestratorError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Bad request from the client.
    BadRequest(String),
    /// Missing or rejected credential.
    Unauthorized(String),
    /// Resource not found, or not owned by the caller.
    NotFound(String),
    /// Resource already exists.
    Conflict(String),
    /// A backing store or the media backend is unreachable.
    Unavailable(String),
    /// The per-call deadline elapsed.
    DeadlineExceeded(String),
    /// Internal server error. The message is logged, never returned.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::Unavailable(msg) => {
                tracing::warn!(error = %msg, "upstream unavailable");
                (StatusCode::SERVICE_UNAVAILABLE, "service unavailable".to_string())
            }
            ApiError::DeadlineExceeded(msg) => {
                tracing::warn!(error = %msg, "deadline exceeded");
                (StatusCode::GATEWAY_TIMEOUT, "deadline exceeded".to_string())
            }
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal error".to_string(),
                )
            }
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

impl From<OrchestratorError> for ApiError {
    fn from(err: OrchestratorError) -> Self {
        match err {
            OrchestratorError::InvalidArgument(msg) => ApiError::BadRequest(msg),
            OrchestratorError::Unauthenticated => ApiError::Unauthorized(err.to_string()),
            OrchestratorError::NotFound | OrchestratorError::NotFoundOrNoPermission => {
                ApiError::NotFound(err.to_string())
            }
            OrchestratorError::UpstreamUnavailable(msg) => ApiError::Unavailable(msg),
            OrchestratorError::DeadlineExceeded { .. } => {
                ApiError::DeadlineExceeded(err.to_string())
            }
            OrchestratorError::Internal(msg) => ApiError::Internal(msg),
        }
    }
}

impl From<IdentityError> for ApiError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::Validation(msg) => ApiError::BadRequest(msg),
            IdentityError::Conflict => ApiError::Conflict(err.to_string()),
            IdentityError::InvalidCredentials => ApiError::Unauthorized(err.to_string()),
            IdentityError::NotFound => ApiError::NotFound(err.to_string()),
            IdentityError::Token(
                TokenError::MalformedCredential(_)
                | TokenError::UnexpectedSigningMethod(_)
                | TokenError::InvalidSignature,
            ) => ApiError::Unauthorized("Unauthenticated".into()),
            IdentityError::Unavailable(msg) => ApiError::Unavailable(msg),
            IdentityError::Database(
                sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed,
            ) => ApiError::Unavailable(err.to_string()),
            IdentityError::Hash(_) | IdentityError::Token(_) | IdentityError::Database(_) => {
                ApiError::Internal(err.to_string())
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: impl Into<ApiError>) -> StatusCode {
        err.into().into_response().status()
    }

    #[test]
    fn test_orchestrator_error_statuses() {
        assert_eq!(
            status_of(OrchestratorError::InvalidArgument("x".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(OrchestratorError::Unauthenticated),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(status_of(OrchestratorError::NotFound), StatusCode::NOT_FOUND);
        assert_eq!(
            status_of(OrchestratorError::NotFoundOrNoPermission),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(OrchestratorError::UpstreamUnavailable("media".into())),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_of(OrchestratorError::DeadlineExceeded { step: "UploadMedia" }),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            status_of(OrchestratorError::Internal("boom".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_identity_error_statuses() {
        assert_eq!(status_of(IdentityError::Conflict), StatusCode::CONFLICT);
        assert_eq!(
            status_of(IdentityError::InvalidCredentials),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status_of(IdentityError::Validation("email".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(IdentityError::Token(TokenError::EmptySubject)),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_of(IdentityError::Database(sqlx::Error::PoolTimedOut)),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[tokio::test]
    async fn test_internal_detail_is_not_returned() {
        let response = ApiError::Internal("connection string leaked".into()).into_response();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "internal error");
    }
}
