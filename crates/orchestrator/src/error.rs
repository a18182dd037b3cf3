//! Gateway error taxonomy.

use listings::RepositoryError;
use media::MediaError;
use thiserror::Error;

/// Errors surfaced by the gateway-side workflows.
///
/// Authentication failures carry no reason, and "no such listing" is folded
/// together with "not yours" for mutations.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// A required field is missing or invalid.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The caller could not be authenticated.
    #[error("Unauthenticated")]
    Unauthenticated,

    /// The listing does not exist or is not visible to the caller.
    #[error("Listing not found")]
    NotFound,

    /// The listing does not exist or is owned by someone else.
    #[error("Listing not found or no permission")]
    NotFoundOrNoPermission,

    /// The media backend or listing store could not be reached.
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// The per-call deadline elapsed during a step.
    #[error("Deadline exceeded during {step}")]
    DeadlineExceeded { step: &'static str },

    /// Anything unexpected. The message is for logs only.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl OrchestratorError {
    /// Returns true for failures a caller may retry later.
    pub fn is_upstream_unavailable(&self) -> bool {
        matches!(
            self,
            OrchestratorError::UpstreamUnavailable(_) | OrchestratorError::DeadlineExceeded { .. }
        )
    }
}

impl From<RepositoryError> for OrchestratorError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::InvalidListing(msg) => OrchestratorError::InvalidArgument(msg),
            err if err.is_unavailable() => OrchestratorError::UpstreamUnavailable(err.to_string()),
            err => OrchestratorError::Internal(err.to_string()),
        }
    }
}

impl From<MediaError> for OrchestratorError {
    fn from(err: MediaError) -> Self {
        match err {
            MediaError::Rejected(msg) => OrchestratorError::InvalidArgument(msg),
            err => OrchestratorError::UpstreamUnavailable(err.to_string()),
        }
    }
}

/// Result type for orchestrated operations.
pub type Result<T> = std::result::Result<T, OrchestratorError>;
