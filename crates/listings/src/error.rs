use thiserror::Error;

/// Errors that can occur when interacting with the listing store.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// The listing data failed validation.
    #[error("Invalid listing: {0}")]
    InvalidListing(String),

    /// The store could not be reached.
    #[error("Listing store unavailable: {0}")]
    Unavailable(String),

    /// A stored row could not be mapped back to the model.
    #[error("Corrupt row: {0}")]
    CorruptRow(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl RepositoryError {
    /// Returns true if the failure is a reachability problem rather than a
    /// problem with the request or the stored data.
    pub fn is_unavailable(&self) -> bool {
        match self {
            RepositoryError::Unavailable(_) => true,
            RepositoryError::Database(err) => matches!(
                err,
                sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed
            ),
            _ => false,
        }
    }
}

/// Result type for listing store operations.
pub type Result<T> = std::result::Result<T, RepositoryError>;
