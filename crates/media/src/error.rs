use thiserror::Error;

/// Errors returned by a media backend.
///
/// An empty reference is not an error: backends signal a soft failure by
/// returning `Ok(String::new())`.
#[derive(Debug, Error)]
pub enum MediaError {
    /// The backend could not be reached.
    #[error("Media backend unavailable: {0}")]
    Unavailable(String),

    /// The backend refused the object (unsupported type, unsafe name, empty body).
    #[error("Upload rejected: {0}")]
    Rejected(String),

    /// Writing the object failed.
    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),
}
