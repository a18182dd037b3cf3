//! Identity error types.

use thiserror::Error;

/// Errors produced while issuing or validating a credential.
///
/// An expired credential is not an error: see [`crate::TokenCheck`].
#[derive(Debug, Error)]
pub enum TokenError {
    /// The signing secret was empty at construction time.
    #[error("signing secret is not configured")]
    MissingSecret,

    /// A credential cannot be issued for an empty subject.
    #[error("subject must not be empty")]
    EmptySubject,

    /// The credential could not be parsed.
    #[error("malformed credential: {0}")]
    MalformedCredential(String),

    /// The credential declares an algorithm outside the HMAC family.
    #[error("unexpected signing method: {0}")]
    UnexpectedSigningMethod(String),

    /// The signature does not match the credential contents.
    #[error("invalid signature")]
    InvalidSignature,

    /// Encoding the signed credential failed.
    #[error("signing failed: {0}")]
    Signing(String),
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match err.kind() {
            ErrorKind::InvalidSignature => TokenError::InvalidSignature,
            ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => {
                TokenError::UnexpectedSigningMethod(err.to_string())
            }
            ErrorKind::MissingRequiredClaim(claim) => {
                TokenError::MalformedCredential(format!("missing claim: {claim}"))
            }
            _ => TokenError::MalformedCredential(err.to_string()),
        }
    }
}

/// Errors that can occur during identity operations.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// Input failed validation.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// A user with this email already exists.
    #[error("User already exists")]
    Conflict,

    /// Unknown email or wrong password. The two are deliberately not distinguished.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// User not found.
    #[error("User not found")]
    NotFound,

    /// Password hashing or hash parsing failed.
    #[error("Hashing error: {0}")]
    Hash(String),

    /// Credential issuance or validation failed.
    #[error("Token error: {0}")]
    Token(#[from] TokenError),

    /// The user store could not be reached.
    #[error("User store unavailable: {0}")]
    Unavailable(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Result type for identity operations.
pub type Result<T> = std::result::Result<T, IdentityError>;
