//! Bearer credential issuance and validation.
//!
//! Credentials are HMAC-signed JWTs carrying a subject (`sub`) and an absolute
//! expiry (`exp`, Unix seconds). Validation has three outcomes:
//!
//! - signature valid and unexpired: accepted, subject returned
//! - signature valid but expired: not accepted, no error
//! - anything structurally wrong: a [`TokenError`]

use std::time::Duration;

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::error::TokenError;

/// Lifetime of an issued credential when none is configured.
pub const DEFAULT_TOKEN_LIFETIME: Duration = Duration::from_secs(24 * 60 * 60);

/// Algorithm used when signing.
const SIGNING_ALGORITHM: Algorithm = Algorithm::HS256;

/// Algorithms accepted on validation. Anything else is rejected before the
/// signature is looked at.
const HMAC_FAMILY: [Algorithm; 3] = [Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    exp: i64,
    iat: i64,
}

/// Result of validating a structurally sound credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenCheck {
    /// Subject asserted by the credential; empty when not accepted.
    pub subject: String,
    /// True when the signature is valid and the credential is unexpired.
    pub accepted: bool,
}

impl TokenCheck {
    fn accepted(subject: String) -> Self {
        Self {
            subject,
            accepted: true,
        }
    }

    fn expired() -> Self {
        Self {
            subject: String::new(),
            accepted: false,
        }
    }
}

/// Issues and verifies bearer credentials.
///
/// A pure function of the signing secret and wall-clock time. Construct once
/// at startup and share it behind an `Arc`.
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    lifetime: Duration,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("lifetime", &self.lifetime)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    /// Creates a token service signing with `secret`.
    ///
    /// Returns [`TokenError::MissingSecret`] if the secret is empty.
    pub fn new(secret: impl AsRef<[u8]>, lifetime: Duration) -> Result<Self, TokenError> {
        let secret = secret.as_ref();
        if secret.is_empty() {
            return Err(TokenError::MissingSecret);
        }
        Ok(Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            lifetime,
        })
    }

    /// Returns the configured credential lifetime.
    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    /// Issues a credential for `subject`, valid from now for the configured lifetime.
    pub fn issue(&self, subject: &str) -> Result<String, TokenError> {
        self.issue_at(subject, Utc::now())
    }

    /// Issues a credential as if the current time were `now`.
    pub fn issue_at(&self, subject: &str, now: DateTime<Utc>) -> Result<String, TokenError> {
        if subject.is_empty() {
            return Err(TokenError::EmptySubject);
        }
        let lifetime = i64::try_from(self.lifetime.as_secs()).unwrap_or(i64::MAX);
        let claims = Claims {
            sub: subject.to_string(),
            exp: now.timestamp().saturating_add(lifetime),
            iat: now.timestamp(),
        };
        let token = encode(&Header::new(SIGNING_ALGORITHM), &claims, &self.encoding)
            .map_err(|e| TokenError::Signing(e.to_string()))?;
        metrics::counter!("tokens_issued_total").increment(1);
        Ok(token)
    }

    /// Validates a credential against the current time.
    pub fn validate(&self, token: &str) -> Result<TokenCheck, TokenError> {
        self.validate_at(token, Utc::now())
    }

    /// Validates a credential as if the current time were `now`.
    ///
    /// Expiry is inclusive and compared in whole seconds: a credential is
    /// rejected from the second named by its `exp` claim onward, so it is
    /// accepted for exactly `lifetime` seconds after issue. A rejected
    /// credential yields `TokenCheck { accepted: false, subject: "" }`.
    pub fn validate_at(&self, token: &str, now: DateTime<Utc>) -> Result<TokenCheck, TokenError> {
        if token.is_empty() {
            return Err(TokenError::MalformedCredential("empty credential".into()));
        }

        let header = jsonwebtoken::decode_header(token)
            .map_err(|e| TokenError::MalformedCredential(e.to_string()))?;
        if !HMAC_FAMILY.contains(&header.alg) {
            return Err(TokenError::UnexpectedSigningMethod(format!("{:?}", header.alg)));
        }

        // Expiry is checked below against `now`, not by the decoder.
        let mut validation = Validation::new(header.alg);
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        let claims = data.claims;

        if claims.exp <= now.timestamp() {
            return Ok(TokenCheck::expired());
        }
        if claims.sub.is_empty() {
            return Err(TokenError::MalformedCredential("subject claim is empty".into()));
        }

        Ok(TokenCheck::accepted(claims.sub))
    }
}
