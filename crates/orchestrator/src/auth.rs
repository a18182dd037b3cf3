//! Bearer authentication for inbound calls.

use std::sync::Arc;

use identity::TokenService;
use tracing::debug;

use crate::listing_saga::STEP_AUTHENTICATE;
use crate::{Deadline, OrchestratorError, Result, UserId};

const BEARER_PREFIX: &str = "Bearer ";

/// Outcome of authenticating one inbound call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthOutcome {
    Authenticated(UserId),
    Unauthenticated,
}

impl AuthOutcome {
    /// Returns the authenticated identity, if any.
    pub fn user_id(&self) -> Option<UserId> {
        match self {
            AuthOutcome::Authenticated(id) => Some(*id),
            AuthOutcome::Unauthenticated => None,
        }
    }
}

/// Extracts the credential from an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header: &str) -> Option<&str> {
    let token = header.strip_prefix(BEARER_PREFIX)?.trim();
    (!token.is_empty()).then_some(token)
}

/// Turns an inbound credential header into a verified identity.
///
/// Every failure (absent header, wrong scheme, malformed or expired
/// credential, bad signature, non-UUID subject) yields the same
/// [`AuthOutcome::Unauthenticated`].
#[derive(Debug, Clone)]
pub struct AuthGateway {
    tokens: Arc<TokenService>,
}

impl AuthGateway {
    /// Creates a gateway verifying credentials with `tokens`.
    pub fn new(tokens: Arc<TokenService>) -> Self {
        Self { tokens }
    }

    /// Verifies an `Authorization` header value.
    pub fn verify(&self, header: Option<&str>) -> AuthOutcome {
        let outcome = self.try_verify(header);
        if outcome == AuthOutcome::Unauthenticated {
            metrics::counter!("auth_rejections_total").increment(1);
        }
        outcome
    }

    fn try_verify(&self, header: Option<&str>) -> AuthOutcome {
        let Some(token) = header.and_then(bearer_token) else {
            debug!("missing or malformed authorization header");
            return AuthOutcome::Unauthenticated;
        };

        match self.tokens.validate(token) {
            Ok(check) if check.accepted => match check.subject.parse::<UserId>() {
                Ok(user_id) => AuthOutcome::Authenticated(user_id),
                Err(_) => {
                    debug!("credential subject is not a user id");
                    AuthOutcome::Unauthenticated
                }
            },
            Ok(_) => {
                debug!("credential expired");
                AuthOutcome::Unauthenticated
            }
            Err(e) => {
                debug!(error = %e, "credential rejected");
                AuthOutcome::Unauthenticated
            }
        }
    }

    /// Verifies a header for a call that requires authentication.
    ///
    /// Signature checking is CPU-bound and does not suspend, so the deadline
    /// is checked before starting.
    pub fn authenticate(&self, header: Option<&str>, deadline: &Deadline) -> Result<UserId> {
        deadline.check(STEP_AUTHENTICATE)?;
        self.verify(header)
            .user_id()
            .ok_or(OrchestratorError::Unauthenticated)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::Utc;
    use identity::DEFAULT_TOKEN_LIFETIME;

    use super::*;

    fn gateway() -> (AuthGateway, Arc<TokenService>) {
        let tokens = Arc::new(TokenService::new("gateway-secret", DEFAULT_TOKEN_LIFETIME).unwrap());
        (AuthGateway::new(tokens.clone()), tokens)
    }

    #[test]
    fn test_bearer_token() {
        assert_eq!(bearer_token("Bearer abc"), Some("abc"));
        assert_eq!(bearer_token("Bearer "), None);
        assert_eq!(bearer_token("Basic abc"), None);
        assert_eq!(bearer_token("abc"), None);
    }

    #[test]
    fn test_valid_credential_authenticates() {
        let (gateway, tokens) = gateway();
        let user = UserId::new();
        let header = format!("Bearer {}", tokens.issue(&user.to_string()).unwrap());

        assert_eq!(
            gateway.verify(Some(&header)),
            AuthOutcome::Authenticated(user)
        );
    }

    #[test]
    fn test_every_failure_is_unauthenticated() {
        let (gateway, tokens) = gateway();
        let user = UserId::new().to_string();

        let expired = tokens
            .issue_at(&user, Utc::now() - chrono::Duration::hours(48))
            .unwrap();
        let foreign = TokenService::new("other-secret", DEFAULT_TOKEN_LIFETIME)
            .unwrap()
            .issue(&user)
            .unwrap();
        let not_a_uuid = tokens.issue("alice").unwrap();

        let headers = [
            None,
            Some("".to_string()),
            Some("Token abc".to_string()),
            Some("Bearer garbage".to_string()),
            Some(format!("Bearer {expired}")),
            Some(format!("Bearer {foreign}")),
            Some(format!("Bearer {not_a_uuid}")),
        ];
        for header in &headers {
            assert_eq!(
                gateway.verify(header.as_deref()),
                AuthOutcome::Unauthenticated,
                "header {header:?} should be rejected"
            );
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_authenticate_honors_deadline() {
        let (gateway, tokens) = gateway();
        let header = format!("Bearer {}", tokens.issue(&UserId::new().to_string()).unwrap());

        let deadline = Deadline::after(Duration::from_millis(5));
        tokio::time::advance(Duration::from_millis(10)).await;

        let result = gateway.authenticate(Some(&header), &deadline);
        assert!(matches!(
            result,
            Err(OrchestratorError::DeadlineExceeded { .. })
        ));
    }

    #[tokio::test]
    async fn test_authenticate_requires_credential() {
        let (gateway, _) = gateway();
        let deadline = Deadline::after(Duration::from_secs(5));
        assert!(matches!(
            gateway.authenticate(None, &deadline),
            Err(OrchestratorError::Unauthenticated)
        ));
    }
}
