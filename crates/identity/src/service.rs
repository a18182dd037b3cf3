use std::sync::Arc;

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use common::UserId;
use rand::rngs::OsRng;
use tracing::{debug, info, instrument};

use crate::{
    IdentityError, NewUser, Profile, Result, TokenCheck, TokenService, UserRepository,
};

/// Characters of which a password must contain at least one.
const PASSWORD_SPECIALS: &str = "!@#$%^&*()_+";

/// Minimum password length in characters.
const MIN_PASSWORD_LEN: usize = 8;

/// Registration, login and profile lookup.
///
/// Generic over the user store so tests run against
/// [`crate::InMemoryUserRepository`] and production against PostgreSQL.
pub struct IdentityService<R: UserRepository> {
    repo: R,
    tokens: Arc<TokenService>,
    hasher: Argon2<'static>,
}

impl<R: UserRepository> IdentityService<R> {
    /// Creates a service using default Argon2 parameters.
    pub fn new(repo: R, tokens: Arc<TokenService>) -> Self {
        Self {
            repo,
            tokens,
            hasher: Argon2::default(),
        }
    }

    /// Replaces the password hasher. Existing hashes stay verifiable since
    /// their parameters are stored alongside them.
    pub fn with_hasher(mut self, hasher: Argon2<'static>) -> Self {
        self.hasher = hasher;
        self
    }

    /// Returns the token service used to issue credentials.
    pub fn tokens(&self) -> &Arc<TokenService> {
        &self.tokens
    }

    /// Registers a new account and returns its id with a fresh credential.
    #[instrument(skip(self, password, name), fields(email = %email))]
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        name: &str,
    ) -> Result<(UserId, String)> {
        validate_email(email)?;
        validate_password(password)?;
        let name = name.trim();
        if name.is_empty() {
            return Err(IdentityError::Validation("name is required".into()));
        }

        if let Some(existing) = self.repo.find_by_email(email).await? {
            debug!(user_id = %existing.id, "email already registered");
            return Err(IdentityError::Conflict);
        }

        let salt = SaltString::generate(&mut OsRng);
        let password_hash = self
            .hasher
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| IdentityError::Hash(e.to_string()))?
            .to_string();

        let user = self
            .repo
            .create(NewUser {
                email: email.to_string(),
                name: name.to_string(),
                password_hash,
            })
            .await?;

        let token = self.tokens.issue(&user.id.to_string())?;
        info!(user_id = %user.id, "user registered");
        Ok((user.id, token))
    }

    /// Verifies a password and issues a credential.
    #[instrument(skip(self, password), fields(email = %email))]
    pub async fn login(&self, email: &str, password: &str) -> Result<String> {
        let user = self
            .repo
            .find_by_email(email)
            .await?
            .ok_or(IdentityError::InvalidCredentials)?;

        let parsed = PasswordHash::new(&user.password_hash)
            .map_err(|e| IdentityError::Hash(e.to_string()))?;
        if self
            .hasher
            .verify_password(password.as_bytes(), &parsed)
            .is_err()
        {
            debug!(user_id = %user.id, "password mismatch");
            return Err(IdentityError::InvalidCredentials);
        }

        let token = self.tokens.issue(&user.id.to_string())?;
        info!(user_id = %user.id, "user logged in");
        Ok(token)
    }

    /// Validates a credential. See [`TokenService::validate`].
    pub fn validate(&self, token: &str) -> Result<TokenCheck> {
        Ok(self.tokens.validate(token)?)
    }

    /// Returns the public profile of `user_id`.
    #[instrument(skip(self))]
    pub async fn profile(&self, user_id: UserId) -> Result<Profile> {
        self.repo
            .find_by_id(user_id)
            .await?
            .map(|user| user.profile())
            .ok_or(IdentityError::NotFound)
    }
}

fn validate_email(email: &str) -> Result<()> {
    if !email.contains('@') || !email.contains('.') {
        return Err(IdentityError::Validation("invalid email format".into()));
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(IdentityError::Validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    if !password.chars().any(|c| PASSWORD_SPECIALS.contains(c)) {
        return Err(IdentityError::Validation(format!(
            "password must contain one of {PASSWORD_SPECIALS}"
        )));
    }
    Ok(())
}
