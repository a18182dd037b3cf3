use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::UserId;
use serde::Serialize;

use crate::Result;

/// A stored user account.
#[derive(Debug, Clone)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Returns the public view of this user.
    pub fn profile(&self) -> Profile {
        Profile {
            user_id: self.id,
            email: self.email.clone(),
            name: self.name.clone(),
        }
    }
}

/// Data required to create a user. The password is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub password_hash: String,
}

/// Public view of a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Profile {
    pub user_id: UserId,
    pub email: String,
    pub name: String,
}

/// Normalizes an email for storage and lookup.
pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Storage boundary for user accounts.
///
/// Emails are unique after normalization; creating a second account with the
/// same email returns [`crate::IdentityError::Conflict`].
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Inserts a new user and returns it with its assigned id.
    async fn create(&self, user: NewUser) -> Result<User>;

    /// Looks a user up by email.
    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Looks a user up by id.
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>>;
}

#[async_trait]
impl<T: UserRepository + ?Sized> UserRepository for Arc<T> {
    async fn create(&self, user: NewUser) -> Result<User> {
        (**self).create(user).await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        (**self).find_by_email(email).await
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<User>> {
        (**self).find_by_id(id).await
    }
}
