use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use common::UserId;
use tokio::sync::RwLock;

use crate::user::normalize_email;
use crate::{IdentityError, NewUser, Result, User, UserRepository};

#[derive(Default)]
struct State {
    users: HashMap<UserId, User>,
    by_email: HashMap<String, UserId>,
    unavailable: bool,
}

/// In-memory user repository for tests and local runs.
#[derive(Clone, Default)]
pub struct InMemoryUserRepository {
    state: Arc<RwLock<State>>,
}

impl InMemoryUserRepository {
    /// Creates a new empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent call fail with [`IdentityError::Unavailable`].
    pub async fn set_unavailable(&self, unavailable: bool) {
        self.state.write().await.unavailable = unavailable;
    }

    /// Returns the number of stored users.
    pub async fn user_count(&self) -> usize {
        self.state.read().await.users.len()
    }
}

fn check_available(state: &State) -> Result<()> {
    if state.unavailable {
        return Err(IdentityError::Unavailable("user store offline".into()));
    }
    Ok(())
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn create(&self, user: NewUser) -> Result<User> {
        let mut state = self.state.write().await;
        check_available(&state)?;

        let email = normalize_email(&user.email);
        if state.by_email.contains_key(&email) {
            return Err(IdentityError::Conflict);
        }

        let stored = User {
            id: UserId::new(),
            email: email.clone(),
            name: user.name,
            password_hash: user.password_hash,
            created_at: Utc::now(),
        };
        state.by_email.insert(email, stored.id);
        state.users.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let state = self.state.read().await;
        check_available(&state)?;

        Ok(state
            .by_email
            .get(&normalize_email(email))
            .and_then(|id| state.users.get(id))
            .cloned())
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<User>> {
        let state = self.state.read().await;
        check_available(&state)?;
        Ok(state.users.get(&id).cloned())
    }
}
