use std::sync::Arc;
use thiserror::Error;

use super::password::{hash_password_async, verify_password_async};
use super::session::SessionManager;
use crate::db::{AuthStatus, StoreError, UserId, UserStore};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("username and password required")]
    InvalidInput,
    #[error("username taken")]
    DuplicateUsername,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("storage error: {0}")]
    Storage(sqlx::Error),
    #[error("password hashing failed: {0}")]
    Hashing(String),
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateUsername => AuthError::DuplicateUsername,
            StoreError::Database(e) => AuthError::Storage(e),
        }
    }
}

/// A freshly issued session
#[derive(Debug, Clone)]
pub struct SessionGrant {
    pub token: String,
    pub user_id: UserId,
}

/// Registers and authenticates accounts and hands out sessions for them
#[derive(Clone)]
pub struct AuthService {
    users: UserStore,
    sessions: Arc<SessionManager>,
}

impl AuthService {
    pub fn new(users: UserStore, sessions: Arc<SessionManager>) -> Self {
        Self { users, sessions }
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    pub async fn register(&self, username: &str, password: &str) -> Result<SessionGrant, AuthError> {
        if username.is_empty() || password.is_empty() {
            return Err(AuthError::InvalidInput);
        }

        let hash = hash_password_async(password.to_string())
            .await
            .map_err(AuthError::Hashing)?;
        let user_id = self.users.create_user(username, &hash).await?;

        tracing::info!(user_id, "Registered user {}", username);

        Ok(SessionGrant {
            token: self.sessions.create(user_id),
            user_id,
        })
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<SessionGrant, AuthError> {
        if username.is_empty() || password.is_empty() {
            return Err(AuthError::InvalidInput);
        }

        let user = self.users.find_user_by_username(username).await?;
        let user_id = user.as_ref().map(|u| u.id);
        let hash = user.map(|u| u.password_hash);

        // An unknown user still pays for a verification
        let verified = verify_password_async(password.to_string(), hash).await;
        let user_id = match user_id {
            Some(id) if verified => id,
            _ => {
                tracing::debug!("Rejected login for {}", username);
                return Err(AuthError::InvalidCredentials);
            }
        };

        tracing::info!(user_id, "User logged in");

        Ok(SessionGrant {
            token: self.sessions.create(user_id),
            user_id,
        })
    }

    pub fn logout(&self, token: Option<&str>) {
        if let Some(token) = token {
            self.sessions.destroy(token);
        }
    }

    pub fn auth_status(&self, token: Option<&str>) -> AuthStatus {
        token
            .and_then(|t| self.sessions.resolve(t).ok())
            .map(AuthStatus::authenticated)
            .unwrap_or_else(AuthStatus::anonymous)
    }
}
