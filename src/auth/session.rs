//! In-memory session table.
//!
//! Tokens are the only capability handed to clients. Expiry is checked lazily
//! on [`SessionManager::resolve`]; entries that are never looked up again are
//! removed by the periodic sweep started with [`spawn_sweep_task`].

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;

use crate::db::UserId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("session expired")]
    Expired,
    #[error("session not found")]
    NotFound,
}

#[derive(Debug, Clone)]
pub struct Session {
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

#[derive(Debug)]
pub struct SessionManager {
    sessions: DashMap<String, Session>,
    ttl: chrono::Duration,
}

/// Generate a random token
fn generate_token() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 32] = rng.random();
    hex::encode(bytes)
}

impl SessionManager {
    pub fn new(ttl: chrono::Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            ttl,
        }
    }

    pub fn ttl(&self) -> chrono::Duration {
        self.ttl
    }

    pub fn create(&self, user_id: UserId) -> String {
        let token = generate_token();
        let now = Utc::now();
        self.sessions.insert(
            token.clone(),
            Session {
                user_id,
                created_at: now,
                expires_at: now + self.ttl,
            },
        );
        tracing::debug!(user_id, active = self.sessions.len(), "Session created");
        token
    }

    pub fn resolve(&self, token: &str) -> Result<UserId, SessionError> {
        let now = Utc::now();
        let user_id = {
            let session = self.sessions.get(token).ok_or(SessionError::NotFound)?;
            if !session.is_expired(now) {
                return Ok(session.user_id);
            }
            session.user_id
        };

        // The read guard is gone; evict the stale entry
        self.sessions.remove_if(token, |_, s| s.is_expired(now));
        tracing::debug!(user_id, "Session expired");
        Err(SessionError::Expired)
    }

    pub fn destroy(&self, token: &str) {
        if let Some((_, session)) = self.sessions.remove(token) {
            tracing::debug!(user_id = session.user_id, "Session destroyed");
        }
    }

    /// Drop every expired entry, returning how many were removed
    pub fn sweep_expired(&self) -> usize {
        let now = Utc::now();
        let before = self.sessions.len();
        self.sessions.retain(|_, session| !session.is_expired(now));
        before.saturating_sub(self.sessions.len())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

/// Spawn a background task to periodically sweep expired sessions.
///
/// Returns `None` when `interval_secs` is 0 and no task was started.
pub fn spawn_sweep_task(
    sessions: Arc<SessionManager>,
    interval_secs: u64,
) -> Option<JoinHandle<()>> {
    if interval_secs == 0 {
        tracing::info!("Session sweep disabled; expired sessions are only evicted on access");
        return None;
    }

    Some(tokio::spawn(async move {
        let interval = Duration::from_secs(interval_secs);
        loop {
            tokio::time::sleep(interval).await;
            let removed = sessions.sweep_expired();
            tracing::debug!(
                removed,
                remaining = sessions.len(),
                "Session sweep complete"
            );
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_resolve() {
        let manager = SessionManager::new(chrono::Duration::hours(24));
        let token = manager.create(7);

        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(manager.resolve(&token), Ok(7));
    }

    #[test]
    fn test_tokens_are_unique() {
        let manager = SessionManager::new(chrono::Duration::hours(24));
        let a = manager.create(1);
        let b = manager.create(1);
        assert_ne!(a, b);
        assert_eq!(manager.len(), 2);
    }

    #[test]
    fn test_unknown_token() {
        let manager = SessionManager::new(chrono::Duration::hours(24));
        assert_eq!(manager.resolve("deadbeef"), Err(SessionError::NotFound));
    }

    #[test]
    fn test_expired_session_is_evicted_on_resolve() {
        let manager = SessionManager::new(chrono::Duration::zero());
        let token = manager.create(3);

        assert_eq!(manager.resolve(&token), Err(SessionError::Expired));
        assert!(manager.is_empty());
        assert_eq!(manager.resolve(&token), Err(SessionError::NotFound));
    }

    #[test]
    fn test_destroy_is_idempotent() {
        let manager = SessionManager::new(chrono::Duration::hours(24));
        let token = manager.create(1);

        manager.destroy(&token);
        manager.destroy(&token);
        manager.destroy("never-issued");
        assert_eq!(manager.resolve(&token), Err(SessionError::NotFound));
    }

    #[test]
    fn test_sweep_removes_only_expired() {
        let live = SessionManager::new(chrono::Duration::hours(1));
        live.create(1);
        assert_eq!(live.sweep_expired(), 0);
        assert_eq!(live.len(), 1);

        let stale = SessionManager::new(chrono::Duration::zero());
        stale.create(1);
        stale.create(2);
        assert_eq!(stale.sweep_expired(), 2);
        assert!(stale.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_task_evicts_expired_sessions() {
        let manager = Arc::new(SessionManager::new(chrono::Duration::zero()));
        manager.create(1);
        manager.create(2);

        let handle = spawn_sweep_task(manager.clone(), 1).unwrap();
        assert_eq!(manager.len(), 2);

        // The paused clock jumps straight past the first sweep
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(manager.is_empty());

        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_task_disabled_with_zero_interval() {
        let manager = Arc::new(SessionManager::new(chrono::Duration::zero()));
        manager.create(1);

        assert!(spawn_sweep_task(manager.clone(), 0).is_none());

        tokio::time::sleep(Duration::from_secs(3600)).await;
        assert_eq!(manager.len(), 1);
    }
}
