//! User models and the auth request/response bodies built on them.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

pub type UserId = i64;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: UserId,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: String,
}

/// Body of `/register` and `/login`; absent fields read as empty
#[derive(Debug, Default, Deserialize)]
pub struct CredentialsRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub ok: bool,
    pub user_id: UserId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthStatus {
    pub authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
}

impl AuthStatus {
    pub fn anonymous() -> Self {
        Self {
            authenticated: false,
            user_id: None,
        }
    }

    pub fn authenticated(user_id: UserId) -> Self {
        Self {
            authenticated: true,
            user_id: Some(user_id),
        }
    }
}
