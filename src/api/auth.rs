use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Serialize;
use std::sync::Arc;

use super::{body_or_default, error::ApiError};
use crate::auth::SessionGrant;
use crate::config::{SameSitePolicy, SessionConfig};
use crate::db::{AuthStatus, CredentialsRequest, SessionResponse};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct OkResponse {
    pub ok: bool,
}

fn same_site(policy: SameSitePolicy) -> SameSite {
    match policy {
        SameSitePolicy::Strict => SameSite::Strict,
        SameSitePolicy::Lax => SameSite::Lax,
        SameSitePolicy::None => SameSite::None,
    }
}

fn session_cookie(config: &SessionConfig, token: String) -> Cookie<'static> {
    Cookie::build((config.cookie_name.clone(), token))
        .path("/")
        .http_only(true)
        .secure(config.secure)
        .same_site(same_site(config.same_site))
        .max_age(config.cookie_max_age())
        .build()
}

/// Read the session token from the request cookies
pub fn session_token(jar: &CookieJar, config: &SessionConfig) -> Option<String> {
    jar.get(&config.cookie_name).map(|c| c.value().to_string())
}

/// Hand the client its new session, retiring whatever session it held before
fn issue_session(
    state: &AppState,
    jar: CookieJar,
    grant: SessionGrant,
) -> (CookieJar, Json<SessionResponse>) {
    let config = &state.config.session;
    if let Some(previous) = session_token(&jar, config) {
        if previous != grant.token {
            state.auth.logout(Some(&previous));
        }
    }

    let jar = jar.add(session_cookie(config, grant.token));
    (
        jar,
        Json(SessionResponse {
            ok: true,
            user_id: grant.user_id,
        }),
    )
}

/// POST /register
pub async fn register(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    body: Result<Json<CredentialsRequest>, JsonRejection>,
) -> Result<(CookieJar, Json<SessionResponse>), ApiError> {
    let request = body_or_default(body);
    let grant = state
        .auth
        .register(&request.username, &request.password)
        .await?;
    Ok(issue_session(&state, jar, grant))
}

/// POST /login
pub async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    body: Result<Json<CredentialsRequest>, JsonRejection>,
) -> Result<(CookieJar, Json<SessionResponse>), ApiError> {
    let request = body_or_default(body);
    let grant = state
        .auth
        .login(&request.username, &request.password)
        .await?;
    Ok(issue_session(&state, jar, grant))
}

/// POST /logout
pub async fn logout(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> (CookieJar, Json<OkResponse>) {
    let config = &state.config.session;
    state.auth.logout(session_token(&jar, config).as_deref());

    let jar = jar.remove(Cookie::build((config.cookie_name.clone(), "")).path("/"));
    (jar, Json(OkResponse { ok: true }))
}

/// GET /auth-status
pub async fn auth_status(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Json<AuthStatus> {
    let token = session_token(&jar, &state.config.session);
    Json(state.auth.auth_status(token.as_deref()))
}
