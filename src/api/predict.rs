use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use std::sync::Arc;

use super::{auth::session_token, body_or_default, error::ApiError};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct PredictRequest {
    #[serde(default)]
    pub text: String,
}

/// POST /predict
///
/// Anonymous callers may predict too; the session only tags the audit entry.
pub async fn predict(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    body: Result<Json<PredictRequest>, JsonRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let request = body_or_default(body);
    let token = session_token(&jar, &state.config.session);
    let user_id = state.auth.auth_status(token.as_deref()).user_id;

    let prediction = state.gateway.predict(&request.text, user_id).await?;
    Ok(Json(prediction))
}
