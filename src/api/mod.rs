pub mod auth;
pub mod error;
mod predict;

use axum::{
    extract::rejection::JsonRejection,
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::CorsConfig;
use crate::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/auth-status", get(auth::auth_status));

    let mut router = Router::new()
        .route("/health", get(health_check))
        .route("/predict", post(predict::predict))
        .merge(auth_routes)
        .layer(TraceLayer::new_for_http());

    if let Some(cors) = cors_layer(&state.config.cors) {
        router = router.layer(cors);
    }

    router.with_state(state)
}

/// Credentialed CORS for the one configured frontend origin
fn cors_layer(config: &CorsConfig) -> Option<CorsLayer> {
    let origin = config.allowed_origin.as_deref()?;
    let origin = match HeaderValue::from_str(origin) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(error = %e, "Ignoring invalid CORS origin {}", origin);
            return None;
        }
    };

    Some(
        CorsLayer::new()
            .allow_origin(origin)
            .allow_credentials(true)
            .allow_methods([Method::GET, Method::POST])
            .allow_headers([header::CONTENT_TYPE]),
    )
}

/// Unreadable or missing JSON bodies count as empty input
pub(crate) fn body_or_default<T: Default>(body: Result<Json<T>, JsonRejection>) -> T {
    match body {
        Ok(Json(value)) => value,
        Err(rejection) => {
            tracing::debug!(error = %rejection, "Rejected request body");
            T::default()
        }
    }
}

async fn health_check() -> &'static str {
    "OK"
}
