pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod predict;

pub use db::DbPool;

use config::Config;
use std::sync::Arc;

use crate::auth::{AuthService, SessionManager};
use crate::db::UserStore;
use crate::predict::{AuditSink, PredictionGateway, Predictor};

pub struct AppState {
    pub config: Config,
    pub auth: AuthService,
    pub gateway: PredictionGateway,
}

impl AppState {
    pub fn new(
        config: Config,
        db: DbPool,
        predictor: Arc<dyn Predictor>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        let sessions = Arc::new(SessionManager::new(config.session.ttl()));
        let auth = AuthService::new(UserStore::new(db), sessions);
        let gateway = PredictionGateway::new(predictor, audit, config.predictor.timeout());
        Self {
            config,
            auth,
            gateway,
        }
    }

    /// The session table, shared with the background sweep
    pub fn sessions(&self) -> Arc<SessionManager> {
        self.auth.sessions().clone()
    }
}
