//! Account registration, password verification and session tracking.

pub mod password;
pub mod service;
pub mod session;

pub use service::{AuthError, AuthService, SessionGrant};
pub use session::{spawn_sweep_task, SessionError, SessionManager};
