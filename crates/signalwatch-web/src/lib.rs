//! # Signalwatch Web
//!
//! HTTP endpoints around the verification flow.
//!
//! | Route | Purpose |
//! |-------|---------|
//! | `POST /register` | Create a pending account, answer with the bot deep link |
//! | `POST /register/check` | Poll verification; opens a session once confirmed |
//! | `POST /telegram/webhook` | Bot updates; `/start <payload>` confirms an account |
//!
//! Password hashing is supplied by the host through [`PasswordHasher`]; this
//! crate never stores or logs a plaintext password.

pub mod error;
pub mod handlers;
pub mod session;

use std::sync::Arc;

use axum::routing::post;
use axum::Router;
use signalwatch_core::VerificationFlow;

pub use error::{ApiError, FieldErrors};
pub use session::{session_cookie, Session, SessionStore, SESSION_COOKIE};

/// Hashing policy for registration passwords.
pub trait PasswordHasher: Send + Sync {
    fn hash(&self, password: &str) -> Result<String, Box<dyn std::error::Error + Send + Sync>>;
}

pub struct AppState {
    pub flow: Arc<VerificationFlow>,
    pub sessions: Arc<SessionStore>,
    pub hasher: Arc<dyn PasswordHasher>,
}

impl AppState {
    pub fn new(flow: Arc<VerificationFlow>, hasher: Arc<dyn PasswordHasher>) -> Self {
        Self {
            flow,
            sessions: Arc::new(SessionStore::new()),
            hasher,
        }
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/register", post(handlers::register))
        .route("/register/check", post(handlers::check_verification))
        .route("/telegram/webhook", post(handlers::telegram_webhook))
        .with_state(state)
}
