//! HTTP boundary for Ledgerlink.
//!
//! This crate exposes the session subsystem over HTTP:
//!
//! - `POST /session/exchange` (alias `/api/exchange_public_token`) trades a
//!   public token for a signed session token.
//! - `GET /session/protected-resource` (alias `/api/transactions`) is guarded
//!   by [`guard::require_session`] and returns the owner's transactions.
//! - `POST /api/create_link_token` and `GET /health` are unguarded.
//!
//! Errors reach clients only as the fixed bodies in [`error::ApiError`].

pub mod api;
pub mod audit;
pub mod error;
pub mod guard;
pub mod server;
pub mod state;
pub mod telemetry;

pub use audit::AuditLogger;
pub use error::{ApiError, ApiErrorKind};
pub use server::{WebServer, router};
pub use state::AppState;
pub use telemetry::{CORRELATION_ID_HEADER, CorrelationId};

/// Web server configuration.
#[derive(Debug, Clone)]
pub struct WebConfig {
    /// The address to bind the HTTP server to.
    pub bind_addr: String,
    /// The port to listen on.
    pub port: u16,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1".into(),
            port: 3001,
        }
    }
}
