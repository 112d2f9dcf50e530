//! Shared application state for the web server.
//!
//! [`AppState`] is wrapped in an `Arc` and shared across all request
//! handlers and the session guard.

use std::sync::Arc;

use ledgerlink_session::ExchangeOrchestrator;
use uuid::Uuid;

use crate::audit::AuditLogger;

/// Shared state accessible from every Axum handler.
pub struct AppState {
    /// Exchange, session lookup and upstream calls.
    pub orchestrator: Arc<ExchangeOrchestrator>,

    /// When set, every exchange binds to this owner id.
    pub fixed_owner: Option<String>,

    pub audit: AuditLogger,
}

impl AppState {
    pub fn new(orchestrator: Arc<ExchangeOrchestrator>, fixed_owner: Option<String>) -> Self {
        Self {
            orchestrator,
            fixed_owner,
            audit: AuditLogger::new(),
        }
    }

    /// Pick the owner an exchange should bind to.
    ///
    /// A configured fixed owner always wins. Otherwise the owner of a still
    /// valid session token presented with the request is reused, so that
    /// re-linking replaces that owner's session. A fresh id is minted for
    /// everyone else.
    pub fn resolve_owner(&self, bearer: Option<&str>) -> String {
        if let Some(owner) = &self.fixed_owner {
            return owner.clone();
        }
        bearer
            .and_then(|token| self.orchestrator.issuer().verify(token).ok())
            .map(|claims| claims.owner_id)
            .unwrap_or_else(|| Uuid::now_v7().to_string())
    }
}
