//! Structured security log.
//!
//! Entries go to the `audit` tracing target with an `event` field. They
//! carry reason codes, owner ids and correlation ids, never token or secret
//! contents.

use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, Default)]
pub struct AuditLogger;

impl AuditLogger {
    pub fn new() -> Self {
        Self
    }

    pub fn auth_success(&self, owner_id: &str, correlation_id: &str) {
        info!(target: "audit", event = "auth_success", owner_id, correlation_id);
    }

    pub fn auth_failure(&self, reason: &str, correlation_id: &str) {
        warn!(target: "audit", event = "auth_failure", reason, correlation_id);
    }

    pub fn exchange_succeeded(&self, owner_id: &str, provider: &str, correlation_id: &str) {
        info!(target: "audit", event = "exchange_succeeded", owner_id, provider, correlation_id);
    }

    pub fn exchange_failed(&self, reason: &str, correlation_id: &str) {
        error!(target: "audit", event = "exchange_failed", reason, correlation_id);
    }

    pub fn decryption_failed(&self, owner_id: &str, correlation_id: &str) {
        error!(
            target: "audit",
            event = "decryption_failed",
            reason = "decryption",
            owner_id,
            correlation_id
        );
    }

    pub fn upstream_failed(&self, operation: &str, error_msg: &str, correlation_id: &str) {
        error!(
            target: "audit",
            event = "upstream_failed",
            reason = "upstream",
            operation,
            error = error_msg,
            correlation_id
        );
    }
}
