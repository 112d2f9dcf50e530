//! Error types for the session crate.
//!
//! [`SessionError`] is the single error type for this crate. Token
//! verification failures are kept apart in [`TokenError`] so the request
//! boundary can log the precise kind while answering every one of them with
//! the same 401.

/// Why a session token was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    /// Wrong number of segments, bad base64, bad JSON or unsupported header.
    #[error("malformed session token")]
    Malformed,

    /// The signature does not match the token content and signing key.
    #[error("invalid session token signature")]
    InvalidSignature,

    /// The signature is valid but `expires_at` has passed.
    #[error("session token expired")]
    Expired,
}

impl TokenError {
    /// Stable reason code for security logs.
    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::Malformed => "malformed",
            Self::InvalidSignature => "invalid_signature",
            Self::Expired => "expired",
        }
    }
}

/// Unified error type for the Ledgerlink session subsystem.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The signing secret is missing or too short. Fatal at startup.
    #[error("signing key error: {reason}")]
    Signing { reason: String },

    /// A session token failed verification.
    #[error(transparent)]
    Token(#[from] TokenError),

    /// Sealing or opening the provider credential failed.
    #[error("vault error: {0}")]
    Vault(#[from] ledgerlink_vault::VaultError),

    /// The external provider could not supply what was asked of it.
    #[error("upstream error: {reason}")]
    Upstream { reason: String },

    /// Transport failure talking to the external provider.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// No session is stored for the token's owner.
    #[error("no session for owner {owner_id}")]
    NoSession { owner_id: String },

    /// Provider configuration is incomplete.
    #[error("invalid provider configuration: {reason}")]
    InvalidConfig { reason: String },

    /// JSON serialization or deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SessionError {
    pub(crate) fn upstream(reason: impl Into<String>) -> Self {
        Self::Upstream {
            reason: reason.into(),
        }
    }

    /// Upstream-class failures are the only ones worth retrying.
    pub fn is_upstream(&self) -> bool {
        matches!(self, Self::Upstream { .. } | Self::Network(_))
    }
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, SessionError>;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
