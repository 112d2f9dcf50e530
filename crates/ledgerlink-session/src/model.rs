//! Core data types: the provider secret, the server-side session record, the
//! client-facing token and its verified claims.

use std::fmt;

use chrono::{DateTime, TimeZone, Utc};
use ledgerlink_vault::EncryptedSecret;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Secret
// ---------------------------------------------------------------------------

/// The long-lived provider credential, in plaintext.
///
/// Deliberately not `Serialize`, not `Clone`, and redacted in `Debug`. It
/// only lives on the stack of the call that needs it.
pub struct Secret(Vec<u8>);

impl Secret {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn expose(&self) -> &[u8] {
        &self.0
    }

    /// The secret as UTF-8, which every provider credential we handle is.
    pub fn expose_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.0).ok()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret([REDACTED])")
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Server-side record binding an owner to their sealed credential.
///
/// Replaced wholesale by the next successful exchange, never patched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub owner_id: String,
    pub encrypted_secret: EncryptedSecret,
    pub issued_at: DateTime<Utc>,
}

impl Session {
    pub fn new(owner_id: impl Into<String>, encrypted_secret: EncryptedSecret) -> Self {
        Self {
            owner_id: owner_id.into(),
            encrypted_secret,
            issued_at: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tokens
// ---------------------------------------------------------------------------

/// Signed, self-contained session token. The only artifact a client sees.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionToken(String);

impl SessionToken {
    pub(crate) fn new(raw: String) -> Self {
        Self(raw)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionToken([REDACTED])")
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Verified token content. Valid for the lifetime of one request.
///
/// Serialized with the registered JWT claim names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    #[serde(rename = "sub")]
    pub owner_id: String,
    /// Unix seconds.
    #[serde(rename = "iat")]
    pub issued_at: i64,
    /// Unix seconds.
    #[serde(rename = "exp")]
    pub expires_at: i64,
}

impl Claims {
    pub fn expires_at_utc(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.expires_at, 0).single()
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now.timestamp() > self.expires_at
    }
}
