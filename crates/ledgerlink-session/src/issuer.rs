//! Minting and verifying signed session tokens.
//!
//! Tokens use the compact JWS layout `header.payload.signature`, each part
//! base64url without padding, signed with HMAC-SHA256 (`HS256`). The
//! signature is checked with `ring`'s constant-time comparison before any
//! claim is looked at.

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, Utc};
use ring::hmac;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SessionError, TokenError};
use crate::model::{Claims, SessionToken};

/// Minimum accepted signing secret length in bytes.
pub const MIN_SIGNING_KEY_LEN: usize = 32;

/// Default token lifetime in days.
pub const DEFAULT_TOKEN_LIFETIME_DAYS: i64 = 7;

const ALG: &str = "HS256";

#[derive(Debug, Serialize, Deserialize)]
struct Header<'a> {
    alg: &'a str,
    typ: &'a str,
}

// ---------------------------------------------------------------------------
// SigningKey
// ---------------------------------------------------------------------------

/// Secret used only for signing session tokens.
#[derive(Clone)]
pub struct SigningKey(Vec<u8>);

impl SigningKey {
    /// Build a signing key from raw bytes.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Signing`] if the key is shorter than
    /// [`MIN_SIGNING_KEY_LEN`].
    pub fn new(bytes: impl Into<Vec<u8>>) -> Result<Self> {
        let bytes = bytes.into();
        if bytes.len() < MIN_SIGNING_KEY_LEN {
            return Err(SessionError::Signing {
                reason: format!(
                    "signing key must be at least {MIN_SIGNING_KEY_LEN} bytes, got {}",
                    bytes.len()
                ),
            });
        }
        Ok(Self(bytes))
    }

    /// Parse an optional configuration value, treating absence (or an empty
    /// string) as a signing error.
    pub fn from_config(value: Option<&str>) -> Result<Self> {
        match value.filter(|v| !v.trim().is_empty()) {
            Some(v) => Self::new(v.as_bytes().to_vec()),
            None => Err(SessionError::Signing {
                reason: "signing key is not set".into(),
            }),
        }
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SigningKey([REDACTED])")
    }
}

// ---------------------------------------------------------------------------
// SessionIssuer
// ---------------------------------------------------------------------------

/// Mints and verifies time-bounded session tokens.
pub struct SessionIssuer {
    key: hmac::Key,
    lifetime: Duration,
}

impl SessionIssuer {
    /// Create an issuer with the default 7-day lifetime.
    pub fn new(signing_key: SigningKey) -> Self {
        Self::with_lifetime(signing_key, Duration::days(DEFAULT_TOKEN_LIFETIME_DAYS))
    }

    pub fn with_lifetime(signing_key: SigningKey, lifetime: Duration) -> Self {
        Self {
            key: hmac::Key::new(hmac::HMAC_SHA256, &signing_key.0),
            lifetime,
        }
    }

    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    /// Mint a token for `owner_id`, issued now.
    pub fn mint(&self, owner_id: &str) -> Result<SessionToken> {
        self.mint_at(owner_id, Utc::now())
    }

    /// Mint a token as if the current time were `now`.
    pub fn mint_at(&self, owner_id: &str, now: DateTime<Utc>) -> Result<SessionToken> {
        let claims = Claims {
            owner_id: owner_id.to_owned(),
            issued_at: now.timestamp(),
            expires_at: (now + self.lifetime).timestamp(),
        };

        let header = serde_json::to_vec(&Header {
            alg: ALG,
            typ: "JWT",
        })?;
        let payload = serde_json::to_vec(&claims)?;

        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(header),
            URL_SAFE_NO_PAD.encode(payload)
        );
        let tag = hmac::sign(&self.key, signing_input.as_bytes());
        let token = format!("{signing_input}.{}", URL_SAFE_NO_PAD.encode(tag.as_ref()));

        tracing::debug!(
            owner_id = owner_id,
            expires_at = claims.expires_at,
            "minted session token"
        );

        Ok(SessionToken::new(token))
    }

    /// Verify a token against the current time.
    pub fn verify(&self, token: &str) -> std::result::Result<Claims, TokenError> {
        self.verify_at(token, Utc::now())
    }

    /// Verify a token as if the current time were `now`.
    ///
    /// # Errors
    ///
    /// - [`TokenError::Malformed`] if the token is not three base64url
    ///   segments with a supported header and parseable claims.
    /// - [`TokenError::InvalidSignature`] if the signature does not match.
    /// - [`TokenError::Expired`] if `now` is past `expires_at`.
    pub fn verify_at(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> std::result::Result<Claims, TokenError> {
        let mut segments = token.trim().split('.');
        let (Some(header), Some(payload), Some(signature), None) = (
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
        ) else {
            return Err(TokenError::Malformed);
        };

        let signature = URL_SAFE_NO_PAD
            .decode(signature.as_bytes())
            .map_err(|_| TokenError::Malformed)?;
        let signing_input = &token.trim()[..header.len() + 1 + payload.len()];
        hmac::verify(&self.key, signing_input.as_bytes(), &signature)
            .map_err(|_| TokenError::InvalidSignature)?;

        let header_bytes = URL_SAFE_NO_PAD
            .decode(header.as_bytes())
            .map_err(|_| TokenError::Malformed)?;
        let header: Header<'_> =
            serde_json::from_slice(&header_bytes).map_err(|_| TokenError::Malformed)?;
        if header.alg != ALG {
            return Err(TokenError::Malformed);
        }

        let payload_bytes = URL_SAFE_NO_PAD
            .decode(payload.as_bytes())
            .map_err(|_| TokenError::Malformed)?;
        let claims: Claims =
            serde_json::from_slice(&payload_bytes).map_err(|_| TokenError::Malformed)?;

        if claims.is_expired_at(now) {
            return Err(TokenError::Expired);
        }

        Ok(claims)
    }
}

impl fmt::Debug for SessionIssuer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionIssuer")
            .field("lifetime", &self.lifetime)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
