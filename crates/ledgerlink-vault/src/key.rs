//! Fixed-length encryption key material.
//!
//! A [`VaultKey`] is parsed once at startup from configuration and handed to
//! [`CryptoVault::new`](crate::crypto::CryptoVault::new). Parsing is the only
//! place where a [`VaultError::Configuration`] can originate.

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::crypto;
use crate::error::{Result, VaultError};

/// Length of the AES-256-GCM key in bytes.
pub const KEY_LEN: usize = 32;

/// A 256-bit AES-GCM key.
///
/// `Debug` never prints the key bytes.
#[derive(Clone, PartialEq, Eq)]
pub struct VaultKey([u8; KEY_LEN]);

impl VaultKey {
    /// Build a key from raw bytes.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Configuration`] if `bytes` is not exactly
    /// [`KEY_LEN`] bytes long.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let key: [u8; KEY_LEN] = bytes.try_into().map_err(|_| {
            VaultError::config(format!(
                "encryption key must be {KEY_LEN} bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self(key))
    }

    /// Parse a key from its standard base64 encoding.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Configuration`] if the value is not valid base64
    /// or does not decode to exactly [`KEY_LEN`] bytes.
    pub fn from_base64(encoded: &str) -> Result<Self> {
        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|e| VaultError::config(format!("encryption key is not valid base64: {e}")))?;
        Self::from_bytes(&bytes)
    }

    /// Parse an optional configuration value, treating absence (or an empty
    /// string) as a configuration error.
    pub fn from_config(value: Option<&str>) -> Result<Self> {
        match value.map(str::trim).filter(|v| !v.is_empty()) {
            Some(encoded) => Self::from_base64(encoded),
            None => Err(VaultError::config("encryption key is not set")),
        }
    }

    /// Generate a fresh random key.
    pub fn generate() -> Result<Self> {
        let bytes = crypto::random_bytes(KEY_LEN)?;
        Self::from_bytes(&bytes)
    }

    /// Standard base64 encoding, the format accepted by [`Self::from_base64`].
    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.0)
    }

    pub(crate) fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl fmt::Debug for VaultKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("VaultKey([REDACTED])")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base64_roundtrip() {
        let key = VaultKey::generate().unwrap();
        let parsed = VaultKey::from_base64(&key.to_base64()).unwrap();
        assert_eq!(key, parsed);
    }

    #[test]
    fn missing_key_is_configuration_error() {
        assert!(matches!(
            VaultKey::from_config(None),
            Err(VaultError::Configuration { .. })
        ));
        assert!(matches!(
            VaultKey::from_config(Some("   ")),
            Err(VaultError::Configuration { .. })
        ));
    }

    #[test]
    fn wrong_length_is_configuration_error() {
        let short = STANDARD.encode([7u8; 16]);
        let err = VaultKey::from_base64(&short).unwrap_err();
        assert!(matches!(err, VaultError::Configuration { .. }));
        assert!(err.to_string().contains("got 16"));
    }

    #[test]
    fn invalid_base64_is_configuration_error() {
        assert!(matches!(
            VaultKey::from_base64("not base64 !!"),
            Err(VaultError::Configuration { .. })
        ));
    }

    #[test]
    fn debug_is_redacted() {
        let key = VaultKey::from_bytes(&[0x41; KEY_LEN]).unwrap();
        let rendered = format!("{key:?}");
        assert_eq!(rendered, "VaultKey([REDACTED])");
        assert!(!rendered.contains(&key.to_base64()));
    }
}
