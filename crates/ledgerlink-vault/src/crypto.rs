//! AES-256-GCM envelope encryption using the `ring` crate.
//!
//! - **Encryption/decryption**: AES-256-GCM with a fresh random 96-bit nonce
//!   per call. The nonce, ciphertext and 128-bit tag travel together as an
//!   [`EncryptedSecret`], which encodes to a single opaque base64 string.
//! - **Random generation**: cryptographically secure random bytes via `ring`.
//!
//! # Security Notes
//!
//! - With random 96-bit nonces the collision probability stays negligible for
//!   up to ~2^32 encryptions under one key.
//! - Decryption is all-or-nothing: `ring` only releases plaintext after the
//!   tag verifies, so a failed open never yields partial output.

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use ring::aead::{self, Aad, BoundKey, NONCE_LEN, Nonce, NonceSequence, SealingKey, UnboundKey};
use ring::rand::{SecureRandom, SystemRandom};
use serde::{Deserialize, Serialize};

use crate::error::{Result, VaultError};
use crate::key::VaultKey;

/// Length of the AES-256-GCM nonce in bytes (96 bits).
pub const NONCE_LEN_BYTES: usize = NONCE_LEN;

/// Length of the AES-256-GCM authentication tag in bytes.
pub const TAG_LEN: usize = 16;

/// AES-256-GCM algorithm from `ring`.
static AEAD_ALG: &aead::Algorithm = &aead::AES_256_GCM;

// ---------------------------------------------------------------------------
// Nonce handling
// ---------------------------------------------------------------------------

/// A nonce sequence that yields exactly one nonce and then errors, so each
/// bound key seals or opens exactly once.
struct SingleNonce(Option<[u8; NONCE_LEN_BYTES]>);

impl SingleNonce {
    fn new(bytes: [u8; NONCE_LEN_BYTES]) -> Self {
        Self(Some(bytes))
    }
}

impl NonceSequence for SingleNonce {
    fn advance(&mut self) -> std::result::Result<Nonce, ring::error::Unspecified> {
        self.0
            .take()
            .map(Nonce::assume_unique_for_key)
            .ok_or(ring::error::Unspecified)
    }
}

// ---------------------------------------------------------------------------
// EncryptedSecret
// ---------------------------------------------------------------------------

/// Authenticated ciphertext of a secret: `nonce || ciphertext || tag`.
///
/// Only [`CryptoVault::encrypt`] produces these. The serde representation is
/// the opaque string returned by [`EncryptedSecret::encode`].
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct EncryptedSecret {
    nonce: [u8; NONCE_LEN_BYTES],
    /// Ciphertext with the GCM tag appended, as `ring` produces it.
    sealed: Vec<u8>,
}

impl EncryptedSecret {
    pub fn nonce(&self) -> &[u8; NONCE_LEN_BYTES] {
        &self.nonce
    }

    /// Ciphertext without the trailing tag.
    pub fn ciphertext(&self) -> &[u8] {
        &self.sealed[..self.sealed.len() - TAG_LEN]
    }

    pub fn tag(&self) -> &[u8] {
        &self.sealed[self.sealed.len() - TAG_LEN..]
    }

    /// Raw envelope bytes: nonce, then ciphertext, then tag.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(NONCE_LEN_BYTES + self.sealed.len());
        out.extend_from_slice(&self.nonce);
        out.extend_from_slice(&self.sealed);
        out
    }

    /// Parse raw envelope bytes.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Decryption`] if the input is too short to hold
    /// a nonce and a tag.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < NONCE_LEN_BYTES + TAG_LEN {
            return Err(VaultError::decryption(format!(
                "envelope too short: {} bytes",
                bytes.len()
            )));
        }
        let (nonce, sealed) = bytes.split_at(NONCE_LEN_BYTES);
        let mut nonce_bytes = [0u8; NONCE_LEN_BYTES];
        nonce_bytes.copy_from_slice(nonce);
        Ok(Self {
            nonce: nonce_bytes,
            sealed: sealed.to_vec(),
        })
    }

    /// Opaque URL-safe encoding of the whole envelope.
    pub fn encode(&self) -> String {
        URL_SAFE_NO_PAD.encode(self.to_bytes())
    }

    /// Inverse of [`Self::encode`].
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Decryption`] on invalid base64 or a truncated
    /// envelope.
    pub fn decode(encoded: &str) -> Result<Self> {
        let bytes = URL_SAFE_NO_PAD
            .decode(encoded.as_bytes())
            .map_err(|_| VaultError::decryption("envelope is not valid base64"))?;
        Self::from_bytes(&bytes)
    }
}

impl fmt::Debug for EncryptedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptedSecret")
            .field("len", &(NONCE_LEN_BYTES + self.sealed.len()))
            .finish()
    }
}

impl From<EncryptedSecret> for String {
    fn from(value: EncryptedSecret) -> Self {
        value.encode()
    }
}

impl TryFrom<String> for EncryptedSecret {
    type Error = VaultError;

    fn try_from(value: String) -> Result<Self> {
        Self::decode(&value)
    }
}

// ---------------------------------------------------------------------------
// CryptoVault
// ---------------------------------------------------------------------------

/// Symmetric authenticated encryption keyed by one process-wide key.
///
/// Operations are synchronous and side-effect free apart from drawing nonces
/// from the system RNG.
pub struct CryptoVault {
    key: VaultKey,
    rng: SystemRandom,
}

impl CryptoVault {
    /// Create a vault around key material parsed at startup.
    pub fn new(key: VaultKey) -> Self {
        Self {
            key,
            rng: SystemRandom::new(),
        }
    }

    /// Encrypt `plaintext` under a freshly generated nonce.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Encryption`] if nonce generation or sealing
    /// fails.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<EncryptedSecret> {
        let mut nonce_bytes = [0u8; NONCE_LEN_BYTES];
        self.rng
            .fill(&mut nonce_bytes)
            .map_err(|_| VaultError::Encryption {
                reason: "failed to generate random nonce".into(),
            })?;

        let unbound_key =
            UnboundKey::new(AEAD_ALG, self.key.as_bytes()).map_err(|_| VaultError::Encryption {
                reason: "failed to create AES-256-GCM key".into(),
            })?;
        let mut sealing_key = SealingKey::new(unbound_key, SingleNonce::new(nonce_bytes));

        let mut in_out = plaintext.to_vec();
        sealing_key
            .seal_in_place_append_tag(Aad::empty(), &mut in_out)
            .map_err(|_| VaultError::Encryption {
                reason: "seal_in_place failed".into(),
            })?;

        tracing::trace!(
            plaintext_len = plaintext.len(),
            sealed_len = in_out.len(),
            "encrypted secret"
        );

        Ok(EncryptedSecret {
            nonce: nonce_bytes,
            sealed: in_out,
        })
    }

    /// Decrypt and authenticate an envelope.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Decryption`] if the key is wrong or any of the
    /// nonce, ciphertext or tag has been altered.
    pub fn decrypt(&self, secret: &EncryptedSecret) -> Result<Vec<u8>> {
        let unbound_key = UnboundKey::new(AEAD_ALG, self.key.as_bytes())
            .map_err(|_| VaultError::decryption("failed to create AES-256-GCM key"))?;
        let mut opening_key = aead::OpeningKey::new(unbound_key, SingleNonce::new(secret.nonce));

        let mut in_out = secret.sealed.clone();
        let plaintext = opening_key
            .open_in_place(Aad::empty(), &mut in_out)
            .map_err(|_| {
                VaultError::decryption("authentication failed: wrong key or corrupted data")
            })?;

        let result = plaintext.to_vec();
        tracing::trace!(plaintext_len = result.len(), "decrypted secret");
        Ok(result)
    }

    /// Decode an opaque envelope string and decrypt it.
    pub fn decrypt_encoded(&self, encoded: &str) -> Result<Vec<u8>> {
        self.decrypt(&EncryptedSecret::decode(encoded)?)
    }
}

impl fmt::Debug for CryptoVault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CryptoVault").finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Random bytes
// ---------------------------------------------------------------------------

/// Generate `len` cryptographically secure random bytes.
///
/// # Errors
///
/// Returns [`VaultError::Random`] if the system CSPRNG fails.
pub fn random_bytes(len: usize) -> Result<Vec<u8>> {
    let rng = SystemRandom::new();
    let mut buf = vec![0u8; len];
    rng.fill(&mut buf).map_err(|_| VaultError::Random)?;
    Ok(buf)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn test_vault() -> CryptoVault {
        CryptoVault::new(VaultKey::generate().unwrap())
    }

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let vault = test_vault();
        let sealed = vault.encrypt(b"access-sandbox-1234").unwrap();
        assert_eq!(vault.decrypt(&sealed).unwrap(), b"access-sandbox-1234");
    }

    #[test]
    fn nonces_are_fresh_per_call() {
        let vault = test_vault();
        let a = vault.encrypt(b"same").unwrap();
        let b = vault.encrypt(b"same").unwrap();
        assert_ne!(a.nonce(), b.nonce());
        assert_ne!(a.encode(), b.encode());
    }

    #[test]
    fn decrypt_with_wrong_key_fails() {
        let sealed = test_vault().encrypt(b"secret data").unwrap();
        let result = test_vault().decrypt(&sealed);
        assert!(matches!(result, Err(VaultError::Decryption { .. })));
    }

    #[test]
    fn envelope_parts_have_expected_lengths() {
        let sealed = test_vault().encrypt(b"twelve bytes").unwrap();
        assert_eq!(sealed.nonce().len(), NONCE_LEN_BYTES);
        assert_eq!(sealed.ciphertext().len(), 12);
        assert_eq!(sealed.tag().len(), TAG_LEN);
        assert_eq!(sealed.to_bytes().len(), NONCE_LEN_BYTES + 12 + TAG_LEN);
    }

    #[test]
    fn truncated_envelope_rejected() {
        let err = EncryptedSecret::from_bytes(&[0u8; NONCE_LEN_BYTES + TAG_LEN - 1]).unwrap_err();
        assert!(matches!(err, VaultError::Decryption { .. }));
    }

    #[test]
    fn malformed_encoding_rejected() {
        let vault = test_vault();
        assert!(matches!(
            vault.decrypt_encoded("***"),
            Err(VaultError::Decryption { .. })
        ));
    }

    #[test]
    fn serde_uses_opaque_string() {
        let vault = test_vault();
        let sealed = vault.encrypt(b"sec-42").unwrap();
        let json = serde_json::to_string(&sealed).unwrap();
        assert_eq!(json, format!("\"{}\"", sealed.encode()));

        let back: EncryptedSecret = serde_json::from_str(&json).unwrap();
        assert_eq!(vault.decrypt(&back).unwrap(), b"sec-42");
    }

    #[test]
    fn debug_hides_envelope_bytes() {
        let sealed = test_vault().encrypt(b"sec-42").unwrap();
        let rendered = format!("{sealed:?}");
        assert!(!rendered.contains(&sealed.encode()));
        assert!(rendered.contains("len"));
    }

    #[test]
    fn empty_plaintext_roundtrip() {
        let vault = test_vault();
        let sealed = vault.encrypt(b"").unwrap();
        assert!(sealed.ciphertext().is_empty());
        assert_eq!(vault.decrypt(&sealed).unwrap(), b"");
    }
}
