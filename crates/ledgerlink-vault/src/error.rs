//! Vault error types.
//!
//! Every public API in this crate returns [`VaultError`]. Variant messages
//! describe what went wrong with the key or the envelope, never the secret
//! being protected, so they are safe to log server-side.

/// Unified error type for the Ledgerlink credential vault.
#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    // -- Key material -------------------------------------------------------
    /// Encryption key material is missing or malformed. Raised at startup;
    /// the process must not begin serving requests.
    #[error("configuration error: {reason}")]
    Configuration { reason: String },

    // -- Crypto errors ------------------------------------------------------
    /// Encryption failed (ring internal error or RNG failure).
    #[error("encryption failed: {reason}")]
    Encryption { reason: String },

    /// Decryption failed: wrong key, tampered ciphertext, nonce or tag, or a
    /// malformed encoding. No partial plaintext is ever returned.
    #[error("decryption failed: {reason}")]
    Decryption { reason: String },

    /// The system CSPRNG could not produce random bytes.
    #[error("random generation failed")]
    Random,
}

impl VaultError {
    pub(crate) fn config(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }

    pub(crate) fn decryption(reason: impl Into<String>) -> Self {
        Self::Decryption {
            reason: reason.into(),
        }
    }
}

/// Convenience alias used throughout the vault crate.
pub type Result<T> = std::result::Result<T, VaultError>;
