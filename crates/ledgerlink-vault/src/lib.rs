//! Credential encryption for Ledgerlink.
//!
//! The provider access token is the one long-lived secret this service holds.
//! This crate seals it with AES-256-GCM before it is stored anywhere and opens
//! it again only for the duration of an upstream call.
//!
//! # Modules
//!
//! - [`crypto`]: [`CryptoVault`] and the [`EncryptedSecret`] envelope.
//! - [`key`]: fixed-length key material loaded at startup.
//! - [`error`]: Unified error types.
//!
//! # Quick Start
//!
//! ```rust
//! use ledgerlink_vault::{CryptoVault, VaultKey};
//!
//! # fn example() -> ledgerlink_vault::Result<()> {
//! let vault = CryptoVault::new(VaultKey::generate()?);
//!
//! let sealed = vault.encrypt(b"access-sandbox-1234")?;
//! let stored = sealed.encode();
//!
//! assert_eq!(vault.decrypt_encoded(&stored)?, b"access-sandbox-1234");
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```

pub mod crypto;
pub mod error;
pub mod key;

pub use crypto::{CryptoVault, EncryptedSecret};
pub use error::{Result, VaultError};
pub use key::{KEY_LEN, VaultKey};
