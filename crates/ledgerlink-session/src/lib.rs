//! Session and token custody for Ledgerlink.
//!
//! The provider access token never reaches the client. Instead this crate:
//!
//! - seals the access token with [`ledgerlink_vault::CryptoVault`] and keeps
//!   it in a [`SessionStore`],
//! - hands the client a short-lived, HMAC-signed [`SessionToken`],
//! - verifies that token on every protected request and opens the sealed
//!   secret only for the duration of the upstream call.
//!
//! # Architecture
//!
//! ```text
//! ExchangeOrchestrator
//! ├── CredentialProvider  (Plaid or simulated, chosen at startup)
//! ├── RetryPolicy         (bounded retries + deadline around the provider)
//! ├── CryptoVault         (AES-256-GCM sealing)
//! ├── SessionStore        (single slot or keyed by owner)
//! └── SessionIssuer       (HS256 tokens, 7-day lifetime)
//! ```
//!
//! # Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use ledgerlink_session::{
//!     ExchangeOrchestrator, SessionIssuer, SigningKey, SimulatedProvider, SingleSlotStore,
//! };
//! use ledgerlink_vault::{CryptoVault, VaultKey};
//!
//! # async fn example() -> ledgerlink_session::Result<()> {
//! let orchestrator = ExchangeOrchestrator::new(
//!     Arc::new(CryptoVault::new(VaultKey::generate()?)),
//!     Arc::new(SingleSlotStore::new()),
//!     Arc::new(SessionIssuer::new(SigningKey::new(vec![7u8; 32])?)),
//!     Arc::new(SimulatedProvider::with_access_token("sec-42")),
//! );
//!
//! let token = orchestrator.exchange("user-123", None).await?;
//! let claims = orchestrator.issuer().verify(token.as_str())?;
//! let secret = orchestrator.open_secret(&claims).await?;
//! assert_eq!(secret.expose(), b"sec-42");
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod issuer;
pub mod model;
pub mod orchestrator;
pub mod provider;
pub mod retry;
pub mod store;

pub use error::{Result, SessionError, TokenError};
pub use issuer::{SessionIssuer, SigningKey};
pub use model::{Claims, Secret, Session, SessionToken};
pub use orchestrator::ExchangeOrchestrator;
pub use provider::{
    CredentialProvider, PlaidConfig, PlaidEnvironment, PlaidProvider, SimulatedProvider,
};
pub use retry::RetryPolicy;
pub use store::{KeyedSessionStore, SessionStore, SingleSlotStore, StoreKind};
