//! End-to-end credential exchange.
//!
//! The [`ExchangeOrchestrator`] turns a provider credential into a session
//! token: acquire the secret (with retries), seal it, store the session,
//! and only then mint the token. The plaintext secret never leaves the
//! stack frame of [`ExchangeOrchestrator::exchange`].

use std::sync::Arc;

use chrono::NaiveDate;
use dashmap::DashMap;
use ledgerlink_vault::CryptoVault;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::error::{Result, SessionError};
use crate::issuer::SessionIssuer;
use crate::model::{Claims, Secret, Session, SessionToken};
use crate::provider::CredentialProvider;
use crate::retry::RetryPolicy;
use crate::store::SessionStore;

/// Coordinates the vault, the session store, the issuer and the provider.
pub struct ExchangeOrchestrator {
    vault: Arc<CryptoVault>,
    store: Arc<dyn SessionStore>,
    issuer: Arc<SessionIssuer>,
    provider: Arc<dyn CredentialProvider>,
    retry: RetryPolicy,
    /// One lock per owner so concurrent exchanges for the same owner run
    /// one after the other.
    owner_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl ExchangeOrchestrator {
    pub fn new(
        vault: Arc<CryptoVault>,
        store: Arc<dyn SessionStore>,
        issuer: Arc<SessionIssuer>,
        provider: Arc<dyn CredentialProvider>,
    ) -> Self {
        Self {
            vault,
            store,
            issuer,
            provider,
            retry: RetryPolicy::default(),
            owner_locks: DashMap::new(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn issuer(&self) -> &SessionIssuer {
        &self.issuer
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    fn owner_lease<'a>(&'a self, owner_id: &'a str) -> OwnerLease<'a> {
        let lock = self
            .owner_locks
            .entry(owner_id.to_owned())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        OwnerLease {
            locks: &self.owner_locks,
            owner_id,
            lock,
        }
    }

    /// Exchange a public token for a session token bound to `owner_id`.
    ///
    /// Steps, in order:
    /// 1. Acquire the secret from the provider under the retry policy.
    /// 2. Seal it with the vault.
    /// 3. Replace the owner's session in the store.
    /// 4. Mint and return a session token.
    ///
    /// A token is only minted once step 3 has completed, so every token this
    /// returns resolves to a stored session.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Upstream`] if the provider fails after
    /// retries (nothing is stored, nothing is minted), or a vault/signing
    /// error if sealing or minting fails.
    pub async fn exchange(
        &self,
        owner_id: &str,
        public_token: Option<&str>,
    ) -> Result<SessionToken> {
        let lease = self.owner_lease(owner_id);
        let _guard = lease.lock.lock().await;

        tracing::info!(
            owner_id,
            provider = self.provider.name(),
            "starting credential exchange"
        );

        let sealed = {
            let secret = self
                .retry
                .run("exchange_public_token", || {
                    self.provider.exchange_public_token(public_token)
                })
                .await?;
            self.vault.encrypt(secret.expose())?
        };

        self.store.put(Session::new(owner_id, sealed)).await;
        let token = self.issuer.mint(owner_id)?;

        tracing::info!(owner_id, "credential exchange completed");
        Ok(token)
    }

    /// Create a link token for the client-side linking UI.
    pub async fn create_link_token(&self, owner_id: &str) -> Result<String> {
        self.retry
            .run("create_link_token", || {
                self.provider.create_link_token(owner_id)
            })
            .await
    }

    /// Open the sealed secret of the session the claims refer to.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NoSession`] if the store has no session for
    /// the owner, or [`SessionError::Vault`] if the envelope fails to
    /// authenticate.
    pub async fn open_secret(&self, claims: &Claims) -> Result<Secret> {
        let session =
            self.store
                .get(&claims.owner_id)
                .await
                .ok_or_else(|| SessionError::NoSession {
                    owner_id: claims.owner_id.clone(),
                })?;
        let plaintext = self.vault.decrypt(&session.encrypted_secret)?;
        Ok(Secret::new(plaintext))
    }

    /// Fetch the owner's transactions between `start` and `end`.
    pub async fn fetch_transactions(
        &self,
        claims: &Claims,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Value>> {
        let secret = self.open_secret(claims).await?;
        self.retry
            .run("fetch_transactions", || {
                self.provider.fetch_transactions(&secret, start, end)
            })
            .await
    }
}

/// A handle on one owner's exchange lock.
///
/// Dropping the last outstanding lease removes the owner's entry from the
/// lock map, so the map only holds owners with an exchange in flight. This
/// also runs when an exchange future is cancelled.
struct OwnerLease<'a> {
    locks: &'a DashMap<String, Arc<Mutex<()>>>,
    owner_id: &'a str,
    lock: Arc<Mutex<()>>,
}

impl Drop for OwnerLease<'_> {
    fn drop(&mut self) {
        // The map's own reference plus ours: nobody else is waiting.
        self.locks.remove_if(self.owner_id, |_, lock| Arc::strong_count(lock) == 2);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use ledgerlink_vault::VaultKey;

    use super::*;
    use crate::issuer::SigningKey;
    use crate::provider::SimulatedProvider;
    use crate::store::{KeyedSessionStore, SingleSlotStore};

    struct FailingProvider {
        calls: AtomicU32,
    }

    #[async_trait]
    impl CredentialProvider for FailingProvider {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn create_link_token(&self, _client_user_id: &str) -> Result<String> {
            Err(SessionError::upstream("HTTP 500"))
        }

        async fn exchange_public_token(&self, _public_token: Option<&str>) -> Result<Secret> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(SessionError::upstream("HTTP 503"))
        }

        async fn fetch_transactions(
            &self,
            _secret: &Secret,
            _start: NaiveDate,
            _end: NaiveDate,
        ) -> Result<Vec<Value>> {
            Err(SessionError::upstream("HTTP 500"))
        }
    }

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(1),
            deadline: Duration::from_secs(5),
        }
    }

    fn orchestrator(
        store: Arc<dyn SessionStore>,
        provider: Arc<dyn CredentialProvider>,
    ) -> ExchangeOrchestrator {
        let vault = Arc::new(CryptoVault::new(VaultKey::generate().unwrap()));
        let issuer = Arc::new(SessionIssuer::new(SigningKey::new(vec![9u8; 32]).unwrap()));
        ExchangeOrchestrator::new(vault, store, issuer, provider).with_retry_policy(fast_retry())
    }

    #[tokio::test]
    async fn exchange_round_trips_secret() {
        let orch = orchestrator(
            Arc::new(SingleSlotStore::new()),
            Arc::new(SimulatedProvider::with_access_token("sec-42")),
        );

        let token = orch.exchange("user-123", None).await.unwrap();
        let claims = orch.issuer().verify(token.as_str()).unwrap();
        let secret = orch.open_secret(&claims).await.unwrap();

        assert_eq!(claims.owner_id, "user-123");
        assert_eq!(secret.expose(), b"sec-42");
    }

    #[tokio::test]
    async fn token_does_not_contain_secret() {
        let orch = orchestrator(
            Arc::new(SingleSlotStore::new()),
            Arc::new(SimulatedProvider::with_access_token("sec-42")),
        );
        let token = orch.exchange("user-123", None).await.unwrap();
        assert!(!token.as_str().contains("sec-42"));
    }

    #[tokio::test]
    async fn upstream_failure_stores_nothing() {
        let provider = Arc::new(FailingProvider {
            calls: AtomicU32::new(0),
        });
        let store = Arc::new(SingleSlotStore::new());
        let orch = orchestrator(store.clone(), provider.clone());

        let err = orch.exchange("user-123", Some("public-x")).await.unwrap_err();
        assert!(matches!(err, SessionError::Upstream { .. }));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
        assert!(store.current().await.is_none());
    }

    #[tokio::test]
    async fn missing_session_is_reported() {
        let orch = orchestrator(
            Arc::new(KeyedSessionStore::new(Duration::from_secs(60))),
            Arc::new(SimulatedProvider::new()),
        );
        let token = orch.issuer().mint("ghost").unwrap();
        let claims = orch.issuer().verify(token.as_str()).unwrap();
        assert!(matches!(
            orch.open_secret(&claims).await,
            Err(SessionError::NoSession { .. })
        ));
    }

    #[tokio::test]
    async fn repeated_exchange_replaces_session() {
        let store = Arc::new(KeyedSessionStore::new(Duration::from_secs(60)));
        let orch = orchestrator(store.clone(), Arc::new(SimulatedProvider::new()));

        orch.exchange("user-123", None).await.unwrap();
        let first = store.get("user-123").await.unwrap();
        orch.exchange("user-123", None).await.unwrap();
        let second = store.get("user-123").await.unwrap();

        assert_ne!(first.encrypted_secret, second.encrypted_secret);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn fetch_transactions_uses_stored_secret() {
        let orch = orchestrator(
            Arc::new(SingleSlotStore::new()),
            Arc::new(SimulatedProvider::new()),
        );
        let token = orch.exchange("user-123", None).await.unwrap();
        let claims = orch.issuer().verify(token.as_str()).unwrap();
        let day = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap();
        let txs = orch.fetch_transactions(&claims, day, day).await.unwrap();
        assert_eq!(txs.len(), 3);
    }

    #[tokio::test]
    async fn failed_exchanges_leave_no_owner_locks() {
        let provider = Arc::new(FailingProvider {
            calls: AtomicU32::new(0),
        });
        let orch = orchestrator(Arc::new(SingleSlotStore::new()), provider)
            .with_retry_policy(RetryPolicy::no_retry(Duration::from_secs(5)));

        for i in 0..1000 {
            let owner = format!("owner-{i}");
            assert!(orch.exchange(&owner, Some("public-x")).await.is_err());
        }
        assert_eq!(orch.owner_locks.len(), 0);
    }

    #[tokio::test]
    async fn successful_exchanges_leave_no_owner_locks() {
        let orch = orchestrator(
            Arc::new(KeyedSessionStore::new(Duration::from_secs(60))),
            Arc::new(SimulatedProvider::new()),
        );

        for i in 0..200 {
            orch.exchange(&format!("owner-{i}"), None).await.unwrap();
        }
        assert_eq!(orch.owner_locks.len(), 0);
    }

    #[tokio::test]
    async fn concurrent_exchanges_release_the_shared_lock() {
        let orch = Arc::new(orchestrator(
            Arc::new(KeyedSessionStore::new(Duration::from_secs(60))),
            Arc::new(SimulatedProvider::new()),
        ));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let orch = Arc::clone(&orch);
                tokio::spawn(async move { orch.exchange("user-123", None).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        assert_eq!(orch.owner_locks.len(), 0);
    }

    #[test]
    fn lock_entry_outlives_all_but_the_last_lease() {
        let orch = orchestrator(
            Arc::new(SingleSlotStore::new()),
            Arc::new(SimulatedProvider::new()),
        );

        let first = orch.owner_lease("user-123");
        let second = orch.owner_lease("user-123");
        assert!(Arc::ptr_eq(&first.lock, &second.lock));
        assert_eq!(orch.owner_locks.len(), 1);

        drop(first);
        assert_eq!(orch.owner_locks.len(), 1);
        drop(second);
        assert_eq!(orch.owner_locks.len(), 0);
    }
}
