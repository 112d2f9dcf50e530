//! Integration tests for the ledgerlink-session crate.
//!
//! These drive the orchestrator the way the HTTP layer does: exchange,
//! verify the returned token, resolve the session, open the secret.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use ledgerlink_session::{
    CredentialProvider, ExchangeOrchestrator, KeyedSessionStore, SessionError, SessionIssuer,
    SessionStore, SigningKey, SimulatedProvider, SingleSlotStore, TokenError,
};
use ledgerlink_vault::{CryptoVault, EncryptedSecret, VaultKey};

fn build(
    store: Arc<dyn SessionStore>,
    provider: Arc<dyn CredentialProvider>,
) -> Arc<ExchangeOrchestrator> {
    let vault = Arc::new(CryptoVault::new(VaultKey::generate().unwrap()));
    let issuer = Arc::new(SessionIssuer::new(
        SigningKey::new(b"integration-signing-key-0123456789abcdef".to_vec()).unwrap(),
    ));
    Arc::new(ExchangeOrchestrator::new(vault, store, issuer, provider))
}

// ═══════════════════════════════════════════════════════════════════════
//  Token properties
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn minted_tokens_verify_for_many_owners() {
    let orch = build(
        Arc::new(SingleSlotStore::new()),
        Arc::new(SimulatedProvider::new()),
    );
    let long_owner = "x".repeat(256);
    for owner in ["a", "user-123", "mock-user", "ünïcødé", long_owner.as_str()] {
        let token = orch.issuer().mint(owner).unwrap();
        let claims = orch.issuer().verify(token.as_str()).unwrap();
        assert_eq!(claims.owner_id, owner);
        assert!(claims.expires_at > Utc::now().timestamp());
    }
}

#[tokio::test]
async fn every_single_character_change_is_rejected() {
    let orch = build(
        Arc::new(SingleSlotStore::new()),
        Arc::new(SimulatedProvider::new()),
    );
    let token = orch.issuer().mint("user-123").unwrap().into_string();

    for (index, original) in token.char_indices() {
        let replacement = if original == 'A' { 'B' } else { 'A' };
        let mut altered = token.clone();
        altered.replace_range(index..index + original.len_utf8(), &replacement.to_string());
        assert!(
            orch.issuer().verify(&altered).is_err(),
            "change at {index} was accepted"
        );
    }
}

#[tokio::test]
async fn week_old_token_is_expired() {
    let orch = build(
        Arc::new(SingleSlotStore::new()),
        Arc::new(SimulatedProvider::new()),
    );
    let issued = Utc::now() - chrono::Duration::days(7) - chrono::Duration::seconds(5);
    let token = orch.issuer().mint_at("user-123", issued).unwrap();
    assert_eq!(
        orch.issuer().verify(token.as_str()),
        Err(TokenError::Expired)
    );
}

// ═══════════════════════════════════════════════════════════════════════
//  Exchange flow
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn exchange_then_decrypt_returns_original_secret() {
    let orch = build(
        Arc::new(KeyedSessionStore::new(Duration::from_secs(60))),
        Arc::new(SimulatedProvider::with_access_token("sec-42")),
    );

    let token = orch.exchange("user-123", None).await.unwrap();
    let claims = orch.issuer().verify(token.as_str()).unwrap();
    let session = orch.store().get(&claims.owner_id).await.unwrap();

    assert!(!session.encrypted_secret.encode().contains("sec-42"));
    let secret = orch.open_secret(&claims).await.unwrap();
    assert_eq!(secret.expose(), b"sec-42");
}

#[tokio::test]
async fn corrupted_envelope_fails_to_open() {
    let store = Arc::new(SingleSlotStore::new());
    let orch = build(
        store.clone(),
        Arc::new(SimulatedProvider::with_access_token("sec-42")),
    );
    let token = orch.exchange("user-123", None).await.unwrap();
    let claims = orch.issuer().verify(token.as_str()).unwrap();

    let mut session = store.current().await.unwrap();
    let mut bytes = session.encrypted_secret.to_bytes();
    let last = bytes.len() - 1;
    bytes[last] ^= 0x01;
    session.encrypted_secret = EncryptedSecret::from_bytes(&bytes).unwrap();
    store.put(session).await;

    let err = orch.open_secret(&claims).await.unwrap_err();
    assert!(matches!(err, SessionError::Vault(_)));
    assert!(!err.to_string().contains("sec-42"));
}

// ═══════════════════════════════════════════════════════════════════════
//  Concurrency
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn single_slot_keeps_only_last_owner() {
    let store = Arc::new(SingleSlotStore::new());
    let orch = build(store.clone(), Arc::new(SimulatedProvider::new()));

    let (alice, bob) = tokio::join!(orch.exchange("alice", None), orch.exchange("bob", None));
    let alice = orch.issuer().verify(alice.unwrap().as_str()).unwrap();
    let bob = orch.issuer().verify(bob.unwrap().as_str()).unwrap();

    let survivor = store.current().await.unwrap().owner_id;
    let (winner, loser) = if survivor == "alice" {
        (alice, bob)
    } else {
        (bob, alice)
    };
    assert!(orch.open_secret(&winner).await.is_ok());
    assert!(matches!(
        orch.open_secret(&loser).await,
        Err(SessionError::NoSession { .. })
    ));
}

#[tokio::test]
async fn keyed_store_keeps_both_owners() {
    let orch = build(
        Arc::new(KeyedSessionStore::new(Duration::from_secs(60))),
        Arc::new(SimulatedProvider::new()),
    );

    let (alice, bob) = tokio::join!(orch.exchange("alice", None), orch.exchange("bob", None));
    for token in [alice.unwrap(), bob.unwrap()] {
        let claims = orch.issuer().verify(token.as_str()).unwrap();
        assert!(orch.open_secret(&claims).await.is_ok());
    }
}

#[tokio::test]
async fn concurrent_exchanges_for_one_owner_stay_consistent() {
    let orch = build(
        Arc::new(KeyedSessionStore::new(Duration::from_secs(60))),
        Arc::new(SimulatedProvider::with_access_token("sec-42")),
    );

    let mut handles = Vec::new();
    for _ in 0..8 {
        let orch = Arc::clone(&orch);
        handles.push(tokio::spawn(async move {
            orch.exchange("user-123", None).await
        }));
    }

    for handle in handles {
        let token = handle.await.unwrap().unwrap();
        let claims = orch.issuer().verify(token.as_str()).unwrap();
        assert_eq!(orch.open_secret(&claims).await.unwrap().expose(), b"sec-42");
    }
}
