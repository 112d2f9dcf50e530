//! Server-side session storage.
//!
//! Two implementations sit behind the [`SessionStore`] trait:
//!
//! - [`SingleSlotStore`] keeps at most one session for the whole process.
//!   Every `put` replaces whatever was there, whoever it belonged to. This
//!   matches a single-user deployment and loses data if two owners link
//!   concurrently.
//! - [`KeyedSessionStore`] keys sessions by owner id in a [`moka`] cache
//!   whose time-to-live matches the token lifetime, so a session never
//!   outlives every token that could resolve it.
//!
//! Neither store enforces token expiry itself; that happens at the request
//! boundary.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::model::Session;

/// Upper bound on concurrently stored sessions in the keyed store.
const KEYED_STORE_CAPACITY: u64 = 10_000;

/// Which [`SessionStore`] implementation to build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreKind {
    /// One global slot, last write wins.
    Single,
    /// One entry per owner id.
    #[default]
    Keyed,
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Single => "single",
            Self::Keyed => "keyed",
        })
    }
}

impl FromStr for StoreKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "single" => Ok(Self::Single),
            "keyed" => Ok(Self::Keyed),
            other => Err(format!("unknown session store kind: {other}")),
        }
    }
}

/// Storage for [`Session`] records.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Store `session`, unconditionally replacing any session it supersedes.
    async fn put(&self, session: Session);

    /// The current session for `owner_id`, if any.
    async fn get(&self, owner_id: &str) -> Option<Session>;

    fn kind(&self) -> StoreKind;
}

// ---------------------------------------------------------------------------
// SingleSlotStore
// ---------------------------------------------------------------------------

/// A single mutable slot holding at most one session.
#[derive(Default)]
pub struct SingleSlotStore {
    slot: RwLock<Option<Session>>,
}

impl SingleSlotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whatever session occupies the slot, regardless of owner.
    pub async fn current(&self) -> Option<Session> {
        self.slot.read().await.clone()
    }
}

#[async_trait]
impl SessionStore for SingleSlotStore {
    async fn put(&self, session: Session) {
        let mut slot = self.slot.write().await;
        if let Some(previous) = slot.as_ref().filter(|s| s.owner_id != session.owner_id) {
            tracing::warn!(
                replaced_owner = %previous.owner_id,
                owner_id = %session.owner_id,
                "single-slot store replaced another owner's session"
            );
        }
        *slot = Some(session);
    }

    /// Returns the slot only when it belongs to `owner_id`, so a token for a
    /// replaced owner can never open someone else's credential.
    async fn get(&self, owner_id: &str) -> Option<Session> {
        self.slot
            .read()
            .await
            .as_ref()
            .filter(|s| s.owner_id == owner_id)
            .cloned()
    }

    fn kind(&self) -> StoreKind {
        StoreKind::Single
    }
}

// ---------------------------------------------------------------------------
// KeyedSessionStore
// ---------------------------------------------------------------------------

/// Sessions keyed by owner id, evicted after `ttl`.
pub struct KeyedSessionStore {
    sessions: Cache<String, Session>,
}

impl KeyedSessionStore {
    pub fn new(ttl: Duration) -> Self {
        let sessions = Cache::builder()
            .max_capacity(KEYED_STORE_CAPACITY)
            .time_to_live(ttl)
            .build();
        Self { sessions }
    }

    /// Approximate number of live sessions.
    pub async fn len(&self) -> u64 {
        self.sessions.run_pending_tasks().await;
        self.sessions.entry_count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl SessionStore for KeyedSessionStore {
    async fn put(&self, session: Session) {
        self.sessions.insert(session.owner_id.clone(), session).await;
    }

    async fn get(&self, owner_id: &str) -> Option<Session> {
        self.sessions.get(owner_id).await
    }

    fn kind(&self) -> StoreKind {
        StoreKind::Keyed
    }
}

/// Build the store selected by configuration.
pub fn build_store(kind: StoreKind, ttl: Duration) -> std::sync::Arc<dyn SessionStore> {
    match kind {
        StoreKind::Single => std::sync::Arc::new(SingleSlotStore::new()),
        StoreKind::Keyed => std::sync::Arc::new(KeyedSessionStore::new(ttl)),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
