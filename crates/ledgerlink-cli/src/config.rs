//! Startup configuration.
//!
//! Non-secret settings come from `config/default.toml` (or the file passed
//! with `--config`); environment variables override them. Key material is
//! only ever read from the environment, after `.env` has been loaded.
//!
//! A missing or invalid key is fatal: [`LedgerlinkConfig::load`] fails and
//! the process exits before any socket is bound.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::Deserialize;

use ledgerlink_session::issuer::DEFAULT_TOKEN_LIFETIME_DAYS;
use ledgerlink_session::{PlaidConfig, PlaidEnvironment, RetryPolicy, SigningKey, StoreKind};
use ledgerlink_vault::VaultKey;
use ledgerlink_web::WebConfig;

/// Default location of the settings file.
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Owner bound to the single-user deployment.
pub const DEFAULT_OWNER_ID: &str = "user-123";
pub const DEFAULT_MOCK_OWNER_ID: &str = "mock-user";

/// Longest session token lifetime accepted from configuration.
pub const MAX_TOKEN_LIFETIME_DAYS: i64 = 365;

// ---------------------------------------------------------------------------
// File layout
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileConfig {
    server: ServerSection,
    session: SessionSection,
    upstream: UpstreamSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ServerSection {
    bind: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct SessionSection {
    store: Option<StoreKind>,
    token_lifetime_days: Option<i64>,
    owner_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct UpstreamSection {
    max_attempts: Option<u32>,
    initial_backoff_ms: Option<u64>,
    deadline_ms: Option<u64>,
}

// ---------------------------------------------------------------------------
// Resolved configuration
// ---------------------------------------------------------------------------

/// How exchanged sessions are stored and for how long.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    pub store: StoreKind,
    pub token_lifetime_days: i64,
    /// Explicitly configured owner. The single-slot store always uses one.
    pub owner_id: Option<String>,
}

/// Which credential provider to run against.
#[derive(Debug, Clone)]
pub enum ProviderSettings {
    Simulated,
    Plaid(PlaidConfig),
}

impl ProviderSettings {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Simulated => "simulated",
            Self::Plaid(_) => "plaid",
        }
    }
}

/// Everything the server needs, resolved once at startup.
#[derive(Debug)]
pub struct LedgerlinkConfig {
    pub encryption_key: VaultKey,
    pub signing_key: SigningKey,
    pub provider: ProviderSettings,
    pub server: WebConfig,
    pub session: SessionSettings,
    pub upstream: RetryPolicy,
}

impl LedgerlinkConfig {
    /// Load `.env`, the settings file and the process environment.
    ///
    /// An explicit `path` must exist; the default path is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Ok(env_path) = dotenvy::dotenv() {
            tracing::debug!(path = %env_path.display(), "loaded .env");
        }
        Self::load_with(path, |key| std::env::var(key).ok())
    }

    /// Like [`Self::load`], reading variables through `lookup` instead of
    /// the process environment.
    pub fn load_with<F>(path: Option<&Path>, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let content = match path {
            Some(path) => Some(
                std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read config file {}", path.display()))?,
            ),
            None => std::fs::read_to_string(DEFAULT_CONFIG_PATH).ok(),
        };
        Self::from_sources(content.as_deref(), lookup)
    }

    /// Resolve configuration from TOML text (if any) and a variable lookup.
    pub fn from_sources<F>(toml_text: Option<&str>, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let file: FileConfig = match toml_text {
            Some(text) => toml::from_str(text).context("invalid configuration file")?,
            None => FileConfig::default(),
        };
        let var = |key: &str| lookup(key).map(|v| v.trim().to_owned()).filter(|v| !v.is_empty());

        let encryption_key = VaultKey::from_config(var("LEDGERLINK_ENCRYPTION_KEY").as_deref())
            .context("LEDGERLINK_ENCRYPTION_KEY is missing or invalid")?;
        let signing_key = SigningKey::from_config(var("LEDGERLINK_SIGNING_KEY").as_deref())
            .context("LEDGERLINK_SIGNING_KEY is missing or invalid")?;

        let mock_mode = match var("LEDGERLINK_MOCK_MODE").or_else(|| var("MOCK_MODE")) {
            Some(value) => parse_bool(&value)
                .with_context(|| format!("invalid mock mode flag: {value}"))?,
            None => false,
        };

        let provider = if mock_mode {
            ProviderSettings::Simulated
        } else {
            let environment = match var("PLAID_ENV") {
                Some(value) => value
                    .parse::<PlaidEnvironment>()
                    .map_err(anyhow::Error::msg)?,
                None => PlaidEnvironment::default(),
            };
            let (Some(client_id), Some(secret)) = (var("PLAID_CLIENT_ID"), var("PLAID_SECRET"))
            else {
                bail!("PLAID_CLIENT_ID and PLAID_SECRET are required unless mock mode is enabled");
            };
            ProviderSettings::Plaid(PlaidConfig {
                environment,
                client_id,
                secret,
            })
        };

        let defaults = WebConfig::default();
        let port = match var("LEDGERLINK_PORT") {
            Some(value) => value
                .parse::<u16>()
                .with_context(|| format!("invalid LEDGERLINK_PORT: {value}"))?,
            None => file.server.port.unwrap_or(defaults.port),
        };
        let server = WebConfig {
            bind_addr: var("LEDGERLINK_BIND")
                .or(file.server.bind)
                .unwrap_or(defaults.bind_addr),
            port,
        };

        let store = match var("LEDGERLINK_SESSION_STORE") {
            Some(value) => value.parse::<StoreKind>().map_err(anyhow::Error::msg)?,
            None => file.session.store.unwrap_or_default(),
        };
        let token_lifetime_days = file
            .session
            .token_lifetime_days
            .unwrap_or(DEFAULT_TOKEN_LIFETIME_DAYS);
        if !(1..=MAX_TOKEN_LIFETIME_DAYS).contains(&token_lifetime_days) {
            bail!(
                "session.token_lifetime_days must be between 1 and {MAX_TOKEN_LIFETIME_DAYS}, \
                 got {token_lifetime_days}"
            );
        }
        let session = SessionSettings {
            store,
            token_lifetime_days,
            owner_id: file.session.owner_id.filter(|o| !o.trim().is_empty()),
        };

        let retry_defaults = RetryPolicy::default();
        let upstream = RetryPolicy {
            max_attempts: file
                .upstream
                .max_attempts
                .unwrap_or(retry_defaults.max_attempts),
            initial_backoff: file
                .upstream
                .initial_backoff_ms
                .map(Duration::from_millis)
                .unwrap_or(retry_defaults.initial_backoff),
            deadline: file
                .upstream
                .deadline_ms
                .map(Duration::from_millis)
                .unwrap_or(retry_defaults.deadline),
        };
        if upstream.max_attempts == 0 {
            bail!("upstream.max_attempts must be at least 1");
        }

        Ok(Self {
            encryption_key,
            signing_key,
            provider,
            server,
            session,
            upstream,
        })
    }

    pub fn mock_mode(&self) -> bool {
        matches!(self.provider, ProviderSettings::Simulated)
    }

    pub fn token_lifetime(&self) -> chrono::Duration {
        chrono::Duration::days(self.session.token_lifetime_days)
    }

    /// Owner every exchange is bound to, if the deployment pins one.
    ///
    /// The single-slot store holds one session, so it always pins an owner.
    /// The keyed store only does so when `session.owner_id` is set.
    pub fn fixed_owner(&self) -> Option<String> {
        match (&self.session.owner_id, self.session.store) {
            (Some(owner), _) => Some(owner.clone()),
            (None, StoreKind::Single) if self.mock_mode() => Some(DEFAULT_MOCK_OWNER_ID.into()),
            (None, StoreKind::Single) => Some(DEFAULT_OWNER_ID.into()),
            (None, StoreKind::Keyed) => None,
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
