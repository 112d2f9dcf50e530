//! External credential providers.
//!
//! A [`CredentialProvider`] is chosen once at startup: [`PlaidProvider`]
//! talks to the Plaid API, [`SimulatedProvider`] returns fixed stand-in
//! values so the whole flow can run without network access.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use url::Url;

use crate::error::{Result, SessionError};
use crate::model::Secret;

/// Client name shown in the Plaid Link UI.
const CLIENT_NAME: &str = "FinTech App";

/// Link token returned by the simulated provider.
pub const SIMULATED_LINK_TOKEN: &str = "mock-link-token";

/// Access token returned by the simulated provider.
pub const SIMULATED_ACCESS_TOKEN: &str = "mock-access-token";

/// Source of provider credentials and of the data they unlock.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Create a short-lived token the client uses to open the linking UI.
    async fn create_link_token(&self, client_user_id: &str) -> Result<String>;

    /// Exchange the client's public token for the long-lived secret.
    async fn exchange_public_token(&self, public_token: Option<&str>) -> Result<Secret>;

    /// Fetch raw transactions between `start` and `end` inclusive.
    async fn fetch_transactions(
        &self,
        secret: &Secret,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Value>>;
}

// ---------------------------------------------------------------------------
// Simulated provider
// ---------------------------------------------------------------------------

/// Offline provider returning fixed values.
pub struct SimulatedProvider {
    access_token: String,
}

impl SimulatedProvider {
    pub fn new() -> Self {
        Self::with_access_token(SIMULATED_ACCESS_TOKEN)
    }

    /// Use a specific stand-in secret.
    pub fn with_access_token(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
        }
    }
}

impl Default for SimulatedProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CredentialProvider for SimulatedProvider {
    fn name(&self) -> &'static str {
        "simulated"
    }

    async fn create_link_token(&self, _client_user_id: &str) -> Result<String> {
        Ok(SIMULATED_LINK_TOKEN.to_owned())
    }

    async fn exchange_public_token(&self, _public_token: Option<&str>) -> Result<Secret> {
        Ok(Secret::new(self.access_token.as_bytes()))
    }

    async fn fetch_transactions(
        &self,
        _secret: &Secret,
        _start: NaiveDate,
        _end: NaiveDate,
    ) -> Result<Vec<Value>> {
        Ok(vec![
            json!({
                "transaction_id": "1",
                "name": "Carrefour",
                "amount": 42.5,
                "date": "2024-12-01",
                "category": ["Groceries"],
            }),
            json!({
                "transaction_id": "2",
                "name": "Netflix",
                "amount": 15.99,
                "date": "2024-12-03",
                "category": ["Entertainment"],
            }),
            json!({
                "transaction_id": "3",
                "name": "SNCF",
                "amount": 67.2,
                "date": "2024-12-05",
                "category": ["Transport"],
            }),
        ])
    }
}

// ---------------------------------------------------------------------------
// Plaid provider
// ---------------------------------------------------------------------------

/// Plaid deployment environment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaidEnvironment {
    #[default]
    Sandbox,
    Development,
    Production,
}

impl PlaidEnvironment {
    pub fn base_url(&self) -> &'static str {
        match self {
            Self::Sandbox => "https://sandbox.plaid.com",
            Self::Development => "https://development.plaid.com",
            Self::Production => "https://production.plaid.com",
        }
    }
}

impl FromStr for PlaidEnvironment {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sandbox" => Ok(Self::Sandbox),
            "development" => Ok(Self::Development),
            "production" => Ok(Self::Production),
            other => Err(format!("unknown Plaid environment: {other}")),
        }
    }
}

/// Credentials for the Plaid API.
#[derive(Clone)]
pub struct PlaidConfig {
    pub environment: PlaidEnvironment,
    pub client_id: String,
    pub secret: String,
}

impl fmt::Debug for PlaidConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaidConfig")
            .field("environment", &self.environment)
            .field("client_id", &self.client_id)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct LinkTokenResponse {
    link_token: String,
}

#[derive(Debug, Deserialize)]
struct ExchangeResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct TransactionsResponse {
    transactions: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct PlaidErrorResponse {
    error_type: Option<String>,
    error_code: Option<String>,
}

/// Provider backed by the Plaid REST API.
pub struct PlaidProvider {
    config: PlaidConfig,
    base_url: Url,
    client: reqwest::Client,
}

impl PlaidProvider {
    /// Create a provider for the configured environment.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidConfig`] if the client id or secret is
    /// empty.
    pub fn new(config: PlaidConfig) -> Result<Self> {
        let base_url = config.environment.base_url();
        Self::with_base_url(config, base_url)
    }

    /// Create a provider against an explicit API root.
    pub fn with_base_url(config: PlaidConfig, base_url: &str) -> Result<Self> {
        if config.client_id.trim().is_empty() || config.secret.trim().is_empty() {
            return Err(SessionError::InvalidConfig {
                reason: "PLAID_CLIENT_ID and PLAID_SECRET are required outside mock mode".into(),
            });
        }
        let base_url = Url::parse(base_url).map_err(|e| SessionError::InvalidConfig {
            reason: format!("invalid Plaid base URL: {e}"),
        })?;
        Ok(Self {
            config,
            base_url,
            client: reqwest::Client::new(),
        })
    }

    async fn post<T: serde::de::DeserializeOwned>(&self, path: &str, body: Value) -> Result<T> {
        let url = self
            .base_url
            .join(path)
            .map_err(|e| SessionError::upstream(format!("invalid Plaid endpoint {path}: {e}")))?;

        tracing::debug!(endpoint = path, environment = ?self.config.environment, "calling Plaid");

        let response = self
            .client
            .post(url)
            .header("PLAID-CLIENT-ID", &self.config.client_id)
            .header("PLAID-SECRET", &self.config.secret)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }

        // Only the error classification is kept; bodies may echo request data.
        let body = response.text().await.unwrap_or_default();
        let detail = serde_json::from_str::<PlaidErrorResponse>(&body)
            .ok()
            .map(|e| {
                format!(
                    " {}/{}",
                    e.error_type.unwrap_or_default(),
                    e.error_code.unwrap_or_default()
                )
            })
            .unwrap_or_default();
        Err(SessionError::upstream(format!(
            "{path}: HTTP {status}{detail}"
        )))
    }
}

#[async_trait]
impl CredentialProvider for PlaidProvider {
    fn name(&self) -> &'static str {
        "plaid"
    }

    async fn create_link_token(&self, client_user_id: &str) -> Result<String> {
        let response: LinkTokenResponse = self
            .post(
                "/link/token/create",
                json!({
                    "user": { "client_user_id": client_user_id },
                    "client_name": CLIENT_NAME,
                    "products": ["transactions"],
                    "country_codes": ["FR"],
                    "language": "fr",
                }),
            )
            .await?;
        Ok(response.link_token)
    }

    async fn exchange_public_token(&self, public_token: Option<&str>) -> Result<Secret> {
        let public_token = public_token
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| SessionError::upstream("public_token is required"))?;
        let response: ExchangeResponse = self
            .post(
                "/item/public_token/exchange",
                json!({ "public_token": public_token }),
            )
            .await?;
        Ok(Secret::new(response.access_token))
    }

    async fn fetch_transactions(
        &self,
        secret: &Secret,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Value>> {
        let access_token = secret
            .expose_str()
            .ok_or_else(|| SessionError::upstream("stored access token is not UTF-8"))?;
        let response: TransactionsResponse = self
            .post(
                "/transactions/get",
                json!({
                    "access_token": access_token,
                    "start_date": start.format("%Y-%m-%d").to_string(),
                    "end_date": end.format("%Y-%m-%d").to_string(),
                }),
            )
            .await?;
        tracing::info!(count = response.transactions.len(), "transactions returned");
        Ok(response.transactions)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
