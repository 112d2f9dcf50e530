//! Wiring: turn a [`LedgerlinkConfig`] into shared application state.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;

use ledgerlink_session::store::build_store;
use ledgerlink_session::{
    CredentialProvider, ExchangeOrchestrator, PlaidProvider, SessionIssuer, SimulatedProvider,
};
use ledgerlink_vault::CryptoVault;
use ledgerlink_web::AppState;

use crate::config::{LedgerlinkConfig, ProviderSettings};

const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

/// Select the credential provider once, at startup.
pub fn build_provider(settings: &ProviderSettings) -> Result<Arc<dyn CredentialProvider>> {
    let provider: Arc<dyn CredentialProvider> = match settings {
        ProviderSettings::Simulated => Arc::new(SimulatedProvider::new()),
        ProviderSettings::Plaid(plaid) => Arc::new(
            PlaidProvider::new(plaid.clone()).context("failed to configure Plaid provider")?,
        ),
    };
    Ok(provider)
}

/// Build the application state, consuming the key material in `config`.
pub fn build_state(config: LedgerlinkConfig) -> Result<Arc<AppState>> {
    let fixed_owner = config.fixed_owner();
    let lifetime = config.token_lifetime();
    let store_ttl =
        Duration::from_secs(config.session.token_lifetime_days.unsigned_abs() * SECONDS_PER_DAY);

    let provider = build_provider(&config.provider)?;
    let store = build_store(config.session.store, store_ttl);
    let issuer = SessionIssuer::with_lifetime(config.signing_key, lifetime);
    let vault = CryptoVault::new(config.encryption_key);

    let orchestrator = ExchangeOrchestrator::new(Arc::new(vault), store, Arc::new(issuer), provider)
        .with_retry_policy(config.upstream);

    info!(
        provider = orchestrator.provider_name(),
        store = %config.session.store,
        token_lifetime_days = config.session.token_lifetime_days,
        fixed_owner = fixed_owner.as_deref().unwrap_or("-"),
        "application state ready"
    );

    Ok(Arc::new(AppState::new(Arc::new(orchestrator), fixed_owner)))
}
