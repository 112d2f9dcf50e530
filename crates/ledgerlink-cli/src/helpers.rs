//! Shared helper functions used across CLI subcommands.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tracing_subscriber::EnvFilter;

use ledgerlink_session::issuer::MIN_SIGNING_KEY_LEN;

// ---------------------------------------------------------------------------
// Tracing
// ---------------------------------------------------------------------------

/// Initialize the tracing subscriber with the given default log level.
///
/// `RUST_LOG` takes precedence over `default_level`.
pub fn init_tracing(default_level: &str, json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .compact()
            .init();
    }
}

// ---------------------------------------------------------------------------
// Shutdown
// ---------------------------------------------------------------------------

/// Resolve when the process receives Ctrl-C.
pub async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("shutdown requested"),
        Err(e) => tracing::warn!(error = %e, "failed to listen for Ctrl-C"),
    }
}

// ---------------------------------------------------------------------------
// Keys
// ---------------------------------------------------------------------------

/// Encode random bytes as a signing key accepted by `LEDGERLINK_SIGNING_KEY`.
pub fn encode_signing_key(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Number of random bytes behind a generated signing key.
pub const SIGNING_KEY_RANDOM_BYTES: usize = MIN_SIGNING_KEY_LEN + 16;
