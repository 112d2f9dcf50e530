//! CLI entry point for Ledgerlink.
//!
//! This binary provides the `ledgerlink` command with subcommands for
//! serving the HTTP API, generating key material, and validating
//! configuration.

mod app;
mod cli;
mod config;
mod helpers;

use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use ledgerlink_vault::VaultKey;
use ledgerlink_vault::crypto::random_bytes;
use ledgerlink_web::WebServer;

use crate::cli::{Cli, Commands};
use crate::config::LedgerlinkConfig;
use crate::helpers::{SIGNING_KEY_RANDOM_BYTES, encode_signing_key, init_tracing, shutdown_signal};

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config, json } => cmd_serve(config.as_deref(), json).await,
        Commands::Keygen => cmd_keygen(),
        Commands::Check { config } => cmd_check(config.as_deref()),
    }
}

// ---------------------------------------------------------------------------
// Subcommand: serve
// ---------------------------------------------------------------------------

async fn cmd_serve(config_path: Option<&Path>, json: bool) -> Result<()> {
    init_tracing("info", json);

    info!(version = env!("CARGO_PKG_VERSION"), "starting Ledgerlink");

    let config = LedgerlinkConfig::load(config_path).context("configuration error")?;
    let server_config = config.server.clone();
    let state = app::build_state(config)?;

    WebServer::new(server_config, state)
        .start(shutdown_signal())
        .await
        .context("web server failed")?;

    info!("Ledgerlink stopped");
    Ok(())
}

// ---------------------------------------------------------------------------
// Subcommand: keygen
// ---------------------------------------------------------------------------

fn cmd_keygen() -> Result<()> {
    let encryption_key = VaultKey::generate().context("failed to generate encryption key")?;
    let signing_bytes =
        random_bytes(SIGNING_KEY_RANDOM_BYTES).context("failed to generate signing key")?;

    println!("LEDGERLINK_ENCRYPTION_KEY={}", encryption_key.to_base64());
    println!("LEDGERLINK_SIGNING_KEY={}", encode_signing_key(&signing_bytes));
    Ok(())
}

// ---------------------------------------------------------------------------
// Subcommand: check
// ---------------------------------------------------------------------------

fn cmd_check(config_path: Option<&Path>) -> Result<()> {
    init_tracing("warn", false);

    let config = LedgerlinkConfig::load(config_path).context("configuration error")?;

    println!();
    println!("  Ledgerlink v{}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("  Configuration OK");
    println!("    Listen address:  {}:{}", config.server.bind_addr, config.server.port);
    println!("    Provider:        {}", config.provider.name());
    println!("    Session store:   {}", config.session.store);
    println!("    Token lifetime:  {} days", config.session.token_lifetime_days);
    println!(
        "    Fixed owner:     {}",
        config.fixed_owner().as_deref().unwrap_or("(per client)")
    );
    println!(
        "    Upstream:        {} attempts, {} ms backoff, {} ms deadline",
        config.upstream.max_attempts,
        config.upstream.initial_backoff.as_millis(),
        config.upstream.deadline.as_millis()
    );
    println!("    Encryption key:  set");
    println!("    Signing key:     set");
    println!();
    Ok(())
}
