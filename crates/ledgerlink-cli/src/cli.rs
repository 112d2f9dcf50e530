//! CLI argument definitions for Ledgerlink.
//!
//! All `clap` structures live here so that `main.rs` stays focused on
//! dispatching subcommands.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Ledgerlink -- bank-link session server.
#[derive(Parser)]
#[command(
    name = "ledgerlink",
    version,
    about = "Ledgerlink -- bank-link session server",
    long_about = "Exchanges bank-link public tokens for short-lived signed session tokens, \
                  keeping the provider access token encrypted on the server."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server.
    Serve {
        /// Settings file (defaults to config/default.toml when present).
        #[arg(long)]
        config: Option<PathBuf>,

        /// Emit logs as JSON lines.
        #[arg(long)]
        json: bool,
    },

    /// Print freshly generated encryption and signing keys.
    Keygen,

    /// Validate configuration without starting the server.
    Check {
        /// Settings file (defaults to config/default.toml when present).
        #[arg(long)]
        config: Option<PathBuf>,
    },
}
