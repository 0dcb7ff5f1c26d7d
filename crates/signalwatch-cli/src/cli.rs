//! CLI argument definitions for Signalwatch.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `symbols` | Print the cached instrument catalog |
//! | `register` | Register a pending account and print its bot link |
//! | `poll` | Report an account's verification state |
//! | `confirm` | Replay a bot confirmation payload |
//!
//! # Global Options
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `--pretty` | `false` | Pretty-print JSON output |
//! | `--timeout-ms` | `10000` | Catalog request timeout in ms |
//! | `--db-path` | `$SIGNALWATCH_HOME/cache/warehouse.duckdb` | Warehouse file |
//! | `--bot-username` | `$SIGNALWATCH_BOT_USERNAME` | Bot for confirmation links |
//!
//! # Examples
//!
//! ```bash
//! signalwatch symbols --pretty
//! signalwatch register --name Ada --email a@x.com --phone +15551234567 --password-hash '$2y$12$...'
//! signalwatch poll 1
//! signalwatch confirm 'w48135207--w98429842' --channel-id 123456789
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Signalwatch - instrument catalog and account verification tools
#[derive(Debug, Parser)]
#[command(
    name = "signalwatch",
    author,
    version,
    about = "Instrument catalog and account verification tools"
)]
pub struct Cli {
    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    /// Catalog request timeout in milliseconds.
    #[arg(long, global = true, default_value_t = 10_000)]
    pub timeout_ms: u64,

    /// Warehouse database file.
    #[arg(long, global = true)]
    pub db_path: Option<PathBuf>,

    /// Bot username used in confirmation links.
    #[arg(long, global = true)]
    pub bot_username: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the instrument catalog, refreshing it when older than an hour.
    ///
    /// # Examples
    ///
    ///   signalwatch symbols
    ///   signalwatch symbols --refresh --pretty
    Symbols(SymbolsArgs),

    /// Register a pending account and print its confirmation link.
    Register(RegisterArgs),

    /// Report whether an account has been confirmed.
    Poll(PollArgs),

    /// Apply a confirmation as the bot would.
    ///
    /// PAYLOAD is a token, a `<prefix>--<token>` start payload, or a full
    /// `/start <payload>` message.
    Confirm(ConfirmArgs),
}

#[derive(Debug, Args)]
pub struct SymbolsArgs {
    /// Fetch from the exchange even when the cached catalog is fresh.
    #[arg(long, default_value_t = false)]
    pub refresh: bool,
}

#[derive(Debug, Args)]
pub struct RegisterArgs {
    #[arg(long)]
    pub name: String,

    #[arg(long)]
    pub email: String,

    /// International number, e.g. +15551234567.
    #[arg(long)]
    pub phone: String,

    /// Password hash produced by the caller's hashing policy.
    #[arg(long)]
    pub password_hash: String,
}

#[derive(Debug, Args)]
pub struct PollArgs {
    pub account_id: i64,
}

#[derive(Debug, Args)]
pub struct ConfirmArgs {
    pub payload: String,

    /// Chat id reported by the messaging channel.
    #[arg(long)]
    pub channel_id: String,
}
