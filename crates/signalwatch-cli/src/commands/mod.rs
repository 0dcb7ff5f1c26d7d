mod confirm;
mod poll;
mod register;
mod symbols;

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use signalwatch_core::{
    TokenGenerator, VerificationConfig, VerificationFlow, Warehouse, WarehouseConfig,
};

use crate::cli::{Cli, Command};
use crate::error::CliError;

pub async fn run(cli: &Cli) -> Result<Value, CliError> {
    let warehouse = Arc::new(open_warehouse(cli)?);

    match &cli.command {
        Command::Symbols(args) => {
            symbols::run(args, Duration::from_millis(cli.timeout_ms), warehouse).await
        }
        Command::Register(args) => register::run(args, &verification_flow(cli, warehouse)),
        Command::Poll(args) => poll::run(args, &verification_flow(cli, warehouse)),
        Command::Confirm(args) => confirm::run(args, &verification_flow(cli, warehouse)),
    }
}

fn open_warehouse(cli: &Cli) -> Result<Warehouse, CliError> {
    let mut config = WarehouseConfig::default();
    if let Some(path) = &cli.db_path {
        config.db_path = path.clone();
    }
    tracing::debug!(db_path = %config.db_path.display(), "opening warehouse");
    Ok(Warehouse::open(config)?)
}

fn verification_flow(cli: &Cli, warehouse: Arc<Warehouse>) -> VerificationFlow {
    let mut config = VerificationConfig::from_env();
    if let Some(username) = &cli.bot_username {
        config = config.with_bot_username(username.clone());
    }
    VerificationFlow::new(config, warehouse, TokenGenerator::new())
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use tempfile::tempdir;

    use super::*;

    fn cli(db: &std::path::Path, args: &[&str]) -> Cli {
        let db = db.to_string_lossy().to_string();
        let mut argv = vec!["signalwatch", "--db-path", db.as_str(), "--bot-username", "cli_bot"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).expect("valid arguments")
    }

    #[tokio::test]
    async fn register_poll_confirm_round_trip() {
        let dir = tempdir().expect("tempdir");
        let db = dir.path().join("warehouse.duckdb");

        let registered = run(&cli(
            &db,
            &[
                "register",
                "--name",
                "Ada",
                "--email",
                "a@x.com",
                "--phone",
                "+15551234567",
                "--password-hash",
                "$2y$12$precomputed",
            ],
        ))
        .await
        .expect("register succeeds");

        let account_id = registered["account_id"].as_i64().expect("numeric id");
        let link = registered["confirmation_link"].as_str().expect("link");
        assert!(link.starts_with("https://t.me/cli_bot?start=w48135207--w"));

        let id = account_id.to_string();
        let pending = run(&cli(&db, &["poll", &id])).await.expect("poll");
        assert_eq!(pending["status"], "pending");

        let payload = link.split_once("?start=").map(|(_, p)| p).expect("payload");
        let confirmed = run(&cli(&db, &["confirm", payload, "--channel-id", "99"]))
            .await
            .expect("confirm");
        assert_eq!(confirmed["status"], "verified");

        let verified = run(&cli(&db, &["poll", &id])).await.expect("poll");
        assert_eq!(verified["status"], "verified");
        assert_eq!(verified["grant"]["redirect"], "/home");
        assert_eq!(verified["grant"]["remember"], true);
    }

    #[tokio::test]
    async fn polling_unknown_account_exits_with_not_found() {
        let dir = tempdir().expect("tempdir");
        let db = dir.path().join("warehouse.duckdb");

        let error = run(&cli(&db, &["poll", "77"]))
            .await
            .expect_err("unknown account");

        assert_eq!(error.exit_code(), 3);
    }
}
