//! liftlog binary.
//!
//! Reads `liftlog.toml` (or the path given with `--config`), opens the local
//! SQLite store and runs one subcommand, printing its result as JSON.

use std::path::PathBuf;

use anyhow::Context as _;
use clap::Parser;
use liftlog_cli::{AppConfig, Command, Container, run};
use liftlog_store_sqlite::SqliteStore;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Local-first workout log")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "liftlog.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Logs go to stderr; stdout carries the JSON result.
  tracing_subscriber::fmt()
    .with_writer(std::io::stderr)
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let config = AppConfig::load(&cli.config).context("failed to load configuration")?;

  let store = SqliteStore::open_with(config.database_options())
    .await
    .with_context(|| format!("failed to open store at {}", config.database_path.display()))?;
  tracing::debug!(path = %config.database_path.display(), "Store opened");

  let app = Container::new(store);
  let output = run(cli.command, &app, &config).await?;

  println!("{}", serde_json::to_string_pretty(&output)?);
  Ok(())
}
