//! sharename server binary.
//!
//! Reads `config.toml` (or the path given with `--config`) layered under
//! `SHARENAME_*` environment variables, opens the SQLite store, and either
//! serves the JSON API (`serve`, the default) or runs one expiration sweep
//! and exits (`sweep`).

use std::{
  path::{Path, PathBuf},
  sync::Arc,
  time::Duration,
};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use sharename_api::{AppState, ServerConfig};
use sharename_engine::Engine;
use sharename_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Sharename context-sharing server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
  /// Serve the HTTP API (default).
  Serve,
  /// Run the expiration sweep once and print how many contexts it processed.
  Sweep,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("SHARENAME"))
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  let store_path = expand_tilde(&server_cfg.store_path);
  if let Some(parent) = store_path.parent().filter(|p| !p.as_os_str().is_empty()) {
    std::fs::create_dir_all(parent)
      .with_context(|| format!("failed to create {parent:?}"))?;
  }

  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;
  let state = AppState::new(Arc::new(store), server_cfg.clone());

  match cli.command.unwrap_or(Command::Serve) {
    Command::Sweep => {
      let report = state
        .engine
        .run_expiration_sweep()
        .await
        .context("expiration sweep failed")?;
      println!("processed {} expired context(s), {} failed", report.processed, report.failed);
      Ok(())
    }
    Command::Serve => serve(state, &server_cfg).await,
  }
}

async fn serve(state: AppState<SqliteStore>, server_cfg: &ServerConfig) -> anyhow::Result<()> {
  tokio::spawn(run_schedule(state.engine.clone(), server_cfg.sweep_interval_secs));

  let app = sharename_api::router(state);
  let address = format!("{}:{}", server_cfg.host, server_cfg.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}

/// One sweep at start-up, then one per interval. An interval of `0` stops
/// after the first.
async fn run_schedule(engine: Engine<SqliteStore>, interval_secs: u64) {
  if interval_secs == 0 {
    sweep_once(&engine).await;
    return;
  }

  // The first tick completes immediately.
  let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
  ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
  loop {
    ticker.tick().await;
    sweep_once(&engine).await;
  }
}

async fn sweep_once(engine: &Engine<SqliteStore>) {
  match engine.run_expiration_sweep().await {
    Ok(report) if report.skipped => tracing::debug!("scheduled sweep skipped, another is running"),
    Ok(_) => {}
    Err(e) => tracing::error!(error = %e, "scheduled expiration sweep failed"),
  }
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
