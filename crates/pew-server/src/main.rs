//! pew-server binary.
//!
//! Reads `config.toml` (or the path given with `--config`) layered under
//! `PEW_*` environment variables, opens the SQLite store, and serves the
//! attendance API over HTTP.

use std::{path::PathBuf, sync::Arc};

use anyhow::Context as _;
use clap::Parser;
use pew_api::AppState;
use pew_compreface::CompreFaceClient;
use pew_server::{FsPhotoStore, ServerConfig, config::expand_tilde};
use pew_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Pew attendance server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,
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

  let server_cfg = ServerConfig::load(&cli.config)
    .with_context(|| format!("failed to load configuration from {:?}", cli.config))?;
  server_cfg.validate().context("invalid configuration")?;

  let store_path = expand_tilde(&server_cfg.store_path);
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  let client = CompreFaceClient::new(server_cfg.recognition.clone())
    .context("failed to build recognition client")?;

  let photo_dir = expand_tilde(&server_cfg.photo_dir);
  let photos = FsPhotoStore::new(&photo_dir);

  let state = AppState::new(
    Arc::new(store),
    Arc::new(client),
    Arc::new(photos),
    server_cfg.pipeline_config(),
    server_cfg.thresholds,
  );

  let app = pew_server::router(state);
  let address = server_cfg.address();

  tracing::info!(
    store = ?store_path,
    photos = ?photo_dir,
    recognition = %server_cfg.recognition.base_url,
    "Listening on http://{address}"
  );
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}
