//! `orderflow` server binary.
//!
//! Reads `orderflow.toml` (or the path given with `--config`), opens the
//! SQLite store, starts the reducer scheduler and serves the JSON API until
//! Ctrl-C. With `--once` it runs a single reducer pass, prints the report and
//! exits.

use std::{path::PathBuf, sync::Arc};

use anyhow::Context as _;
use axum::Router;
use clap::Parser;
use orderflow_api::AppState;
use orderflow_pipeline::{IntervalTrigger, Scheduler, StatusReducer};
use orderflow_server::{ServerConfig, expand_tilde};
use orderflow_store_sqlite::SqliteStore;
use tokio::{net::TcpListener, sync::watch};
use tower_http::trace::TraceLayer;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Order-status materialization server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "orderflow.toml")]
  config: PathBuf,

  /// Run one reducer pass, print its report and exit.
  #[arg(long)]
  once: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let server_cfg = ServerConfig::load(&cli.config).context("failed to load configuration")?;
  let store_path = expand_tilde(&server_cfg.store_path);

  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;
  let store = Arc::new(store);

  let reducer = Arc::new(StatusReducer::new(
    store.clone(),
    store.clone(),
    server_cfg.reducer_config(),
  ));

  if cli.once {
    let report = reducer.run_pass().await.context("reducer pass failed")?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    return Ok(());
  }

  // Scheduler.
  let (shutdown_tx, shutdown_rx) = watch::channel(false);
  let trigger = IntervalTrigger::new(server_cfg.reduce_interval(), server_cfg.run_on_start);
  let scheduler = tokio::spawn(
    Scheduler::new(reducer.clone(), trigger, server_cfg.scheduler_config()).run(shutdown_rx),
  );
  tracing::info!(
    interval_secs = server_cfg.reduce_interval().as_secs(),
    run_on_start = server_cfg.run_on_start,
    "scheduler started"
  );

  // HTTP.
  let state = AppState {
    store,
    reducer,
    partitions: server_cfg.partition_set(),
    partitioner: server_cfg.partitioner,
  };
  let app = Router::new()
    .nest("/api", orderflow_api::api_router(state))
    .layer(TraceLayer::new_for_http());

  let address = server_cfg.address();
  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app)
    .with_graceful_shutdown(async {
      if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
      }
    })
    .await
    .context("server error")?;

  tracing::info!("shutting down");
  let _ = shutdown_tx.send(true);
  let stats = scheduler.await.context("scheduler task panicked")?;
  tracing::info!(passes = stats.passes, failures = stats.failures, "scheduler finished");

  Ok(())
}
