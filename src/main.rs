//! Simple Bank - ledger backend
//!
//! This is the main entry point:
//!
//! ```text
//! ┌──────────┐    ┌──────────┐    ┌──────────┐    ┌──────────┐
//! │  Config  │───▶│ Backend  │───▶│ Transfer │───▶│ Gateway  │
//! │  (YAML)  │    │(PG / mem)│    │  Engine  │    │  (HTTP)  │
//! └──────────┘    └──────────┘    └──────────┘    └──────────┘
//! ```
//!
//! Usage:
//!   simple_bank [--env dev] [--port 8080]

use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;

use simple_bank::config::{AppConfig, BackendKind};
use simple_bank::db::Database;
use simple_bank::gateway::{self, state::AppState};
use simple_bank::ledger::{LedgerBackend, MemoryBackend, PgBackend, Store, TransferEngine};

fn get_env() -> String {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if (args[i] == "--env" || args[i] == "-e") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }
    "dev".to_string()
}

/// Get port override from command line (--port argument)
fn get_port_override() -> Option<u16> {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if args[i] == "--port" && i + 1 < args.len() {
            return args[i + 1].parse().ok();
        }
    }
    None
}

async fn open_backend(config: &AppConfig) -> anyhow::Result<Arc<dyn LedgerBackend>> {
    match config.database.backend {
        BackendKind::Postgres => {
            let db = Database::connect(
                &config.database.url,
                config.database.max_connections,
                config.database.acquire_timeout(),
            )
            .await
            .context("Failed to connect to PostgreSQL")?;
            db.migrate().await.context("Failed to apply ledger schema")?;
            Ok(Arc::new(PgBackend::new(db.pool().clone())))
        }
        BackendKind::Memory => {
            tracing::warn!("Using in-memory ledger backend, data is lost on exit");
            Ok(Arc::new(MemoryBackend::new()))
        }
    }
}

fn main() -> anyhow::Result<()> {
    let env = get_env();
    let mut app_config = AppConfig::load(&env)?;
    if let Some(port) = get_port_override() {
        app_config.gateway.port = port;
    }
    let _log_guard = simple_bank::logging::init_logging(&app_config);

    tracing::info!(
        env = %env,
        git_hash = env!("GIT_HASH"),
        backend = ?app_config.database.backend,
        overdraft = ?app_config.ledger.overdraft,
        "Starting Simple Bank"
    );

    let rt = tokio::runtime::Runtime::new().context("Failed to build tokio runtime")?;
    rt.block_on(async move {
        let backend = open_backend(&app_config).await?;
        let engine = TransferEngine::new(Store::new(backend), app_config.ledger.overdraft);
        let state = Arc::new(AppState::new(engine, app_config.ledger.tx_timeout()));

        let shutdown = CancellationToken::new();
        let signal = shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for ctrl-c");
            }
            tracing::info!("Shutdown requested");
            signal.cancel();
        });

        gateway::run_server(
            &app_config.gateway.host,
            app_config.gateway.port,
            state,
            shutdown,
        )
        .await
    })
}
