//! Curaloop server binary: composition root.
//!
//! 1. Parse CLI arguments and load configuration from TOML
//! 2. Initialize logging
//! 3. Open the session store (SQLite or in-memory)
//! 4. Build the session engine and start the axum API server

mod cli;

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use curaloop_api::{start_server, AppState};
use curaloop_core::config::CuraloopConfig;
use curaloop_engine::{EngineOptions, SessionEngine};
use curaloop_storage::{MemoryStore, SqliteStore, Store};

use cli::CliArgs;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config is read before logging starts so the file's log level applies.
    let config_file = args.resolve_config_path();
    let loaded = CuraloopConfig::load(&config_file);
    let mut config = loaded.as_ref().cloned().unwrap_or_default();
    if let Some(level) = args.resolve_log_level() {
        config.general.log_level = level;
    }
    if let Some(dir) = args.resolve_data_dir() {
        config.general.data_dir = dir;
    }
    config.server.port = args.resolve_port(config.server.port);
    if args.memory {
        config.storage.backend = "memory".to_string();
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.general.log_level)),
        )
        .init();

    tracing::info!("Starting Curaloop v{}", env!("CARGO_PKG_VERSION"));
    match loaded {
        Ok(_) => tracing::info!(path = %config_file.display(), "Configuration loaded"),
        Err(e) => tracing::warn!(
            path = %config_file.display(),
            error = %e,
            "Using default configuration"
        ),
    }
    config.validate()?;

    let store: Arc<dyn Store> = match config.storage.backend.as_str() {
        "memory" => {
            tracing::info!("Using in-memory session store");
            Arc::new(MemoryStore::new())
        }
        _ => {
            let data_dir = cli::expand_home(&config.general.data_dir);
            let db_path = data_dir.join(&config.storage.db_file);
            let store = SqliteStore::open(&db_path)?;
            tracing::info!(path = %db_path.display(), "SQLite session store opened");
            Arc::new(store)
        }
    };

    let options = EngineOptions::from_config(&config)?;
    let engine = SessionEngine::new(store, options);
    tracing::info!(
        classifier = engine.classifier_name(),
        language_model = engine.language_configured(),
        "Session engine ready"
    );

    start_server(AppState::new(config, engine)).await?;
    Ok(())
}
