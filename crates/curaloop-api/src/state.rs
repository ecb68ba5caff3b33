//! Application state shared across all route handlers.

use std::sync::Arc;
use std::time::Instant;

use curaloop_core::config::CuraloopConfig;
use curaloop_engine::SessionEngine;

/// Shared application state.
///
/// All fields use `Arc` for cheap cloning across handler tasks. The engine
/// does its own per-session locking, so no outer mutex is needed.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration, read-only after startup.
    pub config: Arc<CuraloopConfig>,
    pub engine: Arc<SessionEngine>,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    pub fn new(config: CuraloopConfig, engine: SessionEngine) -> Self {
        Self {
            config: Arc::new(config),
            engine: Arc::new(engine),
            start_time: Instant::now(),
        }
    }
}
