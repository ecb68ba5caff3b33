//! Curaloop API crate: axum HTTP transport over the session engine.
//!
//! Exposes chatbot initialization and status, session start/message/end and
//! session history as JSON endpoints, plus a health check.

pub mod error;
pub mod handlers;
pub mod rate_limit;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::{create_router, start_server};
pub use state::AppState;
