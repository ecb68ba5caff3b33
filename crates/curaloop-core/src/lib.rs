//! Curaloop core: domain types, configuration, and the top-level error type
//! shared by every other crate in the workspace.

pub mod config;
pub mod error;
pub mod session;
pub mod types;

pub use config::CuraloopConfig;
pub use error::{CuraloopError, Result};
pub use session::*;
pub use types::*;
