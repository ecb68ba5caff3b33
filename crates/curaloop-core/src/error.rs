use thiserror::Error;

/// Top-level error type for the Curaloop system.
///
/// Subsystem crates define their own error types and implement
/// `From<CuraloopError>` so that the `?` operator works across crate
/// boundaries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CuraloopError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("Integrity error: {0}")]
    Integrity(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<toml::de::Error> for CuraloopError {
    fn from(err: toml::de::Error) -> Self {
        CuraloopError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for CuraloopError {
    fn from(err: toml::ser::Error) -> Self {
        CuraloopError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for CuraloopError {
    fn from(err: serde_json::Error) -> Self {
        CuraloopError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Curaloop operations.
pub type Result<T> = std::result::Result<T, CuraloopError>;
