//! Error types for the session engine.

use curaloop_core::error::CuraloopError;
use curaloop_core::session::SessionStatus;
use uuid::Uuid;

/// Coarse error class used by transports to pick a status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad request input, rejected before any state change.
    Validation,
    NotFound,
    /// Operation not allowed in the session's current state.
    State,
    /// A collaborator (storage) failed with no local fallback.
    Dependency,
    Integrity,
}

impl ErrorKind {
    /// Only dependency failures are worth retrying unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::Dependency)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation_error",
            ErrorKind::NotFound => "not_found",
            ErrorKind::State => "state_error",
            ErrorKind::Dependency => "dependency_error",
            ErrorKind::Integrity => "integrity_error",
        }
    }
}

/// Errors from the session engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("invalid treatment plan: {0}")]
    InvalidPlan(String),
    #[error("invalid chatbot config: {0}")]
    InvalidConfig(String),
    #[error("unknown chat type: {0}")]
    UnknownChatType(String),
    #[error("no activities available for chat type {0}")]
    EmptyCatalog(String),
    #[error("message cannot be empty")]
    EmptyMessage,
    #[error("message exceeds maximum length of {0} characters")]
    MessageTooLong(usize),
    #[error("chatbot not initialized for patient: {0}")]
    ChatbotNotFound(String),
    #[error("no plan available for patient: {0}")]
    PatientNotFound(String),
    #[error("session not found: {0}")]
    SessionNotFound(Uuid),
    #[error("session is closed: {0}")]
    SessionClosed(Uuid),
    #[error("session already ended: {0}")]
    SessionAlreadyEnded(Uuid),
    #[error("invalid session transition: {from} -> {to}")]
    InvalidTransition {
        from: SessionStatus,
        to: SessionStatus,
    },
    #[error("session id collision: {0}")]
    SessionIdCollision(Uuid),
    #[error("integrity violation: {0}")]
    Integrity(String),
    #[error("storage error: {0}")]
    Storage(String),
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::InvalidPlan(_)
            | EngineError::InvalidConfig(_)
            | EngineError::UnknownChatType(_)
            | EngineError::EmptyCatalog(_)
            | EngineError::EmptyMessage
            | EngineError::MessageTooLong(_) => ErrorKind::Validation,
            EngineError::ChatbotNotFound(_)
            | EngineError::PatientNotFound(_)
            | EngineError::SessionNotFound(_) => ErrorKind::NotFound,
            EngineError::SessionClosed(_)
            | EngineError::SessionAlreadyEnded(_)
            | EngineError::InvalidTransition { .. } => ErrorKind::State,
            EngineError::SessionIdCollision(_) | EngineError::Integrity(_) => ErrorKind::Integrity,
            EngineError::Storage(_) => ErrorKind::Dependency,
        }
    }
}

impl From<CuraloopError> for EngineError {
    fn from(err: CuraloopError) -> Self {
        match err {
            CuraloopError::Integrity(msg) => EngineError::Integrity(msg),
            other => EngineError::Storage(other.to_string()),
        }
    }
}

/// A specialized `Result` type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_error_display() {
        let id = Uuid::nil();
        let cases: Vec<(EngineError, String)> = vec![
            (
                EngineError::InvalidPlan("no categories".to_string()),
                "invalid treatment plan: no categories".to_string(),
            ),
            (
                EngineError::InvalidConfig("bad tier".to_string()),
                "invalid chatbot config: bad tier".to_string(),
            ),
            (
                EngineError::UnknownChatType("karaoke".to_string()),
                "unknown chat type: karaoke".to_string(),
            ),
            (EngineError::EmptyMessage, "message cannot be empty".to_string()),
            (
                EngineError::MessageTooLong(2000),
                "message exceeds maximum length of 2000 characters".to_string(),
            ),
            (
                EngineError::SessionClosed(id),
                format!("session is closed: {}", id),
            ),
            (
                EngineError::InvalidTransition {
                    from: SessionStatus::Completed,
                    to: SessionStatus::Active,
                },
                "invalid session transition: completed -> active".to_string(),
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(error.to_string(), expected);
        }
    }

    #[test]
    fn test_error_kinds() {
        let id = Uuid::new_v4();
        assert_eq!(
            EngineError::UnknownChatType("x".into()).kind(),
            ErrorKind::Validation
        );
        assert_eq!(EngineError::SessionNotFound(id).kind(), ErrorKind::NotFound);
        assert_eq!(
            EngineError::ChatbotNotFound("p1".into()).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            EngineError::PatientNotFound("p9".into()).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(EngineError::SessionClosed(id).kind(), ErrorKind::State);
        assert_eq!(EngineError::SessionAlreadyEnded(id).kind(), ErrorKind::State);
        assert_eq!(
            EngineError::SessionIdCollision(id).kind(),
            ErrorKind::Integrity
        );
        assert_eq!(
            EngineError::Storage("down".into()).kind(),
            ErrorKind::Dependency
        );
    }

    #[test]
    fn test_only_dependency_is_retryable() {
        assert!(ErrorKind::Dependency.is_retryable());
        for kind in [
            ErrorKind::Validation,
            ErrorKind::NotFound,
            ErrorKind::State,
            ErrorKind::Integrity,
        ] {
            assert!(!kind.is_retryable());
        }
    }

    #[test]
    fn test_from_curaloop_error() {
        let err: EngineError = CuraloopError::Storage("locked".to_string()).into();
        assert!(matches!(err, EngineError::Storage(_)));
        assert!(err.to_string().contains("locked"));

        let err: EngineError = CuraloopError::Integrity("row is completed".to_string()).into();
        assert_eq!(err.kind(), ErrorKind::Integrity);
    }
}
