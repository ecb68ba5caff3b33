//! Session state machine with validated transitions.
//!
//! `active -> active` (a turn) and `active -> completed` (end of session).
//! `completed` is terminal.

use curaloop_core::session::SessionStatus;

use crate::error::EngineError;

pub fn validate_transition(from: SessionStatus, to: SessionStatus) -> Result<(), EngineError> {
    let valid = matches!(
        (from, to),
        (SessionStatus::Active, SessionStatus::Active)
            | (SessionStatus::Active, SessionStatus::Completed)
    );

    if valid {
        Ok(())
    } else {
        Err(EngineError::InvalidTransition { from, to })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_active_to_active() {
        assert!(validate_transition(SessionStatus::Active, SessionStatus::Active).is_ok());
    }

    #[test]
    fn test_active_to_completed() {
        assert!(validate_transition(SessionStatus::Active, SessionStatus::Completed).is_ok());
    }

    #[test]
    fn test_completed_is_terminal() {
        for to in [SessionStatus::Active, SessionStatus::Completed] {
            let err = validate_transition(SessionStatus::Completed, to).unwrap_err();
            assert!(matches!(
                err,
                EngineError::InvalidTransition {
                    from: SessionStatus::Completed,
                    ..
                }
            ));
        }
    }
}
