//! Error types for the debate service
//!
//! This module defines all error types using anyhow for consistent error handling
//! throughout the application. Typed variants are recovered by callers with
//! `downcast_ref::<DebateError>()`.

/// Result type alias for convenience
pub type Result<T> = anyhow::Result<T>;

/// Custom error types for specific matchmaking and session scenarios
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DebateError {
    #[error("Message content cannot be empty")]
    EmptyMessage,

    #[error("Message too long ({len} characters, max {max})")]
    MessageTooLong { len: usize, max: usize },

    #[error("Participant identity is required")]
    MissingIdentity,

    #[error("It is not your turn")]
    NotYourTurn,

    #[error("Debate is not in progress")]
    DebateNotInProgress,

    #[error("Participant is not in an active session: {participant_id}")]
    NotInSession { participant_id: String },

    #[error("Participant is already in an active session: {participant_id}")]
    ParticipantAlreadyInSession { participant_id: String },

    #[error("Session is already active: {session_id}")]
    SessionAlreadyActive { session_id: String },

    #[error("Session not found: {session_id}")]
    SessionNotFound { session_id: String },

    #[error("Participant {participant_id} is not part of session {session_id}")]
    NotAParticipant {
        participant_id: String,
        session_id: String,
    },

    #[error("Session has already ended: {session_id}")]
    SessionClosed { session_id: String },

    #[error("Failed to create session record: {reason}")]
    RecordCreationFailed { reason: String },

    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    #[error("Internal service error: {message}")]
    InternalError { message: String },
}

impl DebateError {
    /// Validation errors are rejected before any state is inspected
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            DebateError::EmptyMessage
                | DebateError::MessageTooLong { .. }
                | DebateError::MissingIdentity
        )
    }

    /// State violations are submissions that arrive at the wrong time or from the wrong participant
    pub fn is_state_violation(&self) -> bool {
        matches!(
            self,
            DebateError::NotYourTurn | DebateError::DebateNotInProgress
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(DebateError::EmptyMessage.is_validation());
        assert!(DebateError::MessageTooLong { len: 1001, max: 1000 }.is_validation());
        assert!(!DebateError::NotYourTurn.is_validation());

        assert!(DebateError::NotYourTurn.is_state_violation());
        assert!(DebateError::DebateNotInProgress.is_state_violation());
        assert!(!DebateError::EmptyMessage.is_state_violation());
    }

    #[test]
    fn test_downcast_through_anyhow() {
        let err: anyhow::Error = DebateError::NotInSession {
            participant_id: "alice".to_string(),
        }
        .into();

        assert_eq!(
            err.downcast_ref::<DebateError>(),
            Some(&DebateError::NotInSession {
                participant_id: "alice".to_string()
            })
        );
        assert!(err.to_string().contains("alice"));
    }
}
