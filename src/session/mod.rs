//! Debate sessions: the per-session state machine, its timers, and the
//! directory that routes participants to their session.

pub mod directory;
pub mod instance;
pub mod timer;

pub use directory::{SessionDirectory, WeakDirectory};
pub use instance::{
    validate_content, Session, SessionCommand, SessionConfig, SessionContext, SessionHandle,
    SessionParticipant, SessionSetup, SessionSnapshot, CONNECTING_STATUS, OPPONENT_LEFT_MESSAGE,
    SKIPPED_TURN_MESSAGE, WAITING_FOR_OPPONENT_STATUS,
};
pub use timer::{PhaseTimer, TimerEvent};
