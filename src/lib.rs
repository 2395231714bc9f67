//! Debate Room - matchmaking and session service for one-on-one debates
//!
//! This crate pairs participants of similar rating through a queue whose
//! tolerance widens with waiting time, then drives each pair through a
//! timed session: readiness, preparation, and alternating debate turns.

pub mod config;
pub mod error;
pub mod matchmaking;
pub mod metrics;
pub mod service;
pub mod session;
pub mod storage;
pub mod transport;
pub mod types;
pub mod utils;

// Re-export commonly used types and traits
pub use error::{DebateError, Result};
pub use types::*;

// Re-export key components
pub use matchmaking::{MatchScheduler, RatingQueue};
pub use service::{Collaborators, DebateService};
pub use session::{SessionDirectory, SessionHandle};
pub use transport::ParticipantTransport;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
