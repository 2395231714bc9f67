//! Matchmaking: the rating queue, side assignment, and the scheduler that
//! turns queued pairs into sessions.

pub mod queue;
pub mod scheduler;
pub mod sides;

pub use queue::{MatchedPair, QueueConfig, QueueSnapshot, QueuedParticipant, RatingQueue};
pub use scheduler::{EnqueueOutcome, MatchScheduler, SchedulerConfig, SchedulerStats, TickOutcome};
pub use sides::{FixedSideAssigner, RandomSideAssigner, SideAssigner};
