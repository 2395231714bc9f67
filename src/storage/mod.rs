//! Collaborator interfaces for participant lookup, topics, and persistence
//!
//! Each trait ships with an in-memory implementation used by the service
//! binary and the tests.

pub mod participants;
pub mod topics;
pub mod transcripts;

pub use participants::{InMemoryParticipantDirectory, ParticipantDirectory};
pub use topics::{StaticTopicSupplier, TopicSupplier, DEFAULT_TOPICS, FALLBACK_TOPIC};
pub use transcripts::{InMemoryTranscriptStore, TranscriptStore};
