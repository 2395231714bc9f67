//! Session record and transcript persistence

use crate::error::{DebateError, Result};
use crate::types::{SessionId, SessionRecord, TranscriptMessage};
use crate::utils::{current_timestamp, generate_session_id};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::RwLock;
use tracing::debug;

/// Persistence for session records
#[async_trait]
pub trait TranscriptStore: Send + Sync {
    /// Create an empty record and return its id, which becomes the session id
    async fn create_record(
        &self,
        participant_a: &str,
        participant_b: &str,
        topic: &str,
    ) -> Result<SessionId>;

    /// Replace the stored transcript with `transcript`
    async fn update_transcript(
        &self,
        session_id: SessionId,
        transcript: &[TranscriptMessage],
    ) -> Result<()>;

    async fn get_record(&self, session_id: SessionId) -> Result<Option<SessionRecord>>;
}

/// In-memory transcript store
#[derive(Debug, Default)]
pub struct InMemoryTranscriptStore {
    records: RwLock<HashMap<SessionId, SessionRecord>>,
    fail_creates: AtomicBool,
    updates: AtomicU64,
}

impl InMemoryTranscriptStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `create_record` fail (for testing)
    pub fn set_fail_creates(&self, fail: bool) {
        self.fail_creates.store(fail, Ordering::SeqCst);
    }

    /// Number of transcript writes performed so far
    pub fn update_count(&self) -> u64 {
        self.updates.load(Ordering::SeqCst)
    }

    pub fn record_count(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    fn lock_error() -> DebateError {
        DebateError::InternalError {
            message: "Failed to acquire transcript store lock".to_string(),
        }
    }
}

#[async_trait]
impl TranscriptStore for InMemoryTranscriptStore {
    async fn create_record(
        &self,
        participant_a: &str,
        participant_b: &str,
        topic: &str,
    ) -> Result<SessionId> {
        if self.fail_creates.load(Ordering::SeqCst) {
            return Err(DebateError::RecordCreationFailed {
                reason: "store rejected the record".to_string(),
            }
            .into());
        }

        let session_id = generate_session_id();
        let record = SessionRecord {
            session_id,
            participant_a: participant_a.to_string(),
            participant_b: participant_b.to_string(),
            topic: topic.to_string(),
            transcript: Vec::new(),
            created_at: current_timestamp(),
        };
        self.records
            .write()
            .map_err(|_| Self::lock_error())?
            .insert(session_id, record);
        debug!("Created session record {}", session_id);
        Ok(session_id)
    }

    async fn update_transcript(
        &self,
        session_id: SessionId,
        transcript: &[TranscriptMessage],
    ) -> Result<()> {
        let mut records = self.records.write().map_err(|_| Self::lock_error())?;
        let record = records
            .get_mut(&session_id)
            .ok_or_else(|| DebateError::SessionNotFound {
                session_id: session_id.to_string(),
            })?;
        record.transcript = transcript.to_vec();
        self.updates.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn get_record(&self, session_id: SessionId) -> Result<Option<SessionRecord>> {
        let records = self.records.read().map_err(|_| Self::lock_error())?;
        Ok(records.get(&session_id).cloned())
    }
}
