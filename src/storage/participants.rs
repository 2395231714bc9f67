//! Participant lookup by identity

use crate::error::{DebateError, Result};
use crate::types::{ParticipantId, ParticipantProfile};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

/// Resolves an identity to its rating and display name
#[async_trait]
pub trait ParticipantDirectory: Send + Sync {
    /// `Ok(None)` when the identity is unknown
    async fn get_participant(&self, participant_id: &str) -> Result<Option<ParticipantProfile>>;
}

/// In-memory participant directory
#[derive(Debug, Default)]
pub struct InMemoryParticipantDirectory {
    profiles: RwLock<HashMap<ParticipantId, ParticipantProfile>>,
}

impl InMemoryParticipantDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a directory pre-populated with profiles
    pub fn with_profiles(profiles: impl IntoIterator<Item = ParticipantProfile>) -> Self {
        let directory = Self::new();
        for profile in profiles {
            // Fresh lock, cannot be poisoned
            let _ = directory.upsert(profile);
        }
        directory
    }

    /// Insert or replace a profile
    pub fn upsert(&self, profile: ParticipantProfile) -> Result<()> {
        let mut profiles = self
            .profiles
            .write()
            .map_err(|_| DebateError::InternalError {
                message: "Failed to acquire participant directory lock".to_string(),
            })?;
        profiles.insert(profile.id.clone(), profile);
        Ok(())
    }

    /// Convenience insert using the identity as the display name
    pub fn add(&self, id: &str, display_name: &str, rating: i64) -> Result<()> {
        self.upsert(ParticipantProfile {
            id: id.to_string(),
            display_name: display_name.to_string(),
            rating,
        })
    }

    pub fn len(&self) -> usize {
        self.profiles.read().map(|p| p.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ParticipantDirectory for InMemoryParticipantDirectory {
    async fn get_participant(&self, participant_id: &str) -> Result<Option<ParticipantProfile>> {
        let profiles = self
            .profiles
            .read()
            .map_err(|_| DebateError::InternalError {
                message: "Failed to acquire participant directory lock".to_string(),
            })?;
        Ok(profiles.get(participant_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lookup() {
        let directory = InMemoryParticipantDirectory::new();
        directory.add("alice", "Alice", 1200).unwrap();

        let profile = directory.get_participant("alice").await.unwrap().unwrap();
        assert_eq!(profile.rating, 1200);
        assert_eq!(profile.display_name, "Alice");
        assert!(directory.get_participant("nobody").await.unwrap().is_none());
    }
}
