//! Main application state and service coordination
//!
//! [`DebateService`] wires the queue, scheduler, directory and collaborators
//! together and exposes the entry points a transport layer drives.

use crate::config::AppConfig;
use crate::error::{DebateError, Result};
use crate::matchmaking::{EnqueueOutcome, MatchScheduler, SideAssigner};
use crate::metrics::MetricsCollector;
use crate::session::{SessionContext, SessionDirectory, SessionParticipant, SessionSetup};
use crate::storage::{
    InMemoryParticipantDirectory, InMemoryTranscriptStore, ParticipantDirectory,
    StaticTopicSupplier, TopicSupplier, TranscriptStore,
};
use crate::transport::ParticipantTransport;
use crate::types::{ParticipantProfile, SessionId, SessionRecord, Side};
use anyhow::anyhow;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Service-level errors
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Service initialization error: {message}")]
    Initialization { message: String },

    #[error("Background task error: {message}")]
    BackgroundTask { message: String },
}

/// External collaborators the service depends on
#[derive(Clone)]
pub struct Collaborators {
    pub participants: Arc<dyn ParticipantDirectory>,
    pub topics: Arc<dyn TopicSupplier>,
    pub store: Arc<dyn TranscriptStore>,
    pub transport: Arc<dyn ParticipantTransport>,
}

impl Collaborators {
    /// In-memory directory, default topics and in-memory store around `transport`
    pub fn in_memory(
        participants: Arc<InMemoryParticipantDirectory>,
        transport: Arc<dyn ParticipantTransport>,
    ) -> Self {
        Self {
            participants,
            topics: Arc::new(StaticTopicSupplier::default()),
            store: Arc::new(InMemoryTranscriptStore::new()),
            transport,
        }
    }
}

/// Counts reported by [`DebateService::status`]
#[derive(Debug, Clone, Default, Serialize)]
pub struct ServiceStatus {
    /// Participants currently waiting
    pub queue_size: usize,
    /// Sessions currently registered
    pub active_sessions: usize,
    /// Total participants newly queued
    pub participants_enqueued: u64,
    /// Total sessions created by the scheduler
    pub matches_created: u64,
    /// Total pairs whose session could not be created
    pub match_failures: u64,
}

/// What a disconnect report affected
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DisconnectOutcome {
    /// The participant was removed from the queue
    pub was_queued: bool,
    /// The participant's session was told to end
    pub session_notified: bool,
}

/// Main application state containing all service components
pub struct DebateService {
    /// Application configuration
    config: AppConfig,

    /// Queue and pairing loop
    scheduler: MatchScheduler,

    /// Active sessions by participant
    directory: SessionDirectory,

    /// Metrics collector shared with sessions
    metrics: Arc<MetricsCollector>,

    /// Stops the background tasks
    shutdown: CancellationToken,

    /// Background task handles
    background_tasks: Vec<JoinHandle<()>>,

    /// Service status
    is_running: Arc<RwLock<bool>>,
}

impl DebateService {
    /// Initialize the service with all dependencies
    pub fn new(
        config: AppConfig,
        collaborators: Collaborators,
    ) -> std::result::Result<Self, ServiceError> {
        crate::config::validate_config(&config).map_err(|e| ServiceError::Configuration {
            message: e.to_string(),
        })?;

        let metrics = Arc::new(MetricsCollector::new().map_err(|e| {
            ServiceError::Initialization {
                message: format!("Failed to create metrics collector: {}", e),
            }
        })?);

        Ok(Self::with_metrics(config, collaborators, metrics))
    }

    /// Initialize the service with an existing metrics collector
    pub fn with_metrics(
        config: AppConfig,
        collaborators: Collaborators,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        info!(
            "Initializing {} - readiness handshake: {}, turns: {}",
            config.service.name, config.session.require_readiness, config.session.max_turns
        );

        let directory = SessionDirectory::new();
        let context = SessionContext {
            config: config.session_config(),
            transport: collaborators.transport,
            store: collaborators.store,
            metrics: metrics.clone(),
        };
        let scheduler = MatchScheduler::new(
            config.queue_config(),
            config.scheduler_config(),
            directory.clone(),
            context,
            collaborators.participants,
            collaborators.topics,
        );

        Self {
            config,
            scheduler,
            directory,
            metrics,
            shutdown: CancellationToken::new(),
            background_tasks: Vec::new(),
            is_running: Arc::new(RwLock::new(false)),
        }
    }

    /// Replace the side assigner used for new matches and re-activations
    pub fn with_side_assigner(mut self, sides: Arc<dyn SideAssigner>) -> Self {
        self.scheduler = self.scheduler.with_side_assigner(sides);
        self
    }

    /// Start the match scheduler loop
    pub async fn start(&mut self) -> std::result::Result<(), ServiceError> {
        if *self.is_running.read().await {
            return Err(ServiceError::BackgroundTask {
                message: "Service already started".to_string(),
            });
        }
        info!("Starting {}", self.config.service.name);

        *self.is_running.write().await = true;
        self.background_tasks
            .push(self.scheduler.spawn(self.shutdown.child_token()));

        info!("✅ {} started successfully", self.config.service.name);
        Ok(())
    }

    /// Stop background tasks and report final statistics
    pub async fn shutdown(&mut self) -> std::result::Result<(), ServiceError> {
        info!("Starting graceful shutdown of {}", self.config.service.name);
        *self.is_running.write().await = false;
        self.shutdown.cancel();

        let timeout = self.config.shutdown_timeout();
        for task in self.background_tasks.drain(..) {
            match tokio::time::timeout(timeout, task).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("Background task ended abnormally: {}", e),
                Err(_) => warn!("Background task did not stop within {:?}", timeout),
            }
        }

        let status = self.status().map_err(|e| ServiceError::BackgroundTask {
            message: format!("Failed to get final stats: {}", e),
        })?;
        if status.active_sessions > 0 {
            warn!(
                "Shutting down with {} sessions still running",
                status.active_sessions
            );
        }
        info!("Final service statistics: {:?}", status);
        info!("✅ {} shutdown completed", self.config.service.name);
        Ok(())
    }

    pub async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn metrics(&self) -> Arc<MetricsCollector> {
        self.metrics.clone()
    }

    pub fn scheduler(&self) -> &MatchScheduler {
        &self.scheduler
    }

    pub fn directory(&self) -> &SessionDirectory {
        &self.directory
    }

    /// Add a participant to the matchmaking queue
    pub async fn enqueue(&self, participant_id: &str) -> Result<EnqueueOutcome> {
        self.scheduler.enqueue(participant_id).await
    }

    /// Remove a participant from the matchmaking queue
    pub async fn dequeue(&self, participant_id: &str) -> Result<bool> {
        self.scheduler.dequeue(participant_id).await
    }

    /// Forward a debate submission to the sender's session
    pub async fn route_message(&self, participant_id: &str, content: &str) -> Result<()> {
        self.directory.route_message(participant_id, content).await
    }

    /// Forward a readiness signal to the sender's session
    pub fn submit_readiness_signal(&self, participant_id: &str) -> Result<()> {
        self.directory.route_readiness(participant_id)
    }

    /// The participant's connection is gone: leave the queue and end their session
    pub fn participant_disconnected(&self, participant_id: &str) -> DisconnectOutcome {
        let was_queued = self
            .scheduler
            .remove_from_queue(participant_id)
            .unwrap_or_else(|e| {
                warn!("Failed to remove '{}' from queue: {}", participant_id, e);
                false
            });
        let session_notified = self.directory.route_disconnect(participant_id);

        info!(
            "Participant '{}' disconnected - was queued: {}, session notified: {}",
            participant_id, was_queued, session_notified
        );
        DisconnectOutcome {
            was_queued,
            session_notified,
        }
    }

    /// Start a session for an existing record, resuming its transcript
    pub async fn activate_session(
        &self,
        participant_id: &str,
        session_id: SessionId,
    ) -> Result<SessionId> {
        if participant_id.trim().is_empty() {
            return Err(DebateError::MissingIdentity.into());
        }

        let context = self.scheduler.session_context();
        let record = context
            .store
            .get_record(session_id)
            .await?
            .ok_or_else(|| DebateError::SessionNotFound {
                session_id: session_id.to_string(),
            })?;

        if !record.involves(participant_id) {
            return Err(DebateError::NotAParticipant {
                participant_id: participant_id.to_string(),
                session_id: session_id.to_string(),
            }
            .into());
        }
        if self.directory.get(session_id).is_some() {
            return Err(DebateError::SessionAlreadyActive {
                session_id: session_id.to_string(),
            }
            .into());
        }
        if record.transcript.len() as u32 >= context.config.max_turns {
            return Err(DebateError::SessionClosed {
                session_id: session_id.to_string(),
            }
            .into());
        }

        let profile_a = self.load_profile(&record.participant_a).await?;
        let profile_b = self.load_profile(&record.participant_b).await?;
        let side_a = self.resumed_side(&record);

        for id in [&record.participant_a, &record.participant_b] {
            if self.scheduler.is_pairing(id) {
                return Err(DebateError::ParticipantAlreadyInSession {
                    participant_id: id.clone(),
                }
                .into());
            }
        }

        for id in [&record.participant_a, &record.participant_b] {
            self.scheduler.remove_from_queue(id)?;
        }

        let setup = SessionSetup {
            session_id,
            topic: record.topic.clone(),
            participant_a: SessionParticipant {
                profile: profile_a,
                side: side_a,
            },
            participant_b: SessionParticipant {
                profile: profile_b,
                side: side_a.opposite(),
            },
            transcript: record.transcript,
        };
        self.directory.start_session(setup, context.clone())?;

        info!(
            "Session {} re-activated by '{}'",
            session_id, participant_id
        );
        Ok(session_id)
    }

    async fn load_profile(&self, participant_id: &str) -> Result<ParticipantProfile> {
        self.scheduler
            .participants()
            .get_participant(participant_id)
            .await?
            .ok_or_else(|| anyhow!("Participant '{}' no longer exists", participant_id))
    }

    /// Keep the sides from an earlier run, or flip a coin for a fresh record
    fn resumed_side(&self, record: &SessionRecord) -> Side {
        record
            .transcript
            .iter()
            .find_map(|message| {
                if message.sender == record.participant_a {
                    Some(message.side)
                } else if message.sender == record.participant_b {
                    Some(message.side.opposite())
                } else {
                    None
                }
            })
            .unwrap_or_else(|| self.scheduler.side_assigner().assign())
    }

    /// Queue and session counts
    pub fn status(&self) -> Result<ServiceStatus> {
        let stats = self.scheduler.stats()?;
        Ok(ServiceStatus {
            queue_size: self.scheduler.queue_len(),
            active_sessions: self.directory.active_count(),
            participants_enqueued: stats.participants_enqueued,
            matches_created: stats.matches_created,
            match_failures: stats.match_failures,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::RecordingTransport;

    fn service() -> (DebateService, Arc<RecordingTransport>) {
        let participants = Arc::new(InMemoryParticipantDirectory::new());
        participants.add("alice", "Alice", 1200).unwrap();
        let transport = Arc::new(RecordingTransport::new());
        let service = DebateService::new(
            AppConfig::default(),
            Collaborators::in_memory(participants, transport.clone()),
        )
        .unwrap();
        (service, transport)
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let mut config = AppConfig::default();
        config.session.max_turns = 0;
        let participants = Arc::new(InMemoryParticipantDirectory::new());
        let result = DebateService::new(
            config,
            Collaborators::in_memory(participants, Arc::new(RecordingTransport::new())),
        );
        assert!(matches!(result, Err(ServiceError::Configuration { .. })));
    }

    #[tokio::test]
    async fn test_status_counts() {
        let (service, _transport) = service();
        service.enqueue("alice").await.unwrap();

        let status = service.status().unwrap();
        assert_eq!(status.queue_size, 1);
        assert_eq!(status.active_sessions, 0);
        assert_eq!(status.participants_enqueued, 1);
    }

    #[tokio::test]
    async fn test_disconnect_while_queued() {
        let (service, transport) = service();
        service.enqueue("alice").await.unwrap();

        let outcome = service.participant_disconnected("alice");
        assert!(outcome.was_queued);
        assert!(!outcome.session_notified);
        assert_eq!(service.status().unwrap().queue_size, 0);
        // No acknowledgement is sent to a participant who is gone
        assert_eq!(transport.count_of("alice", "queue_left"), 0);
    }

    #[tokio::test]
    async fn test_start_and_shutdown() {
        let (mut service, _transport) = service();
        service.start().await.unwrap();
        assert!(service.is_running().await);
        assert!(service.start().await.is_err());

        service.shutdown().await.unwrap();
        assert!(!service.is_running().await);
    }
}
