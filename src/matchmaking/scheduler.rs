//! Match scheduler
//!
//! Owns the rating queue, answers enqueue/dequeue requests, and on a fixed
//! period turns the best eligible pair into a running session.

use crate::error::{DebateError, Result};
use crate::matchmaking::queue::{MatchedPair, QueueConfig, QueueSnapshot, RatingQueue};
use crate::matchmaking::sides::{RandomSideAssigner, SideAssigner};
use crate::session::{Session, SessionContext, SessionDirectory, SessionParticipant, SessionSetup};
use crate::storage::{ParticipantDirectory, TopicSupplier};
use crate::types::{OpponentInfo, ParticipantId, ParticipantProfile, ServerEvent, SessionId};
use anyhow::anyhow;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Scheduler loop settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Period between pairing attempts
    pub match_check_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            match_check_interval: Duration::from_secs(2),
        }
    }
}

/// Result of an enqueue request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// Newly added to the queue
    Queued { queue_size: usize },
    /// Already waiting; the original wait start is kept
    AlreadyQueued { queue_size: usize },
    /// No such participant; nothing changed
    UnknownParticipant,
    /// The participant is in a running session
    AlreadyInSession,
}

/// Result of one scheduler tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// No eligible pair
    Idle,
    /// A session was created and started
    Matched(SessionId),
    /// A pair was drawn but session creation failed; both were released
    Failed {
        participants: [ParticipantId; 2],
        reason: String,
    },
}

/// Statistics about scheduler operations
#[derive(Debug, Clone, Default)]
pub struct SchedulerStats {
    /// Total participants newly queued
    pub participants_enqueued: u64,
    /// Total sessions created from pairs
    pub matches_created: u64,
    /// Total pairs whose session could not be created
    pub match_failures: u64,
}

/// Periodic matcher from queue to sessions
#[derive(Clone)]
pub struct MatchScheduler {
    queue: Arc<Mutex<RatingQueue>>,
    config: SchedulerConfig,
    directory: SessionDirectory,
    context: SessionContext,
    participants: Arc<dyn ParticipantDirectory>,
    topics: Arc<dyn TopicSupplier>,
    sides: Arc<dyn SideAssigner>,
    stats: Arc<RwLock<SchedulerStats>>,
}

impl MatchScheduler {
    /// Create a scheduler with random side assignment
    pub fn new(
        queue_config: QueueConfig,
        config: SchedulerConfig,
        directory: SessionDirectory,
        context: SessionContext,
        participants: Arc<dyn ParticipantDirectory>,
        topics: Arc<dyn TopicSupplier>,
    ) -> Self {
        Self {
            queue: Arc::new(Mutex::new(RatingQueue::new(queue_config))),
            config,
            directory,
            context,
            participants,
            topics,
            sides: Arc::new(RandomSideAssigner),
            stats: Arc::new(RwLock::new(SchedulerStats::default())),
        }
    }

    /// Replace the side assigner
    pub fn with_side_assigner(mut self, sides: Arc<dyn SideAssigner>) -> Self {
        self.sides = sides;
        self
    }

    pub fn directory(&self) -> &SessionDirectory {
        &self.directory
    }

    pub fn session_context(&self) -> &SessionContext {
        &self.context
    }

    pub fn participants(&self) -> Arc<dyn ParticipantDirectory> {
        self.participants.clone()
    }

    pub fn side_assigner(&self) -> Arc<dyn SideAssigner> {
        self.sides.clone()
    }

    fn lock_queue(&self) -> Result<std::sync::MutexGuard<'_, RatingQueue>> {
        self.queue.lock().map_err(|_| {
            DebateError::InternalError {
                message: "Failed to acquire queue lock".to_string(),
            }
            .into()
        })
    }

    fn update_stats(&self, update: impl FnOnce(&mut SchedulerStats)) {
        match self.stats.write() {
            Ok(mut stats) => update(&mut stats),
            Err(_) => warn!("Failed to acquire scheduler stats lock"),
        }
    }

    pub fn stats(&self) -> Result<SchedulerStats> {
        let stats = self.stats.read().map_err(|_| DebateError::InternalError {
            message: "Failed to acquire scheduler stats lock".to_string(),
        })?;
        Ok(stats.clone())
    }

    pub fn queue_len(&self) -> usize {
        self.queue.lock().map(|queue| queue.len()).unwrap_or(0)
    }

    pub fn is_queued(&self, participant_id: &str) -> bool {
        self.queue
            .lock()
            .map(|queue| queue.contains(participant_id))
            .unwrap_or(false)
    }

    pub fn queue_snapshot(&self) -> Result<QueueSnapshot> {
        Ok(self.lock_queue()?.snapshot())
    }

    async fn notify(&self, participant_id: &str, event: ServerEvent) {
        let kind = event.kind();
        if let Err(e) = self.context.transport.send(participant_id, event).await {
            warn!("Failed to deliver {} to '{}': {}", kind, participant_id, e);
        }
    }

    /// Add a participant to the queue using their directory rating
    pub async fn enqueue(&self, participant_id: &str) -> Result<EnqueueOutcome> {
        if participant_id.trim().is_empty() {
            return Err(DebateError::MissingIdentity.into());
        }

        if self.directory.contains_participant(participant_id) {
            return self.refuse_in_session(participant_id).await;
        }

        let Some(profile) = self.participants.get_participant(participant_id).await? else {
            debug!("Ignoring enqueue for unknown participant '{}'", participant_id);
            return Ok(EnqueueOutcome::UnknownParticipant);
        };

        // A tick may have drawn or registered this participant during the lookup
        let inserted = {
            let mut queue = self.lock_queue()?;
            if queue.is_pairing(&profile.id) || self.directory.contains_participant(&profile.id)
            {
                None
            } else {
                let inserted = queue.enqueue(profile.id.clone(), profile.rating, Instant::now());
                Some((inserted, queue.len()))
            }
        };
        let Some((inserted, queue_size)) = inserted else {
            return self.refuse_in_session(participant_id).await;
        };

        let outcome = if inserted {
            self.context.metrics.record_enqueued(queue_size);
            self.update_stats(|stats| stats.participants_enqueued += 1);
            info!(
                "Participant '{}' joined queue with rating {} - queue size: {}",
                profile.id, profile.rating, queue_size
            );
            EnqueueOutcome::Queued { queue_size }
        } else {
            EnqueueOutcome::AlreadyQueued { queue_size }
        };

        self.notify(
            participant_id,
            ServerEvent::QueueJoined {
                message: "Joined matchmaking queue".to_string(),
                queue_size,
            },
        )
        .await;

        Ok(outcome)
    }

    async fn refuse_in_session(&self, participant_id: &str) -> Result<EnqueueOutcome> {
        warn!(
            "Refusing to queue '{}', already in an active session",
            participant_id
        );
        self.notify(
            participant_id,
            ServerEvent::Error {
                message: "You are already in a debate".to_string(),
            },
        )
        .await;
        Ok(EnqueueOutcome::AlreadyInSession)
    }

    /// Whether a participant was drawn into a pair that is still being set up
    pub fn is_pairing(&self, participant_id: &str) -> bool {
        self.queue
            .lock()
            .map(|queue| queue.is_pairing(participant_id))
            .unwrap_or(false)
    }

    /// Remove a participant on request and acknowledge it
    pub async fn dequeue(&self, participant_id: &str) -> Result<bool> {
        let removed = self.remove_from_queue(participant_id)?;
        if removed {
            info!("Participant '{}' left the queue", participant_id);
            self.notify(
                participant_id,
                ServerEvent::QueueLeft {
                    message: "Left matchmaking queue".to_string(),
                },
            )
            .await;
        }
        Ok(removed)
    }

    /// Remove a participant without notifying them
    pub fn remove_from_queue(&self, participant_id: &str) -> Result<bool> {
        let mut queue = self.lock_queue()?;
        let removed = queue.dequeue(participant_id);
        self.context.metrics.set_queue_size(queue.len());
        Ok(removed)
    }

    /// One pairing attempt at `now`
    pub async fn run_once(&self, now: Instant) -> Result<TickOutcome> {
        let pair = {
            let mut queue = self.lock_queue()?;
            let pair = queue.find_best_pair(now);
            if let Some(pair) = &pair {
                queue.hold(pair);
            }
            self.context.metrics.set_queue_size(queue.len());
            pair
        };
        let Some(pair) = pair else {
            return Ok(TickOutcome::Idle);
        };

        info!(
            "Matched '{}' ({}) with '{}' ({}) after {:?}",
            pair.first.id,
            pair.first.rating,
            pair.second.id,
            pair.second.rating,
            pair.longest_wait(now)
        );

        let created = self.create_session(&pair, now).await;
        match self.lock_queue() {
            Ok(mut queue) => queue.release(&pair),
            Err(e) => error!("Failed to release pair hold: {}", e),
        }

        match created {
            Ok(session_id) => Ok(TickOutcome::Matched(session_id)),
            Err(e) => {
                error!(
                    "Failed to create session for '{}' and '{}': {}",
                    pair.first.id, pair.second.id, e
                );
                self.context.metrics.record_match_failed();
                self.update_stats(|stats| stats.match_failures += 1);

                for participant in [&pair.first, &pair.second] {
                    self.notify(
                        &participant.id,
                        ServerEvent::MatchFailed {
                            message: "Failed to create debate session. Please join the queue again."
                                .to_string(),
                        },
                    )
                    .await;
                }

                Ok(TickOutcome::Failed {
                    participants: [pair.first.id.clone(), pair.second.id.clone()],
                    reason: e.to_string(),
                })
            }
        }
    }

    async fn load_profile(&self, participant_id: &str) -> Result<ParticipantProfile> {
        self.participants
            .get_participant(participant_id)
            .await?
            .ok_or_else(|| anyhow!("Participant '{}' no longer exists", participant_id))
    }

    async fn create_session(&self, pair: &MatchedPair, now: Instant) -> Result<SessionId> {
        let profile_a = self.load_profile(&pair.first.id).await?;
        let profile_b = self.load_profile(&pair.second.id).await?;
        let topic = self.topics.get_topic().await;

        // Re-activation may have claimed either participant while we waited
        for id in [&profile_a.id, &profile_b.id] {
            if self.directory.contains_participant(id) {
                return Err(DebateError::ParticipantAlreadyInSession {
                    participant_id: id.clone(),
                }
                .into());
            }
        }

        let session_id = self
            .context
            .store
            .create_record(&profile_a.id, &profile_b.id, &topic)
            .await?;

        let side_a = self.sides.assign();
        let setup = SessionSetup {
            session_id,
            topic: topic.clone(),
            participant_a: SessionParticipant {
                profile: profile_a.clone(),
                side: side_a,
            },
            participant_b: SessionParticipant {
                profile: profile_b.clone(),
                side: side_a.opposite(),
            },
            transcript: Vec::new(),
        };

        let (session, handle) =
            Session::new(setup, self.context.clone(), self.directory.downgrade());
        if let Err(e) = self.directory.register(handle) {
            warn!(
                "Record {} has no session, registration failed: {}",
                session_id, e
            );
            return Err(e);
        }

        self.notify(
            &profile_a.id,
            ServerEvent::MatchFound {
                session_id,
                topic: topic.clone(),
                your_side: side_a,
                opponent: OpponentInfo::from(&profile_b),
            },
        )
        .await;
        self.notify(
            &profile_b.id,
            ServerEvent::MatchFound {
                session_id,
                topic,
                your_side: side_a.opposite(),
                opponent: OpponentInfo::from(&profile_a),
            },
        )
        .await;

        tokio::spawn(session.run());

        self.context
            .metrics
            .record_match_created(pair.longest_wait(now));
        self.update_stats(|stats| stats.matches_created += 1);
        Ok(session_id)
    }

    /// Run the pairing loop until `shutdown` fires
    pub async fn run(&self, shutdown: CancellationToken) {
        let mut ticker = interval(self.config.match_check_interval);
        info!(
            "Match scheduler started - checking every {:?}",
            self.config.match_check_interval
        );

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }

            match self.run_once(Instant::now()).await {
                Ok(TickOutcome::Failed { participants, reason }) => {
                    warn!("Match for {:?} failed: {}", participants, reason);
                }
                Ok(_) => {}
                Err(e) => error!("Error during match tick: {}", e),
            }
        }

        info!("Match scheduler stopped");
    }

    /// Spawn the pairing loop on the runtime
    pub fn spawn(&self, shutdown: CancellationToken) -> JoinHandle<()> {
        let scheduler = self.clone();
        tokio::spawn(async move { scheduler.run(shutdown).await })
    }
}
