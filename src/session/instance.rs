//! Debate session state machine
//!
//! Each session is driven by exactly one task that owns all of its state.
//! Participant submissions, readiness signals and disconnect reports arrive as
//! [`SessionCommand`]s through a [`SessionHandle`]; timer ticks arrive on a
//! separate channel fed by the session's [`PhaseTimer`]. Because only the
//! driver task mutates the session, no lock guards session state.

use crate::error::{DebateError, Result};
use crate::metrics::{EndReason, MetricsCollector, TurnOutcome};
use crate::session::directory::WeakDirectory;
use crate::session::timer::{PhaseTimer, TimerEvent};
use crate::storage::TranscriptStore;
use crate::transport::{DeliveryError, ParticipantTransport};
use crate::types::{
    turn_number, ParticipantId, ParticipantProfile, ServerEvent, SessionId, SessionPhase, Side,
    TranscriptMessage,
};
use crate::utils::{current_timestamp, format_countdown};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Transcript entry recorded when a turn timer expires
pub const SKIPPED_TURN_MESSAGE: &str = "[Time expired - no argument submitted]";

/// Notification sent to the remaining participant on early termination
pub const OPPONENT_LEFT_MESSAGE: &str = "Your opponent has left the debate.";

pub const WAITING_FOR_OPPONENT_STATUS: &str = "Waiting for opponent...";
pub const CONNECTING_STATUS: &str = "Connecting... Please signal when ready";

/// Configuration for session timing and limits
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Whether sessions begin in the readiness handshake
    pub require_readiness: bool,
    /// A readiness signal counts while younger than this
    pub readiness_window: Duration,
    /// Period of the readiness check
    pub readiness_check_interval: Duration,
    /// Preparation countdown length, in ticks
    pub preparation_seconds: u64,
    /// Turn countdown length, in ticks
    pub turn_seconds: u64,
    /// Length of one countdown tick
    pub tick_interval: Duration,
    /// Total turns across both sides
    pub max_turns: u32,
    /// Maximum message length in characters
    pub max_message_length: usize,
    /// Transient failures in a row that count as unreachable
    pub max_consecutive_send_failures: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            require_readiness: false,
            readiness_window: Duration::from_secs(10),
            readiness_check_interval: Duration::from_secs(2),
            preparation_seconds: 180, // 3 minutes
            turn_seconds: 120,        // 2 minutes
            tick_interval: Duration::from_secs(1),
            max_turns: 6, // 3 per side
            max_message_length: 1000,
            max_consecutive_send_failures: 3,
        }
    }
}

impl SessionConfig {
    pub fn validate(&self) -> Result<()> {
        let invalid = |message: &str| -> Result<()> {
            Err(DebateError::ConfigurationError {
                message: message.to_string(),
            }
            .into())
        };

        if self.max_turns == 0 {
            return invalid("Max turns must be greater than 0");
        }
        if self.turn_seconds == 0 {
            return invalid("Turn length must be greater than 0");
        }
        if self.max_message_length == 0 {
            return invalid("Max message length must be greater than 0");
        }
        if self.max_consecutive_send_failures == 0 {
            return invalid("Max consecutive send failures must be greater than 0");
        }
        if self.tick_interval.is_zero() {
            return invalid("Tick interval must be greater than 0");
        }
        if self.require_readiness
            && (self.readiness_window.is_zero() || self.readiness_check_interval.is_zero())
        {
            return invalid("Readiness window and check interval must be greater than 0");
        }
        Ok(())
    }
}

/// Trim and length-check a submission
pub fn validate_content(content: &str, max_length: usize) -> std::result::Result<String, DebateError> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(DebateError::EmptyMessage);
    }
    let len = trimmed.chars().count();
    if len > max_length {
        return Err(DebateError::MessageTooLong {
            len,
            max: max_length,
        });
    }
    Ok(trimmed.to_string())
}

/// A participant together with the side they hold
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionParticipant {
    pub profile: ParticipantProfile,
    pub side: Side,
}

/// Everything needed to start a session
#[derive(Debug, Clone)]
pub struct SessionSetup {
    pub session_id: SessionId,
    pub topic: String,
    pub participant_a: SessionParticipant,
    pub participant_b: SessionParticipant,
    /// Persisted transcript to resume from; empty for a new match
    pub transcript: Vec<TranscriptMessage>,
}

/// Shared collaborators a session talks to
#[derive(Clone)]
pub struct SessionContext {
    pub config: SessionConfig,
    pub transport: Arc<dyn ParticipantTransport>,
    pub store: Arc<dyn TranscriptStore>,
    pub metrics: Arc<MetricsCollector>,
}

/// Point-in-time view of a session
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub session_id: SessionId,
    pub topic: String,
    pub phase: SessionPhase,
    pub turn_index: u32,
    pub max_turns: u32,
    pub turn_owner: Option<ParticipantId>,
    pub participants: [SessionParticipant; 2],
    pub transcript: Vec<TranscriptMessage>,
}

/// Inbound work for a session driver
#[derive(Debug)]
pub enum SessionCommand {
    Submit {
        participant_id: ParticipantId,
        content: String,
        reply: oneshot::Sender<std::result::Result<(), DebateError>>,
    },
    Ready {
        participant_id: ParticipantId,
        at: Instant,
    },
    Disconnect {
        participant_id: ParticipantId,
    },
    Snapshot {
        reply: oneshot::Sender<SessionSnapshot>,
    },
}

/// Cloneable handle used to reach a running session
#[derive(Debug, Clone)]
pub struct SessionHandle {
    session_id: SessionId,
    participants: [ParticipantId; 2],
    max_message_length: usize,
    commands: mpsc::UnboundedSender<SessionCommand>,
}

impl SessionHandle {
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn participants(&self) -> &[ParticipantId; 2] {
        &self.participants
    }

    pub fn involves(&self, participant_id: &str) -> bool {
        self.participants.iter().any(|p| p == participant_id)
    }

    /// The other participant of the session
    pub fn opponent_of(&self, participant_id: &str) -> Option<&ParticipantId> {
        match &self.participants {
            [a, b] if a == participant_id => Some(b),
            [a, b] if b == participant_id => Some(a),
            _ => None,
        }
    }

    /// Whether the driver task has finished
    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }

    /// Submit an argument for the current turn
    pub async fn submit_message(&self, participant_id: &str, content: &str) -> Result<()> {
        let content = validate_content(content, self.max_message_length)?;
        let (reply, response) = oneshot::channel();
        self.send(SessionCommand::Submit {
            participant_id: participant_id.to_string(),
            content,
            reply,
        })?;
        response.await.map_err(|_| self.closed())??;
        Ok(())
    }

    /// Record a readiness signal at the current instant
    pub fn signal_ready(&self, participant_id: &str) -> Result<()> {
        self.send(SessionCommand::Ready {
            participant_id: participant_id.to_string(),
            at: Instant::now(),
        })
    }

    /// Report that a participant's connection is gone
    pub fn report_disconnect(&self, participant_id: &str) -> Result<()> {
        self.send(SessionCommand::Disconnect {
            participant_id: participant_id.to_string(),
        })
    }

    pub async fn snapshot(&self) -> Result<SessionSnapshot> {
        let (reply, response) = oneshot::channel();
        self.send(SessionCommand::Snapshot { reply })?;
        Ok(response.await.map_err(|_| self.closed())?)
    }

    fn send(&self, command: SessionCommand) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| self.closed().into())
    }

    fn closed(&self) -> DebateError {
        DebateError::SessionClosed {
            session_id: self.session_id.to_string(),
        }
    }
}

enum Next {
    Command(SessionCommand),
    Timer(TimerEvent),
}

/// Session state, owned by its driver task
pub struct Session {
    session_id: SessionId,
    topic: String,
    participants: [SessionParticipant; 2],
    phase: SessionPhase,
    turn_index: u32,
    transcript: Vec<TranscriptMessage>,
    readiness: [Option<Instant>; 2],
    consecutive_failures: [u32; 2],
    /// Participant found unreachable while handling the current step
    lost: Option<usize>,
    timer: PhaseTimer,
    timer_events: mpsc::UnboundedReceiver<TimerEvent>,
    commands: mpsc::UnboundedReceiver<SessionCommand>,
    context: SessionContext,
    directory: WeakDirectory,
}

impl Session {
    /// Build a session and the handle that reaches it. The session does
    /// nothing until [`Session::run`] is spawned.
    pub fn new(
        setup: SessionSetup,
        context: SessionContext,
        directory: WeakDirectory,
    ) -> (Self, SessionHandle) {
        let (command_tx, commands) = mpsc::unbounded_channel();
        let (timer_tx, timer_events) = mpsc::unbounded_channel();

        let handle = SessionHandle {
            session_id: setup.session_id,
            participants: [
                setup.participant_a.profile.id.clone(),
                setup.participant_b.profile.id.clone(),
            ],
            max_message_length: context.config.max_message_length,
            commands: command_tx,
        };

        let session = Self {
            session_id: setup.session_id,
            topic: setup.topic,
            participants: [setup.participant_a, setup.participant_b],
            phase: SessionPhase::AwaitingReadiness,
            turn_index: setup.transcript.len() as u32,
            transcript: setup.transcript,
            readiness: [None, None],
            consecutive_failures: [0, 0],
            lost: None,
            timer: PhaseTimer::new(context.config.tick_interval, timer_tx),
            timer_events,
            commands,
            context,
            directory,
        };

        (session, handle)
    }

    /// Drive the session until it reaches `Ended`
    pub async fn run(mut self) {
        info!(
            "Session {} starting - '{}' ({}) vs '{}' ({}), topic: '{}'",
            self.session_id,
            self.participants[0].profile.id,
            self.participants[0].side,
            self.participants[1].profile.id,
            self.participants[1].side,
            self.topic
        );
        self.context.metrics.record_session_started();

        self.start().await;
        self.terminate_if_lost().await;

        while !self.phase.is_terminal() {
            let next = tokio::select! {
                biased;
                Some(command) = self.commands.recv() => Next::Command(command),
                Some(event) = self.timer_events.recv() => Next::Timer(event),
                else => break,
            };

            match next {
                Next::Command(command) => self.handle_command(command).await,
                Next::Timer(event) => self.handle_timer(event).await,
            }
            self.terminate_if_lost().await;
        }

        if !self.phase.is_terminal() {
            warn!("Session {} lost all inputs, abandoning", self.session_id);
            self.timer.cancel();
            self.phase = SessionPhase::Ended;
            self.persist().await;
            self.finish(EndReason::Abandoned);
        }
    }

    async fn start(&mut self) {
        if self.context.config.require_readiness {
            self.phase = SessionPhase::AwaitingReadiness;
            for idx in 0..2 {
                let event = ServerEvent::SessionInitialized {
                    session_id: self.session_id,
                    topic: self.topic.clone(),
                    preparation_seconds: self.context.config.preparation_seconds,
                    your_side: self.participants[idx].side,
                    opponent_side: self.participants[1 - idx].side,
                    status: "Waiting for both participants to signal readiness".to_string(),
                };
                self.send_to(idx, event).await;
            }
            if self.lost.is_none() {
                self.timer
                    .start_periodic(self.context.config.readiness_check_interval);
            }
        } else {
            self.enter_preparation().await;
        }
    }

    async fn handle_command(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::Submit {
                participant_id,
                content,
                reply,
            } => match self.accept_submission(&participant_id) {
                Ok(idx) => {
                    let _ = reply.send(Ok(()));
                    self.complete_turn(idx, content, TurnOutcome::Submitted)
                        .await;
                }
                Err(e) => {
                    warn!(
                        "Rejected submission from '{}' in session {}: {}",
                        participant_id, self.session_id, e
                    );
                    let _ = reply.send(Err(e));
                }
            },
            SessionCommand::Ready { participant_id, at } => {
                self.handle_ready(&participant_id, at).await;
            }
            SessionCommand::Disconnect { participant_id } => match self.index_of(&participant_id) {
                Some(idx) => {
                    info!(
                        "Participant '{}' disconnected from session {}",
                        participant_id, self.session_id
                    );
                    self.lost = Some(idx);
                }
                None => warn!(
                    "Ignoring disconnect for '{}', not part of session {}",
                    participant_id, self.session_id
                ),
            },
            SessionCommand::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }
        }
    }

    async fn handle_timer(&mut self, event: TimerEvent) {
        if !self.timer.is_current(&event) {
            debug!("Session {} dropping stale timer event {:?}", self.session_id, event);
            return;
        }

        match (self.phase, event) {
            (SessionPhase::AwaitingReadiness, TimerEvent::Poll { .. }) => {
                self.check_readiness().await;
            }
            (SessionPhase::Preparation, TimerEvent::Countdown { remaining, .. }) => {
                self.broadcast(ServerEvent::PrepTimer {
                    remaining_seconds: remaining,
                    display: format_countdown(remaining),
                })
                .await;
                if remaining == 0 && self.lost.is_none() {
                    self.enter_debate().await;
                }
            }
            (SessionPhase::Debate, TimerEvent::Countdown { remaining, .. }) => {
                let owner = self.owner_index();
                self.broadcast(ServerEvent::TurnTimer {
                    remaining_seconds: remaining,
                    display: format_countdown(remaining),
                    current_turn_participant: self.participants[owner].profile.id.clone(),
                    current_turn_side: self.participants[owner].side,
                })
                .await;
                if remaining == 0 && self.lost.is_none() {
                    info!(
                        "Turn {} timed out for '{}' in session {}",
                        self.turn_index, self.participants[owner].profile.id, self.session_id
                    );
                    self.complete_turn(owner, SKIPPED_TURN_MESSAGE.to_string(), TurnOutcome::Skipped)
                        .await;
                }
            }
            (phase, event) => {
                debug!(
                    "Session {} ignoring timer event {:?} in phase {}",
                    self.session_id, event, phase
                );
            }
        }
    }

    async fn handle_ready(&mut self, participant_id: &str, at: Instant) {
        let Some(idx) = self.index_of(participant_id) else {
            warn!(
                "Ignoring readiness signal from '{}', not part of session {}",
                participant_id, self.session_id
            );
            return;
        };
        if self.phase != SessionPhase::AwaitingReadiness {
            debug!(
                "Ignoring readiness signal from '{}' in phase {}",
                participant_id, self.phase
            );
            return;
        }

        self.readiness[idx] = Some(at);
        self.check_readiness().await;
    }

    fn is_fresh(&self, idx: usize, now: Instant) -> bool {
        self.readiness[idx]
            .map(|at| now.saturating_duration_since(at) < self.context.config.readiness_window)
            .unwrap_or(false)
    }

    async fn check_readiness(&mut self) {
        let now = Instant::now();
        match (self.is_fresh(0, now), self.is_fresh(1, now)) {
            (true, true) => {
                info!("Both participants ready in session {}", self.session_id);
                self.timer.cancel();
                self.enter_preparation().await;
            }
            (true, false) => self.send_connection_status(0).await,
            (false, true) => self.send_connection_status(1).await,
            (false, false) => {}
        }
    }

    async fn send_connection_status(&mut self, ready: usize) {
        self.send_to(
            ready,
            ServerEvent::ConnectionStatus {
                status: WAITING_FOR_OPPONENT_STATUS.to_string(),
            },
        )
        .await;
        self.send_to(
            1 - ready,
            ServerEvent::ConnectionStatus {
                status: CONNECTING_STATUS.to_string(),
            },
        )
        .await;
    }

    async fn enter_preparation(&mut self) {
        self.phase = SessionPhase::Preparation;
        info!("Session {} entering preparation", self.session_id);

        for idx in 0..2 {
            let event = ServerEvent::SessionStarted {
                session_id: self.session_id,
                topic: self.topic.clone(),
                preparation_seconds: self.context.config.preparation_seconds,
                your_side: self.participants[idx].side,
                opponent_side: self.participants[1 - idx].side,
                status: "Preparation phase started".to_string(),
            };
            self.send_to(idx, event).await;
        }
        self.broadcast(ServerEvent::PrepTimerStarted {
            duration_seconds: self.context.config.preparation_seconds,
        })
        .await;

        if self.lost.is_none() {
            self.timer
                .start_countdown(self.context.config.preparation_seconds);
        }
    }

    async fn enter_debate(&mut self) {
        self.timer.cancel();
        self.phase = SessionPhase::Debate;
        info!(
            "Session {} entering debate at turn {}",
            self.session_id, self.turn_index
        );

        self.broadcast(ServerEvent::DebatePhaseStarted {
            message: "The debate has begun".to_string(),
        })
        .await;

        if self.turn_index >= self.context.config.max_turns {
            self.end().await;
        } else if self.lost.is_none() {
            self.start_turn().await;
        }
    }

    async fn start_turn(&mut self) {
        let owner = self.owner_index();
        let other = 1 - owner;
        let turn_number = turn_number(self.turn_index);
        let time_limit_seconds = self.context.config.turn_seconds;

        debug!(
            "Session {} turn {} belongs to '{}'",
            self.session_id, self.turn_index, self.participants[owner].profile.id
        );

        self.send_to(
            owner,
            ServerEvent::YourTurn {
                turn_number,
                time_limit_seconds,
                your_side: self.participants[owner].side,
            },
        )
        .await;
        self.send_to(
            other,
            ServerEvent::OpponentTurn {
                turn_number,
                time_limit_seconds,
                opponent_side: self.participants[owner].side,
                your_side: self.participants[other].side,
            },
        )
        .await;

        if self.lost.is_none() {
            self.timer.start_countdown(time_limit_seconds);
        }
    }

    fn accept_submission(&self, participant_id: &str) -> std::result::Result<usize, DebateError> {
        if self.phase != SessionPhase::Debate {
            return Err(DebateError::DebateNotInProgress);
        }
        match self.index_of(participant_id) {
            Some(idx) if idx == self.owner_index() => Ok(idx),
            Some(_) => Err(DebateError::NotYourTurn),
            None => Err(DebateError::NotAParticipant {
                participant_id: participant_id.to_string(),
                session_id: self.session_id.to_string(),
            }),
        }
    }

    /// Close the current turn with `content` from participant `idx`
    async fn complete_turn(&mut self, idx: usize, content: String, outcome: TurnOutcome) {
        // Cancel first so no tick for this turn is broadcast after the message
        self.timer.cancel();

        let participant = &self.participants[idx];
        let message = TranscriptMessage {
            sender: participant.profile.id.clone(),
            sender_display_name: participant.profile.display_name.clone(),
            content,
            timestamp: current_timestamp(),
            turn_index: self.turn_index,
            side: participant.side,
        };
        self.transcript.push(message.clone());
        self.context.metrics.record_turn_completed(outcome);

        self.broadcast(ServerEvent::Message(message)).await;
        if self.lost.is_some() {
            return;
        }
        self.persist().await;
        self.turn_index += 1;

        if self.turn_index >= self.context.config.max_turns {
            self.end().await;
        } else {
            self.start_turn().await;
        }
    }

    async fn end(&mut self) {
        self.timer.cancel();
        self.phase = SessionPhase::Ended;
        info!(
            "Session {} completed after {} turns",
            self.session_id, self.turn_index
        );

        self.broadcast(ServerEvent::SessionEnded {
            session_id: self.session_id,
            topic: self.topic.clone(),
            transcript: self.transcript.clone(),
        })
        .await;
        self.persist().await;
        self.finish(EndReason::Completed);
    }

    async fn terminate_if_lost(&mut self) {
        let Some(lost) = self.lost.take() else {
            return;
        };
        if self.phase.is_terminal() {
            return;
        }

        self.timer.cancel();
        self.phase = SessionPhase::Ended;
        let survivor = 1 - lost;
        info!(
            "Session {} ended early, '{}' left",
            self.session_id, self.participants[lost].profile.id
        );

        let survivor_id = self.participants[survivor].profile.id.clone();
        if let Err(e) = self
            .context
            .transport
            .send(
                &survivor_id,
                ServerEvent::OpponentLeft {
                    message: OPPONENT_LEFT_MESSAGE.to_string(),
                },
            )
            .await
        {
            warn!(
                "Could not notify '{}' about opponent departure: {}",
                survivor_id, e
            );
        }

        self.persist().await;
        self.finish(EndReason::Abandoned);
    }

    fn finish(&mut self, reason: EndReason) {
        self.context.metrics.record_session_ended(reason);
        self.directory.deregister(self.session_id);
        info!("Session {} deregistered ({:?})", self.session_id, reason);
    }

    async fn persist(&self) {
        if let Err(e) = self
            .context
            .store
            .update_transcript(self.session_id, &self.transcript)
            .await
        {
            error!(
                "Failed to persist transcript for session {}: {}",
                self.session_id, e
            );
        }
    }

    /// Send the same event to both participants, A first
    async fn broadcast(&mut self, event: ServerEvent) {
        self.send_to(0, event.clone()).await;
        self.send_to(1, event).await;
    }

    async fn send_to(&mut self, idx: usize, event: ServerEvent) {
        if self.lost == Some(idx) {
            return;
        }
        let participant_id = self.participants[idx].profile.id.clone();
        match self.context.transport.send(&participant_id, event).await {
            Ok(()) => self.consecutive_failures[idx] = 0,
            Err(DeliveryError::Transient(reason)) => {
                self.context.metrics.record_delivery_failure();
                self.consecutive_failures[idx] += 1;
                warn!(
                    "Delivery to '{}' failed ({} in a row): {}",
                    participant_id, self.consecutive_failures[idx], reason
                );
                if self.consecutive_failures[idx]
                    >= self.context.config.max_consecutive_send_failures
                {
                    self.mark_lost(idx);
                }
            }
            Err(DeliveryError::Unreachable) => {
                warn!("Participant '{}' is unreachable", participant_id);
                self.mark_lost(idx);
            }
        }
    }

    fn mark_lost(&mut self, idx: usize) {
        if self.lost.is_none() && !self.phase.is_terminal() {
            self.lost = Some(idx);
        }
    }

    fn index_of(&self, participant_id: &str) -> Option<usize> {
        self.participants
            .iter()
            .position(|p| p.profile.id == participant_id)
    }

    /// Proposition holds even turns, Negation odd turns
    fn owner_index(&self) -> usize {
        let side = if self.turn_index % 2 == 0 {
            Side::Proposition
        } else {
            Side::Negation
        };
        if self.participants[0].side == side {
            0
        } else {
            1
        }
    }

    fn snapshot(&self) -> SessionSnapshot {
        let turn_owner = (self.phase == SessionPhase::Debate)
            .then(|| self.participants[self.owner_index()].profile.id.clone());
        SessionSnapshot {
            session_id: self.session_id,
            topic: self.topic.clone(),
            phase: self.phase,
            turn_index: self.turn_index,
            max_turns: self.context.config.max_turns,
            turn_owner,
            participants: self.participants.clone(),
            transcript: self.transcript.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::directory::SessionDirectory;
    use crate::storage::InMemoryTranscriptStore;
    use crate::transport::RecordingTransport;

    fn profile(id: &str, rating: i64) -> ParticipantProfile {
        ParticipantProfile {
            id: id.to_string(),
            display_name: id.to_uppercase(),
            rating,
        }
    }

    struct Harness {
        directory: SessionDirectory,
        transport: Arc<RecordingTransport>,
        store: Arc<InMemoryTranscriptStore>,
        metrics: Arc<MetricsCollector>,
        handle: SessionHandle,
    }

    async fn start_session(config: SessionConfig) -> Harness {
        let transport = Arc::new(RecordingTransport::new());
        let store = Arc::new(InMemoryTranscriptStore::new());
        let metrics = Arc::new(MetricsCollector::new().unwrap());
        let directory = SessionDirectory::new();

        let session_id = store.create_record("alice", "bob", "Topic").await.unwrap();
        let setup = SessionSetup {
            session_id,
            topic: "Topic".to_string(),
            participant_a: SessionParticipant {
                profile: profile("alice", 1000),
                side: Side::Negation,
            },
            participant_b: SessionParticipant {
                profile: profile("bob", 1040),
                side: Side::Proposition,
            },
            transcript: vec![],
        };
        let context = SessionContext {
            config,
            transport: transport.clone(),
            store: store.clone(),
            metrics: metrics.clone(),
        };
        let handle = directory.start_session(setup, context).unwrap();

        Harness {
            directory,
            transport,
            store,
            metrics,
            handle,
        }
    }

    fn short_config() -> SessionConfig {
        SessionConfig {
            preparation_seconds: 5,
            turn_seconds: 10,
            max_turns: 2,
            ..SessionConfig::default()
        }
    }

    #[test]
    fn test_validate_content() {
        assert_eq!(validate_content("  hello  ", 10).unwrap(), "hello");
        assert_eq!(validate_content("   ", 10), Err(DebateError::EmptyMessage));
        assert_eq!(
            validate_content("abcdef", 5),
            Err(DebateError::MessageTooLong { len: 6, max: 5 })
        );
        // Length is counted in characters, not bytes
        assert!(validate_content("ééééé", 5).is_ok());
    }

    #[test]
    fn test_config_validation() {
        assert!(SessionConfig::default().validate().is_ok());
        assert!(SessionConfig {
            max_turns: 0,
            ..SessionConfig::default()
        }
        .validate()
        .is_err());
        assert!(SessionConfig {
            tick_interval: Duration::ZERO,
            ..SessionConfig::default()
        }
        .validate()
        .is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_proposition_holder_opens() {
        let harness = start_session(short_config()).await;

        tokio::time::sleep(Duration::from_millis(5500)).await;
        let snapshot = harness.handle.snapshot().await.unwrap();
        assert_eq!(snapshot.phase, SessionPhase::Debate);
        assert_eq!(snapshot.turn_owner.as_deref(), Some("bob"));
        assert_eq!(harness.transport.count_of("bob", "your_turn"), 1);
        assert_eq!(harness.transport.count_of("alice", "opponent_turn"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_out_of_turn_submission_is_rejected() {
        let harness = start_session(short_config()).await;
        tokio::time::sleep(Duration::from_millis(5500)).await;

        let err = harness
            .handle
            .submit_message("alice", "My argument")
            .await
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<DebateError>(),
            Some(&DebateError::NotYourTurn)
        );

        let snapshot = harness.handle.snapshot().await.unwrap();
        assert_eq!(snapshot.turn_index, 0);
        assert!(snapshot.transcript.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_submission_before_debate_is_rejected() {
        let harness = start_session(short_config()).await;

        let err = harness
            .handle
            .submit_message("bob", "Too early")
            .await
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<DebateError>(),
            Some(&DebateError::DebateNotInProgress)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_debate_completes_and_deregisters() {
        let harness = start_session(short_config()).await;
        tokio::time::sleep(Duration::from_millis(5500)).await;

        harness.handle.submit_message("bob", " Opening ").await.unwrap();
        harness
            .handle
            .submit_message("alice", "Rebuttal")
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(harness.directory.active_count(), 0);
        assert!(harness.directory.lookup_by_participant("alice").is_none());

        let record = harness
            .store
            .get_record(harness.handle.session_id())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.transcript.len(), 2);
        assert_eq!(record.transcript[0].content, "Opening");
        assert_eq!(record.transcript[0].side, Side::Proposition);
        assert_eq!(record.transcript[1].turn_index, 1);

        assert_eq!(harness.transport.count_of("alice", "session_ended"), 1);
        assert_eq!(harness.transport.count_of("bob", "session_ended"), 1);
        assert_eq!(harness.metrics.sessions_ended(EndReason::Completed), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failures_below_threshold_keep_session() {
        let harness = start_session(short_config()).await;
        tokio::time::sleep(Duration::from_millis(1500)).await;

        harness.transport.fail_next("alice", 2);
        tokio::time::sleep(Duration::from_secs(3)).await;

        let snapshot = harness.handle.snapshot().await.unwrap();
        assert_eq!(snapshot.phase, SessionPhase::Preparation);
        assert_eq!(harness.metrics.session().delivery_failures_total.get(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeated_transient_failures_end_session() {
        let harness = start_session(short_config()).await;
        tokio::time::sleep(Duration::from_millis(1500)).await;

        harness.transport.fail_next("alice", 3);
        tokio::time::sleep(Duration::from_secs(4)).await;

        assert_eq!(harness.directory.active_count(), 0);
        assert_eq!(harness.transport.count_of("bob", "opponent_left"), 1);
        assert_eq!(harness.metrics.sessions_ended(EndReason::Abandoned), 1);
    }
}
