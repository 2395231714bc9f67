//! Common types used throughout the debate service

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for participants
pub type ParticipantId = String;

/// Unique identifier for sessions (also the persisted record id)
pub type SessionId = Uuid;

/// Role label assigned to each participant of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Proposition,
    Negation,
}

impl Side {
    /// The side held by the other participant
    pub fn opposite(self) -> Side {
        match self {
            Side::Proposition => Side::Negation,
            Side::Negation => Side::Proposition,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Proposition => write!(f, "Proposition"),
            Side::Negation => write!(f, "Negation"),
        }
    }
}

/// Participant information returned by the participant directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantProfile {
    pub id: ParticipantId,
    pub display_name: String,
    pub rating: i64,
}

/// Phases of a debate session (linear, no re-entry)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionPhase {
    /// Both participants must signal readiness
    AwaitingReadiness,
    /// Countdown before the first turn
    Preparation,
    /// Alternating turns
    Debate,
    /// Terminal state
    Ended,
}

impl SessionPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionPhase::Ended)
    }
}

impl std::fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionPhase::AwaitingReadiness => write!(f, "AwaitingReadiness"),
            SessionPhase::Preparation => write!(f, "Preparation"),
            SessionPhase::Debate => write!(f, "Debate"),
            SessionPhase::Ended => write!(f, "Ended"),
        }
    }
}

/// One entry of a session transcript
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptMessage {
    pub sender: ParticipantId,
    pub sender_display_name: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    /// Zero-based index of the turn this message closed
    pub turn_index: u32,
    pub side: Side,
}

impl TranscriptMessage {
    /// Per-side round number (1-based), as shown to participants
    pub fn turn_number(&self) -> u32 {
        turn_number(self.turn_index)
    }
}

/// Per-side round number for a zero-based turn index
pub fn turn_number(turn_index: u32) -> u32 {
    turn_index / 2 + 1
}

/// Opponent details sent to a participant when a match is found
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpponentInfo {
    pub id: ParticipantId,
    pub display_name: String,
    pub rating: i64,
}

impl From<&ParticipantProfile> for OpponentInfo {
    fn from(profile: &ParticipantProfile) -> Self {
        Self {
            id: profile.id.clone(),
            display_name: profile.display_name.clone(),
            rating: profile.rating,
        }
    }
}

/// Persisted session record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session_id: SessionId,
    pub participant_a: ParticipantId,
    pub participant_b: ParticipantId,
    pub topic: String,
    pub transcript: Vec<TranscriptMessage>,
    pub created_at: DateTime<Utc>,
}

impl SessionRecord {
    pub fn involves(&self, participant_id: &str) -> bool {
        self.participant_a == participant_id || self.participant_b == participant_id
    }
}

/// Outbound payloads delivered to a single participant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    QueueJoined {
        message: String,
        queue_size: usize,
    },
    QueueLeft {
        message: String,
    },
    MatchFound {
        session_id: SessionId,
        topic: String,
        your_side: Side,
        opponent: OpponentInfo,
    },
    MatchFailed {
        message: String,
    },
    SessionInitialized {
        session_id: SessionId,
        topic: String,
        preparation_seconds: u64,
        your_side: Side,
        opponent_side: Side,
        status: String,
    },
    ConnectionStatus {
        status: String,
    },
    SessionStarted {
        session_id: SessionId,
        topic: String,
        preparation_seconds: u64,
        your_side: Side,
        opponent_side: Side,
        status: String,
    },
    PrepTimerStarted {
        duration_seconds: u64,
    },
    PrepTimer {
        remaining_seconds: u64,
        display: String,
    },
    DebatePhaseStarted {
        message: String,
    },
    YourTurn {
        turn_number: u32,
        time_limit_seconds: u64,
        your_side: Side,
    },
    OpponentTurn {
        turn_number: u32,
        time_limit_seconds: u64,
        opponent_side: Side,
        your_side: Side,
    },
    TurnTimer {
        remaining_seconds: u64,
        display: String,
        current_turn_participant: ParticipantId,
        current_turn_side: Side,
    },
    Message(TranscriptMessage),
    SessionEnded {
        session_id: SessionId,
        topic: String,
        transcript: Vec<TranscriptMessage>,
    },
    OpponentLeft {
        message: String,
    },
    Error {
        message: String,
    },
}

impl ServerEvent {
    /// Short name of the event, matching the serialized `type` tag
    pub fn kind(&self) -> &'static str {
        match self {
            ServerEvent::QueueJoined { .. } => "queue_joined",
            ServerEvent::QueueLeft { .. } => "queue_left",
            ServerEvent::MatchFound { .. } => "match_found",
            ServerEvent::MatchFailed { .. } => "match_failed",
            ServerEvent::SessionInitialized { .. } => "session_initialized",
            ServerEvent::ConnectionStatus { .. } => "connection_status",
            ServerEvent::SessionStarted { .. } => "session_started",
            ServerEvent::PrepTimerStarted { .. } => "prep_timer_started",
            ServerEvent::PrepTimer { .. } => "prep_timer",
            ServerEvent::DebatePhaseStarted { .. } => "debate_phase_started",
            ServerEvent::YourTurn { .. } => "your_turn",
            ServerEvent::OpponentTurn { .. } => "opponent_turn",
            ServerEvent::TurnTimer { .. } => "turn_timer",
            ServerEvent::Message(_) => "message",
            ServerEvent::SessionEnded { .. } => "session_ended",
            ServerEvent::OpponentLeft { .. } => "opponent_left",
            ServerEvent::Error { .. } => "error",
        }
    }

    /// Whether this event was produced by a phase timer
    pub fn is_timer_tick(&self) -> bool {
        matches!(
            self,
            ServerEvent::PrepTimer { .. } | ServerEvent::TurnTimer { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_side_opposite() {
        assert_eq!(Side::Proposition.opposite(), Side::Negation);
        assert_eq!(Side::Negation.opposite(), Side::Proposition);
    }

    #[test]
    fn test_turn_number() {
        assert_eq!(turn_number(0), 1);
        assert_eq!(turn_number(1), 1);
        assert_eq!(turn_number(2), 2);
        assert_eq!(turn_number(5), 3);
    }

    #[test]
    fn test_server_event_tag_matches_kind() {
        let event = ServerEvent::PrepTimer {
            remaining_seconds: 42,
            display: "00:42".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], event.kind());
        assert_eq!(json["remaining_seconds"], 42);

        let message = ServerEvent::Message(TranscriptMessage {
            sender: "alice".to_string(),
            sender_display_name: "Alice".to_string(),
            content: "Opening statement".to_string(),
            timestamp: Utc::now(),
            turn_index: 0,
            side: Side::Proposition,
        });
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["type"], "message");
        assert_eq!(json["sender"], "alice");
    }

    #[test]
    fn test_record_involves() {
        let record = SessionRecord {
            session_id: Uuid::new_v4(),
            participant_a: "alice".to_string(),
            participant_b: "bob".to_string(),
            topic: "Topic".to_string(),
            transcript: vec![],
            created_at: Utc::now(),
        };
        assert!(record.involves("alice"));
        assert!(record.involves("bob"));
        assert!(!record.involves("carol"));
    }
}
