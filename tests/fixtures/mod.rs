//! Test fixtures for integration testing

#![allow(dead_code)]

use debate_room::config::AppConfig;
use debate_room::matchmaking::{FixedSideAssigner, TickOutcome};
use debate_room::service::{Collaborators, DebateService};
use debate_room::storage::{
    InMemoryParticipantDirectory, InMemoryTranscriptStore, StaticTopicSupplier,
};
use debate_room::transport::RecordingTransport;
use debate_room::types::{ServerEvent, SessionId, Side};
use std::sync::Arc;
use tokio::time::Instant;

pub const TEST_TOPIC: &str = "Remote work should be the default";

/// A complete service wired to recording collaborators
pub struct TestSystem {
    pub service: DebateService,
    pub transport: Arc<RecordingTransport>,
    pub store: Arc<InMemoryTranscriptStore>,
    pub participants: Arc<InMemoryParticipantDirectory>,
}

impl TestSystem {
    /// Run one scheduler tick and expect a new session
    pub async fn match_now(&self) -> SessionId {
        match self.service.scheduler().run_once(Instant::now()).await {
            Ok(TickOutcome::Matched(session_id)) => session_id,
            other => panic!("expected a match, got {:?}", other),
        }
    }

    /// Turn numbers and sides from the `your_turn` events a participant received
    pub fn turns_for(&self, participant_id: &str) -> Vec<(u32, Side)> {
        self.transport
            .events_for(participant_id)
            .into_iter()
            .filter_map(|event| match event {
                ServerEvent::YourTurn {
                    turn_number,
                    your_side,
                    ..
                } => Some((turn_number, your_side)),
                _ => None,
            })
            .collect()
    }

    /// Events a participant received after the last one of `kind`
    pub fn events_after(&self, participant_id: &str, kind: &str) -> Vec<ServerEvent> {
        let events = self.transport.events_for(participant_id);
        match events.iter().rposition(|event| event.kind() == kind) {
            Some(position) => events[position + 1..].to_vec(),
            None => Vec::new(),
        }
    }
}

/// Default test roster: p1 and p2 are close in rating, p3 is far away
pub fn default_participants() -> Arc<InMemoryParticipantDirectory> {
    let participants = Arc::new(InMemoryParticipantDirectory::new());
    participants.add("p1", "Player One", 1000).unwrap();
    participants.add("p2", "Player Two", 1040).unwrap();
    participants.add("p3", "Player Three", 1700).unwrap();
    participants
}

/// Integration test setup that creates a complete system.
/// The first participant of every pair argues the Proposition.
pub fn create_test_system(config: AppConfig) -> TestSystem {
    let participants = default_participants();
    let transport = Arc::new(RecordingTransport::new());
    let store = Arc::new(InMemoryTranscriptStore::new());

    let collaborators = Collaborators {
        participants: participants.clone(),
        topics: Arc::new(StaticTopicSupplier::single(TEST_TOPIC)),
        store: store.clone(),
        transport: transport.clone(),
    };
    let service = DebateService::new(config, collaborators)
        .unwrap()
        .with_side_assigner(Arc::new(FixedSideAssigner(Side::Proposition)));

    TestSystem {
        service,
        transport,
        store,
        participants,
    }
}

/// Default configuration with a short debate
pub fn short_debate_config(max_turns: u32) -> AppConfig {
    let mut config = AppConfig::default();
    config.session.max_turns = max_turns;
    config
}

/// Configuration with the readiness handshake enabled
pub fn readiness_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.session.require_readiness = true;
    config
}
