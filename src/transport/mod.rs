//! Outbound delivery of server events to individual participants
//!
//! The service never owns sockets. A transport layer implements
//! [`ParticipantTransport`] and reports whether each delivery succeeded.

use crate::types::{ParticipantId, ServerEvent};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use tracing::{debug, info};

/// Delivery failure reported by a transport
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    /// The send failed but the participant may still be reachable
    #[error("Transient delivery failure: {0}")]
    Transient(String),

    /// The participant has no live connection
    #[error("Participant is unreachable")]
    Unreachable,
}

/// Trait for sending events to a participant by identity
#[async_trait]
pub trait ParticipantTransport: Send + Sync {
    /// Deliver one event to one participant
    async fn send(
        &self,
        participant_id: &str,
        event: ServerEvent,
    ) -> std::result::Result<(), DeliveryError>;
}

/// Transport that only logs deliveries (used by the service binary)
#[derive(Debug, Default)]
pub struct LoggingTransport;

#[async_trait]
impl ParticipantTransport for LoggingTransport {
    async fn send(
        &self,
        participant_id: &str,
        event: ServerEvent,
    ) -> std::result::Result<(), DeliveryError> {
        if event.is_timer_tick() {
            debug!("-> '{}': {}", participant_id, event.kind());
        } else {
            let payload = serde_json::to_string(&event)
                .map_err(|e| DeliveryError::Transient(e.to_string()))?;
            info!("-> '{}': {}", participant_id, payload);
        }
        Ok(())
    }
}

/// Transport that records every delivered event per participant (for testing)
#[derive(Debug, Default)]
pub struct RecordingTransport {
    delivered: Mutex<HashMap<ParticipantId, Vec<ServerEvent>>>,
    unreachable: Mutex<HashSet<ParticipantId>>,
    transient_failures: Mutex<HashMap<ParticipantId, u32>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// All events delivered to a participant, in delivery order
    pub fn events_for(&self, participant_id: &str) -> Vec<ServerEvent> {
        self.delivered
            .lock()
            .map(|delivered| delivered.get(participant_id).cloned().unwrap_or_default())
            .unwrap_or_default()
    }

    /// Delivered event kinds for a participant, timer ticks excluded
    pub fn kinds_for(&self, participant_id: &str) -> Vec<&'static str> {
        self.events_for(participant_id)
            .iter()
            .filter(|event| !event.is_timer_tick())
            .map(ServerEvent::kind)
            .collect()
    }

    /// Number of delivered events of one kind
    pub fn count_of(&self, participant_id: &str, kind: &str) -> usize {
        self.events_for(participant_id)
            .iter()
            .filter(|event| event.kind() == kind)
            .count()
    }

    /// Drop the recorded history for every participant
    pub fn clear(&self) {
        if let Ok(mut delivered) = self.delivered.lock() {
            delivered.clear();
        }
    }

    /// Make every further send to this participant fail with `Unreachable`
    pub fn set_unreachable(&self, participant_id: &str) {
        if let Ok(mut unreachable) = self.unreachable.lock() {
            unreachable.insert(participant_id.to_string());
        }
    }

    /// Make the next `count` sends to this participant fail transiently
    pub fn fail_next(&self, participant_id: &str, count: u32) {
        if let Ok(mut failures) = self.transient_failures.lock() {
            failures.insert(participant_id.to_string(), count);
        }
    }

    fn take_transient_failure(&self, participant_id: &str) -> bool {
        let Ok(mut failures) = self.transient_failures.lock() else {
            return false;
        };
        match failures.get_mut(participant_id) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                true
            }
            _ => false,
        }
    }
}

#[async_trait]
impl ParticipantTransport for RecordingTransport {
    async fn send(
        &self,
        participant_id: &str,
        event: ServerEvent,
    ) -> std::result::Result<(), DeliveryError> {
        let unreachable = self
            .unreachable
            .lock()
            .map(|set| set.contains(participant_id))
            .unwrap_or(false);
        if unreachable {
            return Err(DeliveryError::Unreachable);
        }
        if self.take_transient_failure(participant_id) {
            return Err(DeliveryError::Transient("simulated failure".to_string()));
        }

        if let Ok(mut delivered) = self.delivered.lock() {
            delivered
                .entry(participant_id.to_string())
                .or_default()
                .push(event);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn left() -> ServerEvent {
        ServerEvent::QueueLeft {
            message: "Left matchmaking queue".to_string(),
        }
    }

    #[tokio::test]
    async fn test_recording_transport_captures_in_order() {
        let transport = RecordingTransport::new();
        transport
            .send(
                "alice",
                ServerEvent::QueueJoined {
                    message: "Joined".to_string(),
                    queue_size: 1,
                },
            )
            .await
            .unwrap();
        transport.send("alice", left()).await.unwrap();

        assert_eq!(transport.kinds_for("alice"), vec!["queue_joined", "queue_left"]);
        assert!(transport.events_for("bob").is_empty());
    }

    #[tokio::test]
    async fn test_simulated_failures() {
        let transport = RecordingTransport::new();
        transport.fail_next("alice", 1);
        assert!(matches!(
            transport.send("alice", left()).await,
            Err(DeliveryError::Transient(_))
        ));
        assert!(transport.send("alice", left()).await.is_ok());

        transport.set_unreachable("bob");
        assert_eq!(
            transport.send("bob", left()).await,
            Err(DeliveryError::Unreachable)
        );
        assert_eq!(transport.count_of("alice", "queue_left"), 1);
    }
}
