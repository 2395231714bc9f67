//! Rating queue with time-based range expansion
//!
//! Waiting participants are kept in enqueue order. Pairing scans every
//! unordered pair and accepts a pair when the rating difference fits the
//! tolerance earned by the longer of the two waits.

use crate::error::{DebateError, Result};
use crate::types::ParticipantId;
use crate::utils::{rating_difference, whole_intervals};
use serde::Serialize;
use std::collections::HashSet;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Configuration for rating range expansion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueConfig {
    /// Rating difference accepted with no waiting
    pub base_range: u64,
    /// Tolerance added per elapsed expansion interval
    pub expansion_step: u64,
    /// Waiting time that earns one expansion step
    pub expansion_interval: Duration,
    /// Upper bound on the tolerance
    pub max_range: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            base_range: 100,
            expansion_step: 50,
            expansion_interval: Duration::from_secs(30),
            max_range: 500,
        }
    }
}

impl QueueConfig {
    pub fn validate(&self) -> Result<()> {
        if self.expansion_interval.is_zero() {
            return Err(DebateError::ConfigurationError {
                message: "Expansion interval must be greater than 0".to_string(),
            }
            .into());
        }
        if self.max_range < self.base_range {
            return Err(DebateError::ConfigurationError {
                message: format!(
                    "Max range ({}) cannot be less than base range ({})",
                    self.max_range, self.base_range
                ),
            }
            .into());
        }
        Ok(())
    }

    /// Tolerance for a pair whose longer wait is `wait`
    pub fn allowed_range(&self, wait: Duration) -> u64 {
        let steps = whole_intervals(wait, self.expansion_interval);
        self.base_range
            .saturating_add(self.expansion_step.saturating_mul(steps))
            .min(self.max_range)
    }
}

/// A participant waiting to be paired
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedParticipant {
    pub id: ParticipantId,
    pub rating: i64,
    pub enqueued_at: Instant,
}

impl QueuedParticipant {
    /// Time spent in the queue, zero if `now` predates the enqueue
    pub fn wait_time(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.enqueued_at)
    }
}

/// Two participants removed from the queue together
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedPair {
    pub first: QueuedParticipant,
    pub second: QueuedParticipant,
}

impl MatchedPair {
    pub fn rating_difference(&self) -> u64 {
        rating_difference(self.first.rating, self.second.rating)
    }

    /// Longer of the two waits at `now`
    pub fn longest_wait(&self, now: Instant) -> Duration {
        self.first.wait_time(now).max(self.second.wait_time(now))
    }
}

/// Point-in-time view of the queue for status reporting
#[derive(Debug, Clone, Default, Serialize)]
pub struct QueueSnapshot {
    pub size: usize,
    pub participants: Vec<ParticipantId>,
}

/// Ordered collection of waiting participants
#[derive(Debug, Default)]
pub struct RatingQueue {
    config: QueueConfig,
    waiting: Vec<QueuedParticipant>,
    /// Drawn into a pair whose session is not registered yet
    pairing: HashSet<ParticipantId>,
}

impl RatingQueue {
    pub fn new(config: QueueConfig) -> Self {
        Self {
            config,
            waiting: Vec::new(),
            pairing: HashSet::new(),
        }
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Add a participant; a repeated enqueue keeps the original wait start.
    /// Returns whether the participant was newly inserted.
    pub fn enqueue(&mut self, id: ParticipantId, rating: i64, now: Instant) -> bool {
        if self.contains(&id) {
            debug!("Participant '{}' already queued, keeping original entry", id);
            return false;
        }
        debug!("Queued participant '{}' with rating {}", id, rating);
        self.waiting.push(QueuedParticipant {
            id,
            rating,
            enqueued_at: now,
        });
        true
    }

    /// Remove a participant if present. Returns whether anything was removed.
    pub fn dequeue(&mut self, id: &str) -> bool {
        let before = self.waiting.len();
        self.waiting.retain(|entry| entry.id != id);
        before != self.waiting.len()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.waiting.iter().any(|entry| entry.id == id)
    }

    pub fn len(&self) -> usize {
        self.waiting.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waiting.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&QueuedParticipant> {
        self.waiting.iter().find(|entry| entry.id == id)
    }

    /// Mark both members of a drawn pair as being set up
    pub fn hold(&mut self, pair: &MatchedPair) {
        self.pairing.insert(pair.first.id.clone());
        self.pairing.insert(pair.second.id.clone());
    }

    /// Clear the hold once the pair's session is registered or abandoned
    pub fn release(&mut self, pair: &MatchedPair) {
        self.pairing.remove(&pair.first.id);
        self.pairing.remove(&pair.second.id);
    }

    pub fn is_pairing(&self, id: &str) -> bool {
        self.pairing.contains(id)
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        QueueSnapshot {
            size: self.waiting.len(),
            participants: self.waiting.iter().map(|entry| entry.id.clone()).collect(),
        }
    }

    /// Tolerance for a given longer wait
    pub fn allowed_range(&self, wait: Duration) -> u64 {
        self.config.allowed_range(wait)
    }

    /// Find the eligible pair with the smallest rating difference and remove
    /// both members. Ties resolve to the first pair met in enqueue order.
    pub fn find_best_pair(&mut self, now: Instant) -> Option<MatchedPair> {
        if self.waiting.len() < 2 {
            return None;
        }

        let mut best: Option<(usize, usize, u64)> = None;
        for i in 0..self.waiting.len() {
            for j in (i + 1)..self.waiting.len() {
                let a = &self.waiting[i];
                let b = &self.waiting[j];
                let difference = rating_difference(a.rating, b.rating);
                let longest_wait = a.wait_time(now).max(b.wait_time(now));
                if difference > self.config.allowed_range(longest_wait) {
                    continue;
                }
                match best {
                    Some((_, _, best_difference)) if best_difference <= difference => {}
                    _ => best = Some((i, j, difference)),
                }
            }
        }

        let (i, j, difference) = best?;
        // j > i, so removing j first keeps i valid
        let second = self.waiting.remove(j);
        let first = self.waiting.remove(i);
        debug!(
            "Paired '{}' ({}) with '{}' ({}), difference {}",
            first.id, first.rating, second.id, second.rating, difference
        );
        Some(MatchedPair { first, second })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queue() -> RatingQueue {
        RatingQueue::new(QueueConfig::default())
    }

    #[test]
    fn test_allowed_range_expansion() {
        let config = QueueConfig::default();
        assert_eq!(config.allowed_range(Duration::from_secs(0)), 100);
        assert_eq!(config.allowed_range(Duration::from_secs(29)), 100);
        assert_eq!(config.allowed_range(Duration::from_secs(30)), 150);
        assert_eq!(config.allowed_range(Duration::from_secs(95)), 250);
        // 100 + 50 * 8 = 500, the cap
        assert_eq!(config.allowed_range(Duration::from_secs(240)), 500);
        assert_eq!(config.allowed_range(Duration::from_secs(3600)), 500);
    }

    #[test]
    fn test_config_validation() {
        assert!(QueueConfig::default().validate().is_ok());

        let config = QueueConfig {
            max_range: 50,
            ..QueueConfig::default()
        };
        assert!(config.validate().is_err());

        let config = QueueConfig {
            expansion_interval: Duration::ZERO,
            ..QueueConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_enqueue_is_idempotent() {
        let mut queue = queue();
        let start = Instant::now();

        assert!(queue.enqueue("alice".to_string(), 1000, start));
        assert!(!queue.enqueue("alice".to_string(), 1200, start + Duration::from_secs(20)));

        assert_eq!(queue.len(), 1);
        let entry = queue.get("alice").unwrap();
        assert_eq!(entry.enqueued_at, start);
        assert_eq!(entry.rating, 1000);
    }

    #[test]
    fn test_dequeue_unknown_is_noop() {
        let mut queue = queue();
        assert!(!queue.dequeue("nobody"));

        queue.enqueue("alice".to_string(), 1000, Instant::now());
        assert!(queue.dequeue("alice"));
        assert!(!queue.dequeue("alice"));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_single_participant_never_pairs() {
        let mut queue = queue();
        let start = Instant::now();
        queue.enqueue("alice".to_string(), 1000, start);
        assert!(queue.find_best_pair(start + Duration::from_secs(600)).is_none());
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_close_ratings_pair_immediately() {
        let mut queue = queue();
        let start = Instant::now();
        queue.enqueue("p1".to_string(), 1000, start);
        queue.enqueue("p2".to_string(), 1040, start);

        let pair = queue.find_best_pair(start).unwrap();
        assert_eq!(pair.first.id, "p1");
        assert_eq!(pair.second.id, "p2");
        assert_eq!(pair.rating_difference(), 40);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_wide_gap_waits_for_expansion() {
        let mut queue = queue();
        let start = Instant::now();
        queue.enqueue("p1".to_string(), 1000, start);
        queue.enqueue("p2".to_string(), 1400, start);

        assert!(queue.find_best_pair(start).is_none());
        assert!(queue
            .find_best_pair(start + Duration::from_secs(150))
            .is_none());
        assert_eq!(queue.len(), 2);

        // 100 + 50 * 6 = 400 at 180 seconds
        let pair = queue.find_best_pair(start + Duration::from_secs(180)).unwrap();
        assert_eq!(pair.rating_difference(), 400);
    }

    #[test]
    fn test_longer_wait_drives_expansion() {
        let mut queue = queue();
        let start = Instant::now();
        queue.enqueue("veteran".to_string(), 1000, start);
        queue.enqueue("newcomer".to_string(), 1150, start + Duration::from_secs(60));

        // newcomer just arrived, but veteran has waited 60s: range 200
        let pair = queue.find_best_pair(start + Duration::from_secs(60)).unwrap();
        assert_eq!(pair.first.id, "veteran");
    }

    #[test]
    fn test_smallest_difference_wins() {
        let mut queue = queue();
        let start = Instant::now();
        queue.enqueue("a".to_string(), 1000, start);
        queue.enqueue("b".to_string(), 1090, start);
        queue.enqueue("c".to_string(), 1100, start);

        let pair = queue.find_best_pair(start).unwrap();
        assert_eq!((pair.first.id.as_str(), pair.second.id.as_str()), ("b", "c"));
        assert_eq!(queue.snapshot().participants, vec!["a".to_string()]);
    }

    #[test]
    fn test_ties_resolve_in_scan_order() {
        let mut queue = queue();
        let start = Instant::now();
        queue.enqueue("a".to_string(), 1000, start);
        queue.enqueue("b".to_string(), 1050, start);
        queue.enqueue("c".to_string(), 1100, start);

        // (a,b) and (b,c) both differ by 50; (a,b) is met first
        let pair = queue.find_best_pair(start).unwrap();
        assert_eq!((pair.first.id.as_str(), pair.second.id.as_str()), ("a", "b"));
    }

    #[test]
    fn test_hold_and_release_pair() {
        let mut queue = queue();
        let start = Instant::now();
        queue.enqueue("a".to_string(), 1000, start);
        queue.enqueue("b".to_string(), 1020, start);

        let pair = queue.find_best_pair(start).unwrap();
        queue.hold(&pair);
        assert!(queue.is_pairing("a"));
        assert!(queue.is_pairing("b"));
        assert!(!queue.contains("a"));

        queue.release(&pair);
        assert!(!queue.is_pairing("a"));
        assert!(!queue.is_pairing("b"));
    }
}
