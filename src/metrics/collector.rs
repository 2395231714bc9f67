//! Metrics collection using Prometheus
//!
//! This module provides metrics for the debate-room service: queue activity,
//! match creation, and session lifecycle.

use anyhow::Result;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::sync::Arc;
use std::time::Duration;

/// Outcome label for a completed turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The turn owner submitted an argument
    Submitted,
    /// The turn timer expired
    Skipped,
}

impl TurnOutcome {
    fn label(self) -> &'static str {
        match self {
            TurnOutcome::Submitted => "submitted",
            TurnOutcome::Skipped => "skipped",
        }
    }
}

/// Reason label for a session reaching its terminal phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    /// All turns were played
    Completed,
    /// A participant left or became unreachable
    Abandoned,
}

impl EndReason {
    fn label(self) -> &'static str {
        match self {
            EndReason::Completed => "completed",
            EndReason::Abandoned => "abandoned",
        }
    }
}

/// Main metrics collector for the debate service
#[derive(Clone)]
pub struct MetricsCollector {
    /// Prometheus registry
    registry: Arc<Registry>,

    /// Queue and match metrics
    queue_metrics: QueueMetrics,

    /// Session lifecycle metrics
    session_metrics: SessionMetrics,
}

/// Queue and match metrics
#[derive(Clone)]
pub struct QueueMetrics {
    /// Participants currently waiting
    pub queue_size: IntGauge,

    /// Total successful enqueues
    pub participants_enqueued_total: IntCounter,

    /// Total sessions created from matched pairs
    pub matches_created_total: IntCounter,

    /// Total matched pairs that failed to become sessions
    pub match_failures_total: IntCounter,

    /// Longer wait of each matched pair
    pub match_wait_seconds: Histogram,
}

/// Session lifecycle metrics
#[derive(Clone)]
pub struct SessionMetrics {
    /// Sessions currently registered
    pub active_sessions: IntGauge,

    /// Completed turns by outcome
    pub turns_completed_total: IntCounterVec,

    /// Ended sessions by reason
    pub sessions_ended_total: IntCounterVec,

    /// Transient delivery failures
    pub delivery_failures_total: IntCounter,
}

impl MetricsCollector {
    /// Create a new metrics collector with default registry
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());
        Self::with_registry(registry)
    }

    /// Create a new metrics collector with custom registry
    pub fn with_registry(registry: Arc<Registry>) -> Result<Self> {
        let queue_metrics = QueueMetrics::new(&registry)?;
        let session_metrics = SessionMetrics::new(&registry)?;

        Ok(Self {
            registry,
            queue_metrics,
            session_metrics,
        })
    }

    /// Get the Prometheus registry
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    /// Get queue metrics
    pub fn queue(&self) -> &QueueMetrics {
        &self.queue_metrics
    }

    /// Get session metrics
    pub fn session(&self) -> &SessionMetrics {
        &self.session_metrics
    }

    /// Record a participant entering the queue
    pub fn record_enqueued(&self, queue_size: usize) {
        self.queue_metrics.participants_enqueued_total.inc();
        self.set_queue_size(queue_size);
    }

    pub fn set_queue_size(&self, queue_size: usize) {
        self.queue_metrics.queue_size.set(queue_size as i64);
    }

    /// Record a pair becoming a session
    pub fn record_match_created(&self, longest_wait: Duration) {
        self.queue_metrics.matches_created_total.inc();
        self.queue_metrics
            .match_wait_seconds
            .observe(longest_wait.as_secs_f64());
    }

    /// Record a pair that could not become a session
    pub fn record_match_failed(&self) {
        self.queue_metrics.match_failures_total.inc();
    }

    pub fn record_session_started(&self) {
        self.session_metrics.active_sessions.inc();
    }

    pub fn record_session_ended(&self, reason: EndReason) {
        self.session_metrics.active_sessions.dec();
        self.session_metrics
            .sessions_ended_total
            .with_label_values(&[reason.label()])
            .inc();
    }

    pub fn record_turn_completed(&self, outcome: TurnOutcome) {
        self.session_metrics
            .turns_completed_total
            .with_label_values(&[outcome.label()])
            .inc();
    }

    pub fn record_delivery_failure(&self) {
        self.session_metrics.delivery_failures_total.inc();
    }

    /// Current value of the ended-sessions counter for one reason
    pub fn sessions_ended(&self, reason: EndReason) -> u64 {
        self.session_metrics
            .sessions_ended_total
            .with_label_values(&[reason.label()])
            .get()
    }

    /// Current value of the completed-turns counter for one outcome
    pub fn turns_completed(&self, outcome: TurnOutcome) -> u64 {
        self.session_metrics
            .turns_completed_total
            .with_label_values(&[outcome.label()])
            .get()
    }

    /// Render all metrics in the Prometheus text exposition format
    pub fn render(&self) -> Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

impl QueueMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let queue_size = IntGauge::new("debate_room_queue_size", "Participants waiting in queue")?;
        registry.register(Box::new(queue_size.clone()))?;

        let participants_enqueued_total = IntCounter::new(
            "debate_room_participants_enqueued_total",
            "Total participants added to the queue",
        )?;
        registry.register(Box::new(participants_enqueued_total.clone()))?;

        let matches_created_total = IntCounter::new(
            "debate_room_matches_created_total",
            "Total matches turned into sessions",
        )?;
        registry.register(Box::new(matches_created_total.clone()))?;

        let match_failures_total = IntCounter::new(
            "debate_room_match_failures_total",
            "Total matches that failed during session creation",
        )?;
        registry.register(Box::new(match_failures_total.clone()))?;

        let match_wait_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "debate_room_match_wait_seconds",
                "Longer queue wait of each matched pair",
            )
            .buckets(vec![1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 240.0, 480.0]),
        )?;
        registry.register(Box::new(match_wait_seconds.clone()))?;

        Ok(Self {
            queue_size,
            participants_enqueued_total,
            matches_created_total,
            match_failures_total,
            match_wait_seconds,
        })
    }
}

impl SessionMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let active_sessions =
            IntGauge::new("debate_room_active_sessions", "Sessions currently running")?;
        registry.register(Box::new(active_sessions.clone()))?;

        let turns_completed_total = IntCounterVec::new(
            Opts::new(
                "debate_room_turns_completed_total",
                "Total completed debate turns",
            ),
            &["outcome"],
        )?;
        registry.register(Box::new(turns_completed_total.clone()))?;

        let sessions_ended_total = IntCounterVec::new(
            Opts::new("debate_room_sessions_ended_total", "Total ended sessions"),
            &["reason"],
        )?;
        registry.register(Box::new(sessions_ended_total.clone()))?;

        let delivery_failures_total = IntCounter::new(
            "debate_room_delivery_failures_total",
            "Total transient delivery failures",
        )?;
        registry.register(Box::new(delivery_failures_total.clone()))?;

        Ok(Self {
            active_sessions,
            turns_completed_total,
            sessions_ended_total,
            delivery_failures_total,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_collector_creation() {
        let collector = MetricsCollector::new().expect("Failed to create metrics collector");

        let _queue = collector.queue();
        let _session = collector.session();
    }

    #[test]
    fn test_queue_recording() {
        let collector = MetricsCollector::new().unwrap();

        collector.record_enqueued(1);
        collector.record_enqueued(2);
        collector.record_match_created(Duration::from_secs(12));
        collector.record_match_failed();

        assert_eq!(collector.queue().participants_enqueued_total.get(), 2);
        assert_eq!(collector.queue().queue_size.get(), 2);
        assert_eq!(collector.queue().matches_created_total.get(), 1);
        assert_eq!(collector.queue().match_failures_total.get(), 1);
        assert_eq!(collector.queue().match_wait_seconds.get_sample_count(), 1);
    }

    #[test]
    fn test_session_recording() {
        let collector = MetricsCollector::new().unwrap();

        collector.record_session_started();
        collector.record_turn_completed(TurnOutcome::Submitted);
        collector.record_turn_completed(TurnOutcome::Skipped);
        collector.record_session_ended(EndReason::Completed);

        assert_eq!(collector.session().active_sessions.get(), 0);
        assert_eq!(collector.turns_completed(TurnOutcome::Submitted), 1);
        assert_eq!(collector.turns_completed(TurnOutcome::Skipped), 1);
        assert_eq!(collector.sessions_ended(EndReason::Completed), 1);
        assert_eq!(collector.sessions_ended(EndReason::Abandoned), 0);
    }

    #[test]
    fn test_render_text_format() {
        let collector = MetricsCollector::new().unwrap();
        collector.record_enqueued(1);

        let text = collector.render().unwrap();
        assert!(text.contains("debate_room_participants_enqueued_total 1"));
    }
}
