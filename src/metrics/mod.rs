//! Metrics for the debate-room service
//!
//! This module provides Prometheus metrics collection for the queue, the
//! scheduler and running sessions.

pub mod collector;

pub use collector::{EndReason, MetricsCollector, QueueMetrics, SessionMetrics, TurnOutcome};
