//! Service layer for the debate-room service
//!
//! This module contains the service facade, its collaborators bundle, and
//! health reporting.

pub mod app;
pub mod health;

pub use app::{Collaborators, DebateService, DisconnectOutcome, ServiceError, ServiceStatus};
pub use health::{ComponentCheck, HealthCheck, HealthStatus};
