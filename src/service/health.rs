//! Health checks for the debate service
//!
//! The binary logs a health summary periodically; a transport layer can
//! expose the same report as JSON.

use crate::service::app::{DebateService, ServiceStatus};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::error;

/// Health check status
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "✅ healthy"),
            HealthStatus::Degraded => write!(f, "⚠️  degraded"),
            HealthStatus::Unhealthy => write!(f, "❌ unhealthy"),
        }
    }
}

/// Individual component health check
#[derive(Debug, Clone, Serialize)]
pub struct ComponentCheck {
    /// Component name
    pub name: String,
    /// Component status
    pub status: HealthStatus,
    /// Optional error message if unhealthy
    pub message: Option<String>,
}

/// Health check response
#[derive(Debug, Clone, Serialize)]
pub struct HealthCheck {
    /// Overall service status
    pub status: HealthStatus,
    /// Service name
    pub service: String,
    /// Crate version
    pub version: String,
    /// Current timestamp
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// Detailed component checks
    pub checks: Vec<ComponentCheck>,
    /// Queue and session counts
    pub stats: ServiceStatus,
}

impl HealthCheck {
    /// Check every component of the service
    pub async fn check(service: &DebateService) -> Self {
        let mut checks = Vec::new();

        let running = service.is_running().await;
        checks.push(ComponentCheck {
            name: "service_running".to_string(),
            status: if running {
                HealthStatus::Healthy
            } else {
                HealthStatus::Unhealthy
            },
            message: (!running).then(|| "Service is not running".to_string()),
        });

        checks.push(match service.scheduler().queue_snapshot() {
            Ok(_) => ComponentCheck {
                name: "rating_queue".to_string(),
                status: HealthStatus::Healthy,
                message: None,
            },
            Err(e) => {
                error!("Queue health check failed: {}", e);
                ComponentCheck {
                    name: "rating_queue".to_string(),
                    status: HealthStatus::Unhealthy,
                    message: Some(e.to_string()),
                }
            }
        });

        let (stats, stats_check) = match service.status() {
            Ok(stats) => (
                stats,
                ComponentCheck {
                    name: "scheduler_stats".to_string(),
                    status: HealthStatus::Healthy,
                    message: None,
                },
            ),
            Err(e) => (
                ServiceStatus::default(),
                ComponentCheck {
                    name: "scheduler_stats".to_string(),
                    status: HealthStatus::Degraded,
                    message: Some(format!("Stats check failed: {}", e)),
                },
            ),
        };
        checks.push(stats_check);

        Self {
            status: overall_status(&checks),
            service: service.config().service.name.clone(),
            version: crate::VERSION.to_string(),
            timestamp: chrono::Utc::now(),
            checks,
            stats,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| anyhow::anyhow!("Failed to serialize health check: {}", e))
    }
}

/// Worst status among the component checks
fn overall_status(checks: &[ComponentCheck]) -> HealthStatus {
    if checks.iter().any(|c| c.status == HealthStatus::Unhealthy) {
        HealthStatus::Unhealthy
    } else if checks.iter().any(|c| c.status == HealthStatus::Degraded) {
        HealthStatus::Degraded
    } else {
        HealthStatus::Healthy
    }
}
