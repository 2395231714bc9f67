//! Main application configuration
//!
//! This module defines the primary configuration structures for the debate-room
//! service, including environment variable and TOML loading and validation.

use crate::matchmaking::queue::QueueConfig;
use crate::matchmaking::scheduler::SchedulerConfig;
use crate::session::SessionConfig;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub service: ServiceSettings,
    pub matchmaking: MatchmakingSettings,
    pub session: SessionSettings,
}

/// Service-level settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// Service name for logging and metrics
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,
    /// How often the binary logs a status line
    pub status_interval_seconds: u64,
}

/// Rating queue and scheduler settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchmakingSettings {
    /// Rating difference accepted with no waiting
    pub base_range: u64,
    /// Tolerance added per elapsed expansion interval
    pub expansion_step: u64,
    /// Seconds of waiting per tolerance expansion
    pub expansion_interval_seconds: u64,
    /// Upper bound on the tolerance
    pub max_range: u64,
    /// Scheduler tick period in seconds
    pub match_check_interval_seconds: u64,
}

/// Debate session settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Whether sessions begin with an explicit readiness handshake
    pub require_readiness: bool,
    /// Freshness window for readiness signals
    pub readiness_window_seconds: u64,
    /// Period of the readiness check
    pub readiness_check_interval_seconds: u64,
    /// Preparation countdown length
    pub preparation_seconds: u64,
    /// Per-turn countdown length
    pub turn_seconds: u64,
    /// Total turns across both sides
    pub max_turns: u32,
    /// Maximum message length in characters
    pub max_message_length: usize,
    /// Transient send failures in a row before a participant counts as gone
    pub max_consecutive_send_failures: u32,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            name: "debate-room".to_string(),
            log_level: "info".to_string(),
            shutdown_timeout_seconds: 30,
            status_interval_seconds: 30,
        }
    }
}

impl Default for MatchmakingSettings {
    fn default() -> Self {
        let queue = QueueConfig::default();
        Self {
            base_range: queue.base_range,
            expansion_step: queue.expansion_step,
            expansion_interval_seconds: queue.expansion_interval.as_secs(),
            max_range: queue.max_range,
            match_check_interval_seconds: SchedulerConfig::default()
                .match_check_interval
                .as_secs(),
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        let session = SessionConfig::default();
        Self {
            require_readiness: session.require_readiness,
            readiness_window_seconds: session.readiness_window.as_secs(),
            readiness_check_interval_seconds: session.readiness_check_interval.as_secs(),
            preparation_seconds: session.preparation_seconds,
            turn_seconds: session.turn_seconds,
            max_turns: session.max_turns,
            max_message_length: session.max_message_length,
            max_consecutive_send_failures: session.max_consecutive_send_failures,
        }
    }
}

/// Read an environment variable and parse it, leaving `target` untouched when unset
fn override_from_env<T: FromStr>(target: &mut T, key: &str) -> Result<()> {
    if let Ok(raw) = env::var(key) {
        *target = raw
            .parse()
            .map_err(|_| anyhow!("Invalid {} value: {}", key, raw))?;
    }
    Ok(())
}

impl AppConfig {
    /// Load configuration from environment variables with fallback to defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        validate_config(&config)?;
        Ok(config)
    }

    /// Load configuration from a TOML file; environment variables still take precedence
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config = Self::from_toml_str(&raw)?;
        config.apply_env()?;
        validate_config(&config)?;
        Ok(config)
    }

    /// Parse configuration from TOML text without consulting the environment
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: AppConfig =
            toml::from_str(raw).map_err(|e| anyhow!("Invalid configuration file: {}", e))?;
        validate_config(&config)?;
        Ok(config)
    }

    fn apply_env(&mut self) -> Result<()> {
        // Service settings
        override_from_env(&mut self.service.name, "DEBATE_SERVICE_NAME")?;
        override_from_env(&mut self.service.log_level, "DEBATE_LOG_LEVEL")?;
        override_from_env(
            &mut self.service.shutdown_timeout_seconds,
            "DEBATE_SHUTDOWN_TIMEOUT_SECONDS",
        )?;
        override_from_env(
            &mut self.service.status_interval_seconds,
            "DEBATE_STATUS_INTERVAL_SECONDS",
        )?;

        // Matchmaking settings
        override_from_env(&mut self.matchmaking.base_range, "DEBATE_BASE_RANGE")?;
        override_from_env(&mut self.matchmaking.expansion_step, "DEBATE_EXPANSION_STEP")?;
        override_from_env(
            &mut self.matchmaking.expansion_interval_seconds,
            "DEBATE_EXPANSION_INTERVAL_SECONDS",
        )?;
        override_from_env(&mut self.matchmaking.max_range, "DEBATE_MAX_RANGE")?;
        override_from_env(
            &mut self.matchmaking.match_check_interval_seconds,
            "DEBATE_MATCH_CHECK_INTERVAL_SECONDS",
        )?;

        // Session settings
        override_from_env(
            &mut self.session.require_readiness,
            "DEBATE_REQUIRE_READINESS",
        )?;
        override_from_env(
            &mut self.session.readiness_window_seconds,
            "DEBATE_READINESS_WINDOW_SECONDS",
        )?;
        override_from_env(
            &mut self.session.readiness_check_interval_seconds,
            "DEBATE_READINESS_CHECK_INTERVAL_SECONDS",
        )?;
        override_from_env(
            &mut self.session.preparation_seconds,
            "DEBATE_PREPARATION_SECONDS",
        )?;
        override_from_env(&mut self.session.turn_seconds, "DEBATE_TURN_SECONDS")?;
        override_from_env(&mut self.session.max_turns, "DEBATE_MAX_TURNS")?;
        override_from_env(
            &mut self.session.max_message_length,
            "DEBATE_MAX_MESSAGE_LENGTH",
        )?;
        override_from_env(
            &mut self.session.max_consecutive_send_failures,
            "DEBATE_MAX_CONSECUTIVE_SEND_FAILURES",
        )?;

        Ok(())
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.service.shutdown_timeout_seconds)
    }

    /// Get status log interval as Duration
    pub fn status_interval(&self) -> Duration {
        Duration::from_secs(self.service.status_interval_seconds)
    }

    /// Rating queue configuration derived from the matchmaking settings
    pub fn queue_config(&self) -> QueueConfig {
        QueueConfig {
            base_range: self.matchmaking.base_range,
            expansion_step: self.matchmaking.expansion_step,
            expansion_interval: Duration::from_secs(self.matchmaking.expansion_interval_seconds),
            max_range: self.matchmaking.max_range,
        }
    }

    /// Scheduler configuration derived from the matchmaking settings
    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            match_check_interval: Duration::from_secs(
                self.matchmaking.match_check_interval_seconds,
            ),
        }
    }

    /// Session configuration derived from the session settings
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            require_readiness: self.session.require_readiness,
            readiness_window: Duration::from_secs(self.session.readiness_window_seconds),
            readiness_check_interval: Duration::from_secs(
                self.session.readiness_check_interval_seconds,
            ),
            preparation_seconds: self.session.preparation_seconds,
            turn_seconds: self.session.turn_seconds,
            max_turns: self.session.max_turns,
            max_message_length: self.session.max_message_length,
            max_consecutive_send_failures: self.session.max_consecutive_send_failures,
            ..SessionConfig::default()
        }
    }
}

/// Validate configuration values
pub fn validate_config(config: &AppConfig) -> Result<()> {
    // Validate log level
    match config.service.log_level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {}
        _ => return Err(anyhow!("Invalid log level: {}", config.service.log_level)),
    }

    if config.service.shutdown_timeout_seconds == 0 {
        return Err(anyhow!("Shutdown timeout must be greater than 0"));
    }
    if config.service.status_interval_seconds == 0 {
        return Err(anyhow!("Status interval must be greater than 0"));
    }

    // Matchmaking settings
    config.queue_config().validate()?;
    if config.matchmaking.match_check_interval_seconds == 0 {
        return Err(anyhow!("Match check interval must be greater than 0"));
    }

    // Session settings
    config.session_config().validate()?;

    Ok(())
}
