//! Operator configuration read from the environment.

use std::time::Duration;

use envconfig::Envconfig;
use thiserror::Error;

/// Errors raised while loading the configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read environment: {0}")]
    Env(#[from] envconfig::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Envconfig, Clone, Debug)]
pub struct OperatorConfig {
    /// Maximum number of reconciliations running at once.
    /// Env: RFO_CONCURRENCY
    #[envconfig(from = "RFO_CONCURRENCY", default = "3")]
    pub concurrency: usize,

    /// Seconds between health sweeps.
    /// Env: RFO_RESYNC_INTERVAL_SECS
    #[envconfig(from = "RFO_RESYNC_INTERVAL_SECS", default = "180")]
    pub resync_interval_secs: u64,

    /// Watch a single namespace instead of the whole cluster.
    /// Env: RFO_WATCH_NAMESPACE
    #[envconfig(from = "RFO_WATCH_NAMESPACE")]
    pub watch_namespace: Option<String>,

    #[envconfig(from = "RFO_METRICS_PORT", default = "9710")]
    pub metrics_port: u16,

    /// Pause after resetting a Sentinel.
    /// Env: RFO_SENTINEL_RESET_COOLDOWN_SECS
    #[envconfig(from = "RFO_SENTINEL_RESET_COOLDOWN_SECS", default = "30")]
    pub sentinel_reset_cooldown_secs: u64,

    /// Cap on waiting for created objects to become ready.
    /// Env: RFO_READY_TIMEOUT_SECS
    #[envconfig(from = "RFO_READY_TIMEOUT_SECS", default = "300")]
    pub ready_timeout_secs: u64,

    /// Connection timeout for Redis and Sentinel nodes.
    /// Env: RFO_REDIS_CONNECT_TIMEOUT_SECS
    #[envconfig(from = "RFO_REDIS_CONNECT_TIMEOUT_SECS", default = "10")]
    pub redis_connect_timeout_secs: u64,

    /// Timeout for a single Redis or Sentinel command.
    /// Env: RFO_REDIS_COMMAND_TIMEOUT_SECS
    #[envconfig(from = "RFO_REDIS_COMMAND_TIMEOUT_SECS", default = "30")]
    pub redis_command_timeout_secs: u64,
}

impl OperatorConfig {
    /// Load from the process environment and validate.
    pub fn load() -> Result<Self, ConfigError> {
        Self::init_from_env()?.validate()
    }

    pub fn validate(self) -> Result<Self, ConfigError> {
        if self.concurrency == 0 {
            return Err(ConfigError::Invalid(
                "RFO_CONCURRENCY must be at least 1".to_string(),
            ));
        }
        if self.resync_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "RFO_RESYNC_INTERVAL_SECS must be greater than 0".to_string(),
            ));
        }
        if self.ready_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "RFO_READY_TIMEOUT_SECS must be greater than 0".to_string(),
            ));
        }
        if self.redis_connect_timeout_secs == 0 || self.redis_command_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "Redis timeouts must be greater than 0".to_string(),
            ));
        }
        Ok(self)
    }

    pub fn resync_interval(&self) -> Duration {
        Duration::from_secs(self.resync_interval_secs)
    }

    pub fn sentinel_reset_cooldown(&self) -> Duration {
        Duration::from_secs(self.sentinel_reset_cooldown_secs)
    }

    pub fn ready_timeout(&self) -> Duration {
        Duration::from_secs(self.ready_timeout_secs)
    }

    pub fn redis_connect_timeout(&self) -> Duration {
        Duration::from_secs(self.redis_connect_timeout_secs)
    }

    pub fn redis_command_timeout(&self) -> Duration {
        Duration::from_secs(self.redis_command_timeout_secs)
    }
}
