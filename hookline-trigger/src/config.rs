//! Trigger configuration
//!
//! Defines the tunables of the trigger engine: environment wait windows,
//! poll intervals and the identities stamped on created runs and environments.

use std::time::Duration;

/// Trigger engine configuration
///
/// All timeouts and intervals are configurable to allow tuning
/// for different clusters (fast local clusters vs slow shared ones).
#[derive(Debug, Clone)]
pub struct TriggerConfig {
    /// Maximum time to wait for an ephemeral environment to become ready,
    /// and again for it to disappear after deletion
    pub env_start_timeout: Duration,

    /// How often to poll the runtime for environment status
    pub env_poll_interval: Duration,

    /// How often to poll the execution store for task status
    pub task_poll_interval: Duration,

    /// Creator identity stamped on webhook-created runs
    pub task_creator: String,

    /// Identity stamped on cloned environments
    pub system_user: String,

    /// Link rendered in feedback comments (e.g. "https://ci.example.com")
    pub base_uri: Option<String>,

    /// Attempts at generating an environment name that is not taken
    pub name_attempts: usize,
}

impl TriggerConfig {
    /// Creates a new configuration with defaults
    pub fn new() -> Self {
        Self {
            env_start_timeout: Duration::from_secs(600),
            env_poll_interval: Duration::from_secs(1),
            task_poll_interval: Duration::from_secs(1),
            task_creator: "webhook".to_string(),
            system_user: "system".to_string(),
            base_uri: None,
            name_attempts: 8,
        }
    }

    /// Creates configuration from environment variables
    ///
    /// Expected environment variables (all optional):
    /// - HOOKLINE_ENV_START_TIMEOUT (seconds, default: 600)
    /// - HOOKLINE_ENV_POLL_INTERVAL (seconds, default: 1)
    /// - HOOKLINE_TASK_POLL_INTERVAL (seconds, default: 1)
    /// - HOOKLINE_TASK_CREATOR (default: webhook)
    /// - HOOKLINE_SYSTEM_USER (default: system)
    /// - HOOKLINE_BASE_URI
    /// - HOOKLINE_NAME_ATTEMPTS (default: 8)
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::new();

        let env_start_timeout = secs_from_env("HOOKLINE_ENV_START_TIMEOUT")?
            .unwrap_or(defaults.env_start_timeout);
        let env_poll_interval = secs_from_env("HOOKLINE_ENV_POLL_INTERVAL")?
            .unwrap_or(defaults.env_poll_interval);
        let task_poll_interval = secs_from_env("HOOKLINE_TASK_POLL_INTERVAL")?
            .unwrap_or(defaults.task_poll_interval);

        let task_creator =
            std::env::var("HOOKLINE_TASK_CREATOR").unwrap_or(defaults.task_creator);
        let system_user = std::env::var("HOOKLINE_SYSTEM_USER").unwrap_or(defaults.system_user);
        let base_uri = std::env::var("HOOKLINE_BASE_URI").ok();

        let name_attempts = match std::env::var("HOOKLINE_NAME_ATTEMPTS") {
            Ok(raw) => raw.parse::<usize>().map_err(|e| {
                anyhow::anyhow!("HOOKLINE_NAME_ATTEMPTS is not a number ({}): {}", raw, e)
            })?,
            Err(_) => defaults.name_attempts,
        };

        Ok(Self {
            env_start_timeout,
            env_poll_interval,
            task_poll_interval,
            task_creator,
            system_user,
            base_uri,
            name_attempts,
        })
    }

    pub fn with_env_start_timeout(mut self, timeout: Duration) -> Self {
        self.env_start_timeout = timeout;
        self
    }

    pub fn with_poll_intervals(mut self, env: Duration, task: Duration) -> Self {
        self.env_poll_interval = env;
        self.task_poll_interval = task;
        self
    }

    pub fn with_base_uri(mut self, base_uri: impl Into<String>) -> Self {
        self.base_uri = Some(base_uri.into());
        self
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.env_start_timeout.is_zero() {
            anyhow::bail!("env_start_timeout must be greater than 0");
        }

        if self.env_poll_interval.is_zero() || self.task_poll_interval.is_zero() {
            anyhow::bail!("poll intervals must be greater than 0");
        }

        if self.env_poll_interval > self.env_start_timeout {
            anyhow::bail!("env_poll_interval cannot exceed env_start_timeout");
        }

        if self.task_creator.is_empty() {
            anyhow::bail!("task_creator cannot be empty");
        }

        if self.system_user.is_empty() {
            anyhow::bail!("system_user cannot be empty");
        }

        if self.name_attempts == 0 {
            anyhow::bail!("name_attempts must be greater than 0");
        }

        Ok(())
    }
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn secs_from_env(key: &str) -> anyhow::Result<Option<Duration>> {
    match std::env::var(key) {
        Ok(raw) => {
            let secs = raw
                .parse::<u64>()
                .map_err(|e| anyhow::anyhow!("{} is not a number of seconds ({}): {}", key, raw, e))?;
            Ok(Some(Duration::from_secs(secs)))
        }
        Err(_) => Ok(None),
    }
}
