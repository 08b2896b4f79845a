//! Application configuration.
//!
//! Configuration is loaded from environment variables with defaults suitable
//! for local development.

use serde::{Deserialize, Serialize};
use tenancy_org::ContextConfig;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Invalid configuration value.
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue {
        /// Configuration key.
        key: String,
        /// Error message.
        message: String,
    },
}

/// Configuration for [`CompositionRoot`](crate::CompositionRoot).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Capacity of the session event channel.
    pub session_event_capacity: usize,

    /// Organization context configuration.
    pub context: ContextConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            session_event_capacity: 64,
            context: ContextConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `TENANCY_SESSION_EVENT_CAPACITY`: Session event buffer (default: 64)
    /// - plus those read by [`ContextConfig::from_env`]
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            session_event_capacity: std::env::var("TENANCY_SESSION_EVENT_CAPACITY")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(default.session_event_capacity),
            context: ContextConfig::from_env(),
        }
    }

    /// Check that every value is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.session_event_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                key: "TENANCY_SESSION_EVENT_CAPACITY".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.context.membership_insert_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                key: "TENANCY_MEMBERSHIP_INSERT_ATTEMPTS".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}
