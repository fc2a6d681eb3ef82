// Copyright 2026-Present Tracekit contributors
// SPDX-License-Identifier: Apache-2.0

use crate::error::AgentError;
use std::env;

const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Configuration for the tracekit agent.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Logical name of the instrumented service.
    pub service_name: String,
    /// Deployment environment tag (e.g., production, staging).
    pub environment: Option<String>,
    /// Log level (e.g., trace, debug, info, warn, error).
    pub log_level: String,
    /// Whether transactions created by `run_in_transaction` are logged as
    /// they open and close.
    pub log_transactions: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            service_name: "unnamed-service".to_string(),
            environment: None,
            log_level: "info".to_string(),
            log_transactions: false,
        }
    }
}

impl AgentConfig {
    /// Create configuration from environment variables.
    pub fn from_env() -> Result<Self, AgentError> {
        let service_name =
            env::var("TRACEKIT_SERVICE_NAME").unwrap_or_else(|_| "unnamed-service".to_string());
        let environment = env::var("TRACEKIT_ENVIRONMENT").ok();
        let log_level = env::var("TRACEKIT_LOG_LEVEL")
            .map(|val| val.to_lowercase())
            .unwrap_or_else(|_| "info".to_string());
        let log_transactions = env::var("TRACEKIT_LOG_TRANSACTIONS")
            .map(|val| val.to_lowercase() == "true")
            .unwrap_or(false);

        let config = Self {
            service_name,
            environment,
            log_level,
            log_transactions,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), AgentError> {
        if self.service_name.is_empty() {
            return Err(AgentError::InvalidConfig(
                "service name must not be empty".to_string(),
            ));
        }

        if !VALID_LOG_LEVELS.contains(&self.log_level.as_str()) {
            return Err(AgentError::InvalidConfig(format!(
                "invalid log level: {}",
                self.log_level
            )));
        }

        if let Some(environment) = &self.environment {
            if environment.is_empty() {
                return Err(AgentError::InvalidConfig(
                    "environment must not be empty when set".to_string(),
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AgentConfig::default();
        assert_eq!(config.service_name, "unnamed-service");
        assert_eq!(config.environment, None);
        assert_eq!(config.log_level, "info");
        assert!(!config.log_transactions);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_service_name() {
        let config = AgentConfig {
            service_name: String::new(),
            ..AgentConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_unknown_log_level() {
        let config = AgentConfig {
            log_level: "verbose".to_string(),
            ..AgentConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("invalid log level"));
    }

    #[test]
    fn test_validate_rejects_empty_environment() {
        let config = AgentConfig {
            environment: Some(String::new()),
            ..AgentConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_all_log_levels_accepted() {
        for level in VALID_LOG_LEVELS {
            let config = AgentConfig {
                log_level: level.to_string(),
                ..AgentConfig::default()
            };
            assert!(config.validate().is_ok(), "level {level} should validate");
        }
    }
}
