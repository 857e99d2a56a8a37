//! Configuration management

use crate::error::{ErrorContext, PortalError, PortalResult};
use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Session timing options, all in milliseconds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Inactivity window after which the session expires
    pub session_timeout_ms: u64,
    /// Remaining time at or below which the expiry warning is shown
    pub warning_threshold_ms: u64,
    /// Period of the per-view session poll
    pub poll_interval_ms: u64,
    /// Period of the proactive token refresh
    pub refresh_interval_ms: u64,
    /// Minimum spacing between activity dispatches
    pub activity_debounce_ms: u64,
    /// Period of the global inactivity check
    pub timeout_check_interval_ms: u64,
    /// Upper bound for a single token refresh call
    pub refresh_timeout_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_timeout_ms: 30 * 60 * 1000,
            warning_threshold_ms: 5 * 60 * 1000,
            poll_interval_ms: 30 * 1000,
            refresh_interval_ms: 14 * 60 * 1000,
            activity_debounce_ms: 1000,
            timeout_check_interval_ms: 60 * 1000,
            refresh_timeout_ms: 10 * 1000,
        }
    }
}

impl SessionConfig {
    pub fn validate(&self) -> PortalResult<()> {
        let positive = [
            ("session.session_timeout_ms", self.session_timeout_ms),
            ("session.warning_threshold_ms", self.warning_threshold_ms),
            ("session.poll_interval_ms", self.poll_interval_ms),
            ("session.refresh_interval_ms", self.refresh_interval_ms),
            (
                "session.timeout_check_interval_ms",
                self.timeout_check_interval_ms,
            ),
            ("session.refresh_timeout_ms", self.refresh_timeout_ms),
        ];

        for (field, value) in positive {
            if value == 0 {
                return Err(PortalError::Validation {
                    message: format!("{} must be greater than 0", field),
                    field: Some(field.to_string()),
                    context: ErrorContext::new("config")
                        .with_operation("validate")
                        .with_suggestion("Set the value to a positive number of milliseconds"),
                });
            }
        }

        if self.warning_threshold_ms >= self.session_timeout_ms {
            return Err(PortalError::Validation {
                message: "warning_threshold_ms must be lower than session_timeout_ms".to_string(),
                field: Some("session.warning_threshold_ms".to_string()),
                context: ErrorContext::new("config")
                    .with_operation("validate")
                    .with_metadata("session_timeout_ms", &self.session_timeout_ms.to_string())
                    .with_suggestion("Lower the warning threshold or raise the timeout"),
            });
        }

        Ok(())
    }
}

/// Navigation options
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigationConfig {
    /// Maximum retained navigation history entries; unbounded when unset
    pub history_limit: Option<usize>,
    /// TOML menu catalog replacing the built-in menus
    pub menu_catalog_path: Option<PathBuf>,
    /// TOML route table replacing the built-in routes
    pub route_table_path: Option<PathBuf>,
}

/// Top-level configuration file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PortalConfig {
    pub session: SessionConfig,
    pub navigation: NavigationConfig,
    pub logging: LoggingConfig,
}

impl PortalConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> PortalResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| PortalError::Config {
            message: format!("Failed to read config file: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config")
                .with_operation("read_file")
                .with_suggestion("Check if the config file exists and is readable"),
        })?;

        Self::from_toml_str(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> PortalResult<Self> {
        toml::from_str(content).map_err(|e| PortalError::Config {
            message: format!("Failed to parse config: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config")
                .with_operation("parse_toml")
                .with_suggestion("Check TOML syntax in config file"),
        })
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> PortalResult<()> {
        let content = toml::to_string_pretty(self).map_err(|e| PortalError::Config {
            message: format!("Failed to serialize config: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config").with_operation("serialize_toml"),
        })?;

        std::fs::write(path, content).map_err(|e| PortalError::Config {
            message: format!("Failed to write config file: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config")
                .with_operation("write_file")
                .with_suggestion("Check if the directory exists and is writable"),
        })?;

        Ok(())
    }

    pub fn validate(&self) -> PortalResult<()> {
        self.session.validate()?;

        if self.navigation.history_limit == Some(0) {
            return Err(PortalError::Validation {
                message: "navigation.history_limit must keep at least one entry".to_string(),
                field: Some("navigation.history_limit".to_string()),
                context: ErrorContext::new("config")
                    .with_operation("validate")
                    .with_suggestion("Remove the key for unbounded history"),
            });
        }

        Ok(())
    }
}
