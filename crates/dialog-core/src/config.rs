//! Configuration for the signaling core.
//!
//! Every field is optional in TOML and falls back to its default. Durations
//! are written in milliseconds:
//!
//! ```toml
//! [timers]
//! t1 = 500
//! reliable = false
//!
//! [orchestrator]
//! terminated_pair_ttl = 32000
//! reaper_interval = 5000
//!
//! [logging]
//! level = "debug"
//! json = true
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sipbridge_transaction_core::timer::duration_ms;
use sipbridge_transaction_core::TimerSettings;

use crate::error::{DialogError, DialogResult};
use crate::logging::{parse_log_level, LoggingConfig};

/// Eviction policy for terminated call leg pairs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// How long a terminated pair stays queryable
    #[serde(with = "duration_ms")]
    pub terminated_pair_ttl: Duration,
    /// Period of the background reaper
    #[serde(with = "duration_ms")]
    pub reaper_interval: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            terminated_pair_ttl: Duration::from_secs(32),
            reaper_interval: Duration::from_secs(5),
        }
    }
}

impl OrchestratorConfig {
    pub fn with_terminated_pair_ttl(mut self, ttl: Duration) -> Self {
        self.terminated_pair_ttl = ttl;
        self
    }

    pub fn with_reaper_interval(mut self, interval: Duration) -> Self {
        self.reaper_interval = interval;
        self
    }

    pub fn validate(&self) -> DialogResult<()> {
        if self.reaper_interval.is_zero() {
            return Err(DialogError::Config("reaper_interval must be greater than zero".to_string()));
        }
        Ok(())
    }
}

/// Logging section of [`SipBridgeConfig`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    pub level: String,
    pub json: bool,
    pub file_info: bool,
    pub spans: bool,
    pub app_name: String,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file_info: false,
            spans: false,
            app_name: "sipbridge".to_string(),
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SipBridgeConfig {
    pub timers: TimerSettings,
    pub orchestrator: OrchestratorConfig,
    pub logging: LogSettings,
}

impl SipBridgeConfig {
    /// Parses and validates TOML text.
    pub fn from_toml_str(text: &str) -> DialogResult<Self> {
        let config: Self = toml::from_str(text).map_err(|e| DialogError::Config(e.to_string()))?;
        config.orchestrator.validate()?;
        parse_log_level(&config.logging.level)?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> DialogResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| DialogError::Config(format!("Cannot read {}: {}", path.display(), e)))?;
        Self::from_toml_str(&text)
    }

    /// The [`LoggingConfig`] described by the logging section.
    pub fn logging_config(&self) -> DialogResult<LoggingConfig> {
        let mut config = LoggingConfig::new(parse_log_level(&self.logging.level)?, self.logging.app_name.clone());
        if self.logging.json {
            config = config.with_json();
        }
        if self.logging.file_info {
            config = config.with_file_info();
        }
        if self.logging.spans {
            config = config.with_spans();
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = SipBridgeConfig::from_toml_str("").unwrap();
        assert_eq!(config, SipBridgeConfig::default());
        assert_eq!(config.timers.t1, Duration::from_millis(500));
        assert_eq!(config.orchestrator.terminated_pair_ttl, Duration::from_secs(32));
    }

    #[test]
    fn test_partial_document() {
        let config = SipBridgeConfig::from_toml_str(
            r#"
            [timers]
            t1 = 250
            reliable = true

            [orchestrator]
            terminated_pair_ttl = 1000

            [logging]
            level = "debug"
            json = true
            "#,
        )
        .unwrap();

        assert_eq!(config.timers.t1, Duration::from_millis(250));
        assert_eq!(config.timers.timer_b(), Duration::from_secs(16));
        assert!(config.timers.reliable);
        assert_eq!(config.timers.timer_k(), Duration::ZERO);
        assert_eq!(config.orchestrator.terminated_pair_ttl, Duration::from_secs(1));
        assert_eq!(config.orchestrator.reaper_interval, Duration::from_secs(5));

        let logging = config.logging_config().unwrap();
        assert_eq!(logging.level, tracing::Level::DEBUG);
        assert!(logging.json);
        assert!(!logging.file_info);
    }

    #[test]
    fn test_invalid_values_are_config_errors() {
        assert!(matches!(
            SipBridgeConfig::from_toml_str("[orchestrator]\nreaper_interval = 0"),
            Err(DialogError::Config(_))
        ));
        assert!(matches!(
            SipBridgeConfig::from_toml_str("[logging]\nlevel = \"loud\""),
            Err(DialogError::Config(_))
        ));
        assert!(matches!(
            SipBridgeConfig::from_toml_str("[timers]\nt1 = \"fast\""),
            Err(DialogError::Config(_))
        ));
    }
}
