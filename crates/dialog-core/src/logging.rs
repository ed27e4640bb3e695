//! Process-wide `tracing` subscriber setup.

use std::str::FromStr;

use tracing::Level;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{fmt, EnvFilter};

use crate::error::{DialogError, DialogResult};

/// How the global subscriber formats and filters events
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Minimum level, combined with `RUST_LOG` directives
    pub level: Level,
    pub json: bool,
    /// Include file and line of each event
    pub file_info: bool,
    /// Log span enter/exit
    pub log_spans: bool,
    pub app_name: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: Level::INFO,
            json: false,
            file_info: false,
            log_spans: false,
            app_name: "sipbridge".to_string(),
        }
    }
}

impl LoggingConfig {
    pub fn new(level: Level, app_name: impl Into<String>) -> Self {
        LoggingConfig {
            level,
            app_name: app_name.into(),
            ..Default::default()
        }
    }

    pub fn with_json(mut self) -> Self {
        self.json = true;
        self
    }

    pub fn with_file_info(mut self) -> Self {
        self.file_info = true;
        self
    }

    pub fn with_spans(mut self) -> Self {
        self.log_spans = true;
        self
    }
}

/// Installs the global subscriber. Fails if one is already installed.
pub fn setup_logging(config: LoggingConfig) -> DialogResult<()> {
    let filter = EnvFilter::from_default_env().add_directive(config.level.into());
    let span_events = if config.log_spans {
        FmtSpan::ACTIVE
    } else {
        FmtSpan::NONE
    };

    let builder = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_span_events(span_events)
        .with_file(config.file_info)
        .with_line_number(config.file_info);

    let installed = if config.json {
        builder.with_writer(std::io::stdout).json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| DialogError::Logging(e.to_string()))?;

    tracing::info!(app = %config.app_name, level = %config.level, "Logging initialized");
    Ok(())
}

pub fn parse_log_level(level: &str) -> DialogResult<Level> {
    Level::from_str(level).map_err(|_| DialogError::Config(format!("Invalid log level: {}", level)))
}
