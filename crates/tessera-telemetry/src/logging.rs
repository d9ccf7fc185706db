//! Structured logging.
//!
//! JSON lines by default, or a human-readable format for development. The
//! filter is built from a [`LogLevel`] plus optional per-target directives.

use tessera_config::LogLevel;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::error::TelemetryError;
use crate::TelemetryResult;

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Base verbosity.
    pub level: LogLevel,

    /// Extra filter directives, e.g. `hyper=warn`.
    pub directives: Vec<String>,

    /// Whether to output JSON format.
    pub json_format: bool,

    /// Whether to include span events (new, close).
    pub span_events: bool,

    /// Whether to include file/line info.
    pub file_line_info: bool,

    /// Whether to include target (module path).
    pub include_target: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            directives: Vec::new(),
            json_format: true,
            span_events: false,
            file_line_info: false,
            include_target: true,
        }
    }
}

impl From<LogLevel> for LogConfig {
    fn from(level: LogLevel) -> Self {
        Self {
            level,
            ..Self::default()
        }
    }
}

impl LogConfig {
    /// Human-readable output at `debug`, with span events and source locations.
    #[must_use]
    pub fn development() -> Self {
        Self {
            level: LogLevel::Debug,
            directives: Vec::new(),
            json_format: false,
            span_events: true,
            file_line_info: true,
            include_target: true,
        }
    }

    /// Adds a filter directive.
    #[must_use]
    pub fn directive(mut self, directive: impl Into<String>) -> Self {
        self.directives.push(directive.into());
        self
    }

    /// Whether anything is logged at all.
    #[must_use]
    pub fn enabled(&self) -> bool {
        filter_directive(self.level).is_some()
    }

    /// The full filter string, or `None` when logging is off.
    #[must_use]
    pub fn filter(&self) -> Option<String> {
        let base = filter_directive(self.level)?;
        let mut parts = vec![base.to_string()];
        parts.extend(self.directives.iter().cloned());
        Some(parts.join(","))
    }
}

/// The `tracing` level directive for a configured level.
///
/// `fatal` has no `tracing` equivalent and maps to `error`; `silent` turns
/// logging off and yields `None`.
#[must_use]
pub const fn filter_directive(level: LogLevel) -> Option<&'static str> {
    match level {
        LogLevel::Fatal | LogLevel::Error => Some("error"),
        LogLevel::Warn => Some("warn"),
        LogLevel::Info => Some("info"),
        LogLevel::Debug => Some("debug"),
        LogLevel::Trace => Some("trace"),
        LogLevel::Silent => None,
    }
}

/// Installs the global subscriber.
///
/// Does nothing when the level is `silent`.
///
/// # Errors
///
/// Returns [`TelemetryError::InvalidFilter`] for a malformed directive and
/// [`TelemetryError::LoggingInit`] if a global subscriber is already set.
pub fn init_logging(config: &LogConfig) -> TelemetryResult<()> {
    let Some(filter) = config.filter() else {
        return Ok(());
    };
    let filter = create_env_filter(&filter)?;

    let span_events = if config.span_events {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    if config.json_format {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_span_events(span_events)
            .with_file(config.file_line_info)
            .with_line_number(config.file_line_info)
            .with_target(config.include_target)
            .with_filter(filter);

        tracing_subscriber::registry()
            .with(fmt_layer)
            .try_init()
            .map_err(|e| TelemetryError::LoggingInit(e.to_string()))?;
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .pretty()
            .with_span_events(span_events)
            .with_file(config.file_line_info)
            .with_line_number(config.file_line_info)
            .with_target(config.include_target)
            .with_filter(filter);

        tracing_subscriber::registry()
            .with(fmt_layer)
            .try_init()
            .map_err(|e| TelemetryError::LoggingInit(e.to_string()))?;
    }

    Ok(())
}

/// Parses a filter string such as `info,tessera_config=debug`.
///
/// # Errors
///
/// Returns [`TelemetryError::InvalidFilter`] if the string does not parse.
pub fn create_env_filter(filter: &str) -> TelemetryResult<EnvFilter> {
    EnvFilter::try_new(filter).map_err(|e| TelemetryError::InvalidFilter {
        filter: filter.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LogConfig::default();
        assert!(config.enabled());
        assert!(config.json_format);
        assert_eq!(config.filter().as_deref(), Some("info"));
    }

    #[test]
    fn test_development_config() {
        let config = LogConfig::development();
        assert!(!config.json_format);
        assert!(config.span_events);
        assert_eq!(config.filter().as_deref(), Some("debug"));
    }

    #[test]
    fn test_level_mapping() {
        assert_eq!(filter_directive(LogLevel::Fatal), Some("error"));
        assert_eq!(filter_directive(LogLevel::Error), Some("error"));
        assert_eq!(filter_directive(LogLevel::Warn), Some("warn"));
        assert_eq!(filter_directive(LogLevel::Trace), Some("trace"));
        assert_eq!(filter_directive(LogLevel::Silent), None);
    }

    #[test]
    fn test_directives_appended() {
        let config = LogConfig::from(LogLevel::Warn).directive("tessera_config=debug");
        assert_eq!(config.filter().as_deref(), Some("warn,tessera_config=debug"));
    }

    #[test]
    fn test_silent_installs_nothing() {
        let config = LogConfig::from(LogLevel::Silent).directive("not a directive ===");
        assert!(!config.enabled());
        assert!(init_logging(&config).is_ok());
    }

    #[test]
    fn test_create_env_filter() {
        assert!(create_env_filter("info,hyper=warn").is_ok());
        assert!(matches!(
            create_env_filter("tessera=verbose"),
            Err(TelemetryError::InvalidFilter { .. })
        ));
    }
}
