//! Logging setup for tessera.
//!
//! Installs a global `tracing` subscriber whose verbosity follows the
//! `server.logLevel` setting of the resolved configuration.
//!
//! # Example
//!
//! ```rust,ignore
//! use tessera_config::LogLevel;
//! use tessera_telemetry::{init_logging, LogConfig};
//!
//! init_logging(&LogConfig::from(LogLevel::Debug))?;
//! tracing::debug!("visible");
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod error;
pub mod logging;

pub use error::TelemetryError;
pub use logging::{create_env_filter, filter_directive, init_logging, LogConfig};

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;
