//! Configuration error types.

use std::path::PathBuf;
use thiserror::Error;

/// Boxed error returned by protocol resolvers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur while loading, resolving or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration document not found.
    #[error("configuration document not found: {path}")]
    DocumentNotFound {
        /// Path to the missing document.
        path: PathBuf,
    },

    /// Failed to read a configuration document.
    #[error("failed to read configuration document: {path}")]
    ReadError {
        /// Path to the document.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The document content is malformed.
    #[error("failed to parse configuration document {path}: {reason}")]
    ParseError {
        /// Path to the document.
        path: PathBuf,
        /// Parser message.
        reason: String,
    },

    /// A protocol resolver failed.
    #[error("failed to resolve `{value}` with the `{scheme}` protocol")]
    ProtocolResolution {
        /// Scheme of the failing reference.
        scheme: String,
        /// The full embedded string.
        value: String,
        /// Resolver error.
        #[source]
        source: BoxError,
    },

    /// A document inherits from itself.
    #[error("cyclic configuration inheritance: {} (chain: {})", path.display(), format_chain(chain))]
    CyclicInheritance {
        /// The document that was reached a second time.
        path: PathBuf,
        /// The documents currently being loaded, outermost first.
        chain: Vec<PathBuf>,
    },

    /// Unknown field in configuration.
    #[error("unknown configuration field: {field} in section {section}")]
    UnknownField {
        /// The unknown field name.
        field: String,
        /// The section containing the field.
        section: String,
    },

    /// Invalid configuration value.
    #[error("invalid configuration value for {field}: {reason}")]
    InvalidValue {
        /// The field with the invalid value.
        field: String,
        /// Explanation of why the value is invalid.
        reason: String,
    },

    /// Missing required field.
    #[error("missing required configuration field: {field}")]
    MissingField {
        /// The missing field name.
        field: String,
    },
}

impl ConfigError {
    /// Create a new document not found error.
    pub fn document_not_found(path: impl Into<PathBuf>) -> Self {
        Self::DocumentNotFound { path: path.into() }
    }

    /// Create a new read error.
    pub fn read_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::ReadError {
            path: path.into(),
            source,
        }
    }

    /// Create a new parse error.
    pub fn parse_error(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::ParseError {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a new unknown field error.
    pub fn unknown_field(field: impl Into<String>, section: impl Into<String>) -> Self {
        Self::UnknownField {
            field: field.into(),
            section: section.into(),
        }
    }

    /// Create a new invalid value error.
    pub fn invalid_value(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create a new missing field error.
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }

    /// Returns true for errors raised by schema validation.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::UnknownField { .. } | Self::InvalidValue { .. } | Self::MissingField { .. }
        )
    }
}

fn format_chain(chain: &[PathBuf]) -> String {
    chain
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}
