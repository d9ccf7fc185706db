//! Error types for pipeline assembly and request handling.

use http::StatusCode;
use thiserror::Error;

/// Boxed error used by middleware factories and handlers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A failure raised by a middleware while serving a request.
///
/// Carries an optional HTTP status. The error translator turns it into a
/// response with that status (500 when absent) and an empty body; the
/// message never reaches the client.
///
/// ```
/// use http::StatusCode;
/// use tessera_middleware::HandlerError;
///
/// let err = HandlerError::with_status(StatusCode::NOT_IMPLEMENTED, "not yet");
/// assert_eq!(err.status(), Some(StatusCode::NOT_IMPLEMENTED));
///
/// let err = HandlerError::new("database unavailable");
/// assert_eq!(err.status(), None);
/// ```
#[derive(Debug, Error)]
#[error("request handling failed: {source}")]
pub struct HandlerError {
    status: Option<StatusCode>,
    source: BoxError,
}

impl HandlerError {
    /// A failure without a status.
    pub fn new(source: impl Into<BoxError>) -> Self {
        Self {
            status: None,
            source: source.into(),
        }
    }

    /// A failure carrying an HTTP status.
    pub fn with_status(status: StatusCode, source: impl Into<BoxError>) -> Self {
        Self {
            status: Some(status),
            source: source.into(),
        }
    }

    /// A failure that is nothing but a status.
    #[must_use]
    pub fn from_status(status: StatusCode) -> Self {
        Self::with_status(status, format!("HTTP {status}"))
    }

    /// The carried status, if any.
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    /// The status to respond with.
    #[must_use]
    pub fn response_status(&self) -> StatusCode {
        self.status.unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// The underlying error.
    #[must_use]
    pub fn inner(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
        self.source.as_ref()
    }
}

/// Invalid scope declaration.
#[derive(Debug, Error)]
pub enum ScopeError {
    /// Not an HTTP method token.
    #[error("invalid HTTP method `{0}`")]
    InvalidMethod(String),

    /// A host pattern could not be compiled.
    #[error("invalid host pattern `{pattern}`")]
    InvalidHost {
        /// The pattern as written.
        pattern: String,
        /// Compilation error.
        #[source]
        source: regex::Error,
    },
}

/// Errors that abort pipeline assembly.
#[derive(Debug, Error)]
pub enum MountError {
    /// The module loader has no module by that name.
    #[error("middleware `{name}`: module `{module}` not found")]
    ModuleNotFound {
        /// Middleware name.
        name: String,
        /// Module reference.
        module: String,
    },

    /// The factory failed to build the middleware.
    #[error("middleware `{name}` failed to instantiate")]
    Instantiation {
        /// Middleware name.
        name: String,
        /// Factory error.
        #[source]
        source: BoxError,
    },

    /// The middleware's scope is malformed.
    #[error("middleware `{name}` has an invalid scope")]
    InvalidScope {
        /// Middleware name.
        name: String,
        /// Scope error.
        #[source]
        source: ScopeError,
    },
}

impl MountError {
    /// Name of the middleware that failed.
    #[must_use]
    pub fn middleware_name(&self) -> &str {
        match self {
            Self::ModuleNotFound { name, .. }
            | Self::Instantiation { name, .. }
            | Self::InvalidScope { name, .. } => name,
        }
    }
}
