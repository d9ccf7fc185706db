//! Top-level error type.

use tessera_config::ConfigError;
use tessera_middleware::MountError;
use tessera_server::ServerError;
use tessera_telemetry::TelemetryError;
use thiserror::Error;

/// Anything that can go wrong assembling or running an instance.
#[derive(Debug, Error)]
pub enum TesseraError {
    /// Loading, resolving or validating the configuration failed.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A middleware could not be mounted.
    #[error(transparent)]
    Mount(#[from] MountError),

    /// The server failed.
    #[error(transparent)]
    Server(#[from] ServerError),

    /// Logging could not be set up.
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),
}

/// Result type for instance operations.
pub type TesseraResult<T> = Result<T, TesseraError>;
