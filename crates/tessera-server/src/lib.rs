//! # Tessera Server
//!
//! The HTTP engine behind a tessera instance: a hyper HTTP/1.1 listener that
//! feeds every request into a middleware [`Pipeline`](tessera_middleware::Pipeline).
//!
//! - Listener address from `server.listener` (default `0.0.0.0:8080`)
//! - Free-form engine settings from `server.express` ([`EngineSettings`])
//! - Graceful shutdown on SIGTERM/SIGINT or an explicit [`ShutdownSignal`]

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod config;
mod error;
mod server;
mod settings;
pub mod shutdown;

pub use config::{
    ServerConfig, ServerConfigBuilder, DEFAULT_MAX_BODY_SIZE, DEFAULT_REQUEST_TIMEOUT_SECS,
    DEFAULT_SHUTDOWN_TIMEOUT_SECS,
};
pub use error::ServerError;
pub use server::{ClientAddr, Server};
pub use settings::EngineSettings;
pub use shutdown::{ConnectionTracker, ShutdownSignal};
