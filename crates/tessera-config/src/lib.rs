//! Configuration resolution for tessera.
//!
//! Turns a configuration source into a validated, typed configuration:
//!
//! 1. [`ConfigLoader`] reads the document, resolves its protocol references
//!    (see [`protocol`]) and follows its `baseConfig`/`extends` chain, merging
//!    each document over its bases with [`merge`].
//! 2. [`apply_breakdown`] fills unset properties from the document's
//!    `breakDown` rules.
//! 3. [`validate`] checks the shape of the result and returns a
//!    [`TesseraConfig`].
//!
//! # Example
//!
//! ```no_run
//! use tessera_config::{validate, ConfigLoader};
//!
//! # async fn run() -> Result<(), tessera_config::ConfigError> {
//! let document = ConfigLoader::new().resolve("config/app.json").await?;
//! let config = validate(&document)?;
//!
//! println!("listening on {}:{}", config.listener_host(), config.listener_port());
//! # Ok(())
//! # }
//! ```
//!
//! # Document format
//!
//! ```json
//! {
//!   "baseConfig": "path:../shared/base.json",
//!   "extends": ["logging.json"],
//!   "server": {
//!     "listener": { "host": "127.0.0.1", "port": "env:PORT" },
//!     "logLevel": "info",
//!     "express": { "trust proxy": true }
//!   },
//!   "globals": { "title": "My site" },
//!   "middlewares": {
//!     "static": { "module": "serve-static", "order": 10, "paths": "/assets",
//!                 "config": { "root": "path:public" } }
//!   },
//!   "breakDown": { "server.listener.port": ["ports.http", "ports.fallback"] }
//! }
//! ```
//!
//! TOML documents (`.toml`) use the same layout.

#![warn(missing_docs)]

pub mod breakdown;
mod config;
pub mod document;
mod error;
mod loader;
mod merge;
pub mod protocol;
mod schema;

pub use breakdown::{apply_breakdown, BreakdownRule};
pub use config::*;
pub use document::DocumentSource;
pub use error::{BoxError, ConfigError};
pub use loader::{ConfigLoader, BASE_CONFIG_KEY, EXTENDS_KEY};
pub use merge::{merge, merge_all};
pub use protocol::{FnResolver, ProtocolRegistry, ProtocolResolver};
pub use schema::{validate, TOP_LEVEL_KEYS};
