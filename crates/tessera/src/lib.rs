//! # Tessera
//!
//! **Configuration-driven HTTP middleware assembly.**
//!
//! A tessera instance is described by a configuration document. Starting from
//! that document, the instance:
//!
//! 1. follows its `baseConfig`/`extends` chain and resolves protocol
//!    references such as `path:`, `env:` or `base64:` ([`config`]);
//! 2. fills derived values from `breakDown` rules and validates the result;
//! 3. unions the configured middlewares with the ones given in code, orders
//!    them, instantiates each through its factory and mounts it, scoped by
//!    path, method and host ([`middleware`]);
//! 4. serves the pipeline over HTTP ([`server`]).
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tessera::middleware::{ModuleRegistry, SyncFactory};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), tessera::TesseraError> {
//!     let modules = ModuleRegistry::new().with("static", SyncFactory::new(serve_static));
//!
//!     tessera::Tessera::builder()
//!         .modules(modules)
//!         .build("config/app.json")
//!         .await?
//!         .start()
//!         .await
//! }
//! ```
//!
//! ```text
//! config/app.json ─▶ ConfigLoader ─▶ breakDown ─▶ validate ─▶ MiddlewareAssembler ─▶ PipelineMounter ─▶ Server
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod error;
mod instance;

pub use error::{TesseraError, TesseraResult};
pub use instance::{tessera, Tessera, TesseraBuilder, COOKIE_STAGE, CORS_STAGE};

// Re-export the building blocks
pub use tessera_config as config;
pub use tessera_middleware as middleware;
pub use tessera_server as server;
pub use tessera_telemetry as telemetry;

pub use tessera_config::{ConfigError, DocumentSource, LogLevel, ProtocolRegistry, TesseraConfig};
pub use tessera_middleware::{MiddlewareSpec, MountError, Precedence};
pub use tessera_server::{EngineSettings, ShutdownSignal};

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use tessera::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{tessera, Tessera, TesseraError};
    pub use tessera_config::{ProtocolRegistry, TesseraConfig};
    pub use tessera_middleware::{
        BoxFuture, FactoryContext, FnFactory, FnMiddleware, HandlerError, HandlerResult,
        InstanceFactory, Middleware, MiddlewareContext, MiddlewareSpec, ModuleRegistry, Next,
        Precedence, Request, Response, SyncFactory,
    };
    pub use tessera_server::ShutdownSignal;
}
