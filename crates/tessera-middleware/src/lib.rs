//! # Tessera Middleware
//!
//! Middleware assembly and the request pipeline for tessera.
//!
//! Middlewares come from two places: the `middlewares` section of the
//! configuration and [`MiddlewareSpec`]s built in code. The
//! [`MiddlewareAssembler`] unions the two by name and orders the result; the
//! [`PipelineMounter`] turns every spec into a live [`Middleware`] through its
//! factory and mounts it, scoped, onto a [`Pipeline`].
//!
//! ```text
//! config.middlewares ─┐
//!                     ├─▶ MiddlewareAssembler ─▶ [spec, spec, …] ─▶ PipelineMounter ─▶ Pipeline
//! programmatic specs ─┘        (union, sort)                        (load, create, mount)
//! ```
//!
//! ## Scopes
//!
//! Each mounted middleware only sees requests matching its scope:
//!
//! | Restriction | Matches                                          |
//! |-------------|--------------------------------------------------|
//! | `paths`     | path prefixes, on segment boundaries (default `/`) |
//! | `methods`   | HTTP methods, case-insensitive                   |
//! | `hosts`     | host patterns, `*` matching one label            |
//!
//! A request that no middleware answers gets `404`. A failure returned by a
//! middleware is translated into a status-only response by the
//! [`ErrorTranslator`](stages::ErrorTranslator).
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use http::StatusCode;
//! use tessera_middleware::{
//!     InstanceFactory, MiddlewareAssembler, MiddlewareSpec, ModuleRegistry, Pipeline,
//!     PipelineMounter, StatusResponder,
//! };
//!
//! # tokio_test::block_on(async {
//! let modules = ModuleRegistry::new()
//!     .with("teapot", InstanceFactory(Arc::new(StatusResponder(StatusCode::IM_A_TEAPOT))));
//!
//! let specs = MiddlewareAssembler::new().assemble_specs(
//!     vec![MiddlewareSpec::new("tea", "teapot").paths(["/tea"])],
//!     Vec::new(),
//! );
//!
//! let mut builder = Pipeline::builder();
//! PipelineMounter::new(Arc::new(modules))
//!     .mount_all(&mut builder, &specs)
//!     .await
//!     .unwrap();
//!
//! let pipeline = builder.build();
//! assert_eq!(pipeline.names(), ["tea"]);
//! # });
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod assembler;
pub mod context;
pub mod error;
pub mod loader;
pub mod middleware;
pub mod mounter;
pub mod pipeline;
pub mod scope;
pub mod spec;
pub mod stages;
pub mod types;

pub use assembler::{MiddlewareAssembler, Precedence};
pub use context::{MiddlewareContext, RequestId};
pub use error::{BoxError, HandlerError, MountError, ScopeError};
pub use loader::{
    shared_globals, FactoryContext, FnFactory, InstanceFactory, MiddlewareFactory, ModuleLoader,
    ModuleRegistry, SharedGlobals, SyncFactory,
};
pub use middleware::{BoxFuture, FnMiddleware, HandlerResult, Middleware, Next, StatusResponder};
pub use mounter::PipelineMounter;
pub use pipeline::{Mount, MountedMiddleware, Pipeline, PipelineBuilder};
pub use scope::{request_host, HostPattern, Scope};
pub use spec::{MiddlewareModule, MiddlewareSpec};
pub use types::{empty_response, Request, Response};
