//! The assembled middleware pipeline.
//!
//! A [`Pipeline`] is an ordered, immutable list of [`MountedMiddleware`]s. It
//! is built once at startup through a [`PipelineBuilder`] and then shared,
//! read-only, by every request.
//!
//! ```text
//! request ─▶ [cors] ─▶ [static /assets] ─▶ [api /api GET,POST] ─▶ … ─▶ 404
//!                 each stage runs only if its scope matches,
//!                 and hands over with next.run(..)
//! ```
//!
//! A failure returned by any middleware ends up in the [`ErrorTranslator`],
//! which turns it into a status-only response.

use std::fmt;
use std::sync::Arc;

use crate::context::MiddlewareContext;
use crate::middleware::{HandlerResult, Middleware, Next};
use crate::scope::Scope;
use crate::stages::ErrorTranslator;
use crate::types::{Request, Response};

/// A middleware bound to its scope.
#[derive(Clone)]
pub struct MountedMiddleware {
    name: String,
    scope: Scope,
    handler: Arc<dyn Middleware>,
}

impl MountedMiddleware {
    /// Binds `handler` to `scope`.
    pub fn new(name: impl Into<String>, scope: Scope, handler: Arc<dyn Middleware>) -> Self {
        Self {
            name: name.into(),
            scope,
            handler,
        }
    }

    /// Name the middleware was mounted under.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Requests this middleware receives.
    #[must_use]
    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// The handler.
    #[must_use]
    pub fn handler(&self) -> &Arc<dyn Middleware> {
        &self.handler
    }
}

impl fmt::Debug for MountedMiddleware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MountedMiddleware")
            .field("name", &self.name)
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

/// The mounting surface of an HTTP engine.
///
/// Middlewares are mounted one after another; requests visit them in
/// mounting order.
pub trait Mount {
    /// Mounts `handler` under `scope`.
    fn mount(&mut self, name: &str, scope: Scope, handler: Arc<dyn Middleware>);
}

/// Ordered, immutable middleware chain.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use http::StatusCode;
/// use tessera_middleware::{Mount, Pipeline, Scope, StatusResponder};
///
/// let mut builder = Pipeline::builder();
/// builder.mount("teapot", Scope::new().with_paths(["/tea"]), Arc::new(StatusResponder(StatusCode::IM_A_TEAPOT)));
/// let pipeline = builder.build();
///
/// assert_eq!(pipeline.names(), ["teapot"]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    middlewares: Vec<MountedMiddleware>,
    translator: ErrorTranslator,
}

impl Pipeline {
    /// Creates a new pipeline builder.
    #[must_use]
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    /// Runs a request through the chain, returning handler failures as-is.
    pub async fn dispatch(&self, ctx: &mut MiddlewareContext, request: Request) -> HandlerResult {
        Next::new(&self.middlewares).run(ctx, request).await
    }

    /// Runs a request through the chain with a fresh context, translating
    /// failures into status-only responses.
    pub async fn handle(&self, request: Request) -> Response {
        let mut ctx = MiddlewareContext::new();
        self.handle_with_context(&mut ctx, request).await
    }

    /// Like [`Pipeline::handle`] with a caller-supplied context.
    pub async fn handle_with_context(&self, ctx: &mut MiddlewareContext, request: Request) -> Response {
        match self.dispatch(ctx, request).await {
            Ok(response) => response,
            Err(error) => self.translator.translate(ctx, &error),
        }
    }

    /// Mounted middlewares in order.
    #[must_use]
    pub fn middlewares(&self) -> &[MountedMiddleware] {
        &self.middlewares
    }

    /// Names of the mounted middlewares in order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.middlewares.iter().map(MountedMiddleware::name).collect()
    }

    /// Number of mounted middlewares.
    #[must_use]
    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    /// Returns true if nothing is mounted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }
}

/// Builder for a [`Pipeline`].
#[derive(Debug, Default)]
pub struct PipelineBuilder {
    middlewares: Vec<MountedMiddleware>,
    translator: ErrorTranslator,
}

impl PipelineBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the error translator.
    #[must_use]
    pub fn error_translator(mut self, translator: ErrorTranslator) -> Self {
        self.translator = translator;
        self
    }

    /// Number of middlewares mounted so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    /// Returns true if nothing has been mounted yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }

    /// Freezes the chain.
    #[must_use]
    pub fn build(self) -> Pipeline {
        Pipeline {
            middlewares: self.middlewares,
            translator: self.translator,
        }
    }
}

impl Mount for PipelineBuilder {
    fn mount(&mut self, name: &str, scope: Scope, handler: Arc<dyn Middleware>) {
        self.middlewares
            .push(MountedMiddleware::new(name, scope, handler));
    }
}
