//! Core middleware trait and the continuation passed to it.
//!
//! A middleware receives the request context, the request and a [`Next`]
//! continuation. It either passes the request on with `next.run(..)`, answers
//! it directly by returning a response without calling `next`, or fails with a
//! [`HandlerError`].
//!
//! # Example
//!
//! ```
//! use tessera_middleware::{BoxFuture, HandlerResult, Middleware, MiddlewareContext, Next, Request};
//!
//! struct Logging;
//!
//! impl Middleware for Logging {
//!     fn process<'a>(
//!         &'a self,
//!         ctx: &'a mut MiddlewareContext,
//!         request: Request,
//!         next: Next<'a>,
//!     ) -> BoxFuture<'a, HandlerResult> {
//!         Box::pin(async move {
//!             let path = request.uri().path().to_string();
//!             let response = next.run(ctx, request).await?;
//!             tracing::info!(%path, status = %response.status(), "request served");
//!             Ok(response)
//!         })
//!     }
//! }
//! ```

use std::future::Future;
use std::pin::Pin;

use http::StatusCode;

use crate::context::MiddlewareContext;
use crate::error::HandlerError;
use crate::pipeline::MountedMiddleware;
use crate::types::{empty_response, Request, Response};

/// A boxed, sendable future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// What a middleware produces for a request.
pub type HandlerResult = Result<Response, HandlerError>;

/// A request handler mounted on the pipeline.
pub trait Middleware: Send + Sync + 'static {
    /// Processes the request.
    ///
    /// Call `next.run(ctx, request)` to hand the request to the next
    /// middleware in scope; return a response without calling it to end the
    /// chain here.
    fn process<'a>(
        &'a self,
        ctx: &'a mut MiddlewareContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, HandlerResult>;
}

/// The rest of the chain after the running middleware.
///
/// Consumed by [`Next::run`], so control can be passed on at most once.
pub struct Next<'a> {
    remaining: &'a [MountedMiddleware],
}

impl<'a> Next<'a> {
    pub(crate) fn new(remaining: &'a [MountedMiddleware]) -> Self {
        Self { remaining }
    }

    /// Number of middlewares left, in or out of scope.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.remaining.len()
    }

    /// Runs the next middleware whose scope matches the request.
    ///
    /// Scopes are evaluated against the request as passed here. When no
    /// middleware is left the result is `404 Not Found` with an empty body.
    pub async fn run(self, ctx: &mut MiddlewareContext, request: Request) -> HandlerResult {
        let mut remaining = self.remaining;
        while let Some((current, rest)) = remaining.split_first() {
            if let Some(mount_path) = current.scope().match_request(&request) {
                // the caller sees its own mount path again once this returns
                let previous = ctx.replace_mount_path(mount_path);
                let result = current
                    .handler()
                    .process(ctx, request, Next::new(rest))
                    .await;
                ctx.set_mount_path(&previous);
                return result;
            }
            remaining = rest;
        }
        Ok(empty_response(StatusCode::NOT_FOUND))
    }
}

/// A middleware built from a closure.
///
/// ```
/// use tessera_middleware::FnMiddleware;
///
/// let passthrough = FnMiddleware::new(|ctx, request, next| {
///     Box::pin(async move { next.run(ctx, request).await })
/// });
/// ```
pub struct FnMiddleware<F> {
    func: F,
}

impl<F> FnMiddleware<F>
where
    F: for<'a> Fn(&'a mut MiddlewareContext, Request, Next<'a>) -> BoxFuture<'a, HandlerResult>
        + Send
        + Sync
        + 'static,
{
    /// Wraps a closure.
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

impl<F> Middleware for FnMiddleware<F>
where
    F: for<'a> Fn(&'a mut MiddlewareContext, Request, Next<'a>) -> BoxFuture<'a, HandlerResult>
        + Send
        + Sync
        + 'static,
{
    fn process<'a>(
        &'a self,
        ctx: &'a mut MiddlewareContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, HandlerResult> {
        (self.func)(ctx, request, next)
    }
}

/// A terminal middleware answering every request with a fixed status and an
/// empty body.
#[derive(Debug, Clone, Copy)]
pub struct StatusResponder(pub StatusCode);

impl Middleware for StatusResponder {
    fn process<'a>(
        &'a self,
        _ctx: &'a mut MiddlewareContext,
        _request: Request,
        _next: Next<'a>,
    ) -> BoxFuture<'a, HandlerResult> {
        let status = self.0;
        Box::pin(async move { Ok(empty_response(status)) })
    }
}
