//! Translation of request-time failures into responses.
//!
//! A [`HandlerError`] becomes a response with the error's status, or `500`
//! when it carries none. The body is always empty so no internal detail leaks
//! to the client; the error itself is logged with the request id.
//!
//! The pipeline applies the translator to whatever escapes the chain. It can
//! also be mounted as a middleware to translate failures from the stages
//! after it while earlier stages still see a response.

use crate::context::MiddlewareContext;
use crate::error::HandlerError;
use crate::middleware::{BoxFuture, HandlerResult, Middleware, Next};
use crate::types::{empty_response, Request, Response};

/// Turns failures into status-only responses.
#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorTranslator;

impl ErrorTranslator {
    /// Creates a translator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Builds the response for `error` and logs it.
    #[must_use]
    pub fn translate(&self, ctx: &MiddlewareContext, error: &HandlerError) -> Response {
        let status = error.response_status();
        tracing::error!(
            request_id = %ctx.request_id(),
            status = status.as_u16(),
            error = %error.inner(),
            "request failed"
        );
        empty_response(status)
    }
}

impl Middleware for ErrorTranslator {
    fn process<'a>(
        &'a self,
        ctx: &'a mut MiddlewareContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, HandlerResult> {
        Box::pin(async move {
            match next.run(ctx, request).await {
                Ok(response) => Ok(response),
                Err(error) => Ok(self.translate(ctx, &error)),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::FnMiddleware;
    use crate::pipeline::{Mount, Pipeline};
    use crate::scope::Scope;
    use bytes::Bytes;
    use http::StatusCode;
    use http_body_util::{BodyExt, Full};
    use std::sync::Arc;

    fn request() -> Request {
        http::Request::builder()
            .uri("/")
            .body(Full::new(Bytes::new()))
            .unwrap()
    }

    async fn body_len(response: Response) -> usize {
        response.into_body().collect().await.unwrap().to_bytes().len()
    }

    #[tokio::test]
    async fn test_carried_status_is_used() {
        let ctx = MiddlewareContext::new();
        let error = HandlerError::with_status(StatusCode::NOT_IMPLEMENTED, "details");
        let response = ErrorTranslator::new().translate(&ctx, &error);
        assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED);
        assert_eq!(body_len(response).await, 0);
    }

    #[tokio::test]
    async fn test_missing_status_is_500() {
        let ctx = MiddlewareContext::new();
        let error = HandlerError::new("details");
        let response = ErrorTranslator::new().translate(&ctx, &error);
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_len(response).await, 0);
    }

    #[tokio::test]
    async fn test_mounted_translator_lets_earlier_stages_see_response() {
        let observed = Arc::new(parking_lot::Mutex::new(None));
        let observed_in_stage = Arc::clone(&observed);

        let mut builder = Pipeline::builder();
        builder.mount(
            "observer",
            Scope::new(),
            Arc::new(FnMiddleware::new(move |ctx, request, next| {
                let observed = Arc::clone(&observed_in_stage);
                Box::pin(async move {
                    let result = next.run(ctx, request).await;
                    *observed.lock() = Some(result.as_ref().map(|r| r.status()).ok());
                    result
                })
            })),
        );
        builder.mount("errors", Scope::new(), Arc::new(ErrorTranslator::new()));
        builder.mount(
            "fail",
            Scope::new(),
            Arc::new(FnMiddleware::new(|_ctx, _request, _next| {
                Box::pin(async move { Err(HandlerError::from_status(StatusCode::CONFLICT)) })
            })),
        );

        let response = builder.build().handle(request()).await;
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(*observed.lock(), Some(Some(StatusCode::CONFLICT)));
    }
}
