//! CORS (Cross-Origin Resource Sharing) stage.
//!
//! Mounted ahead of the configured middlewares. By default it reflects the
//! request `Origin` and allows credentials, so browser clients on any origin
//! can call the server with cookies.
//!
//! Preflight requests (`OPTIONS` with `Origin` and
//! `Access-Control-Request-Method`) are answered directly with `204` and
//! never reach later stages.
//!
//! Failures from later stages are translated here, with the
//! [`ErrorTranslator`], so error responses carry the CORS headers too.

use std::collections::HashSet;
use std::time::Duration;

use http::{header, HeaderValue, Method, StatusCode};

use crate::context::MiddlewareContext;
use crate::middleware::{BoxFuture, HandlerResult, Middleware, Next};
use crate::stages::ErrorTranslator;
use crate::types::{empty_response, Request, Response};

/// CORS header names.
pub mod headers {
    /// `Access-Control-Allow-Origin` header.
    pub const ALLOW_ORIGIN: &str = "access-control-allow-origin";
    /// `Access-Control-Allow-Methods` header.
    pub const ALLOW_METHODS: &str = "access-control-allow-methods";
    /// `Access-Control-Allow-Headers` header.
    pub const ALLOW_HEADERS: &str = "access-control-allow-headers";
    /// `Access-Control-Allow-Credentials` header.
    pub const ALLOW_CREDENTIALS: &str = "access-control-allow-credentials";
    /// `Access-Control-Max-Age` header.
    pub const MAX_AGE: &str = "access-control-max-age";
    /// `Access-Control-Request-Method` header (preflight).
    pub const REQUEST_METHOD: &str = "access-control-request-method";
    /// `Access-Control-Request-Headers` header (preflight).
    pub const REQUEST_HEADERS: &str = "access-control-request-headers";
}

/// Which origins receive CORS headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowedOrigins {
    /// Every origin, echoed back as sent.
    Reflect,
    /// Only the listed origins.
    List(HashSet<String>),
}

impl AllowedOrigins {
    fn allows(&self, origin: &str) -> bool {
        match self {
            Self::Reflect => true,
            Self::List(origins) => origins.contains(origin),
        }
    }
}

/// The CORS stage.
///
/// ```
/// use std::time::Duration;
/// use tessera_middleware::stages::CorsMiddleware;
///
/// let cors = CorsMiddleware::new()
///     .allow_origins(["https://app.example.com"])
///     .max_age(Duration::from_secs(600));
/// ```
#[derive(Debug, Clone)]
pub struct CorsMiddleware {
    origins: AllowedOrigins,
    methods: Vec<Method>,
    credentials: bool,
    max_age: Option<Duration>,
}

impl Default for CorsMiddleware {
    fn default() -> Self {
        Self::new()
    }
}

impl CorsMiddleware {
    /// Reflects every origin and allows credentials.
    #[must_use]
    pub fn new() -> Self {
        Self {
            origins: AllowedOrigins::Reflect,
            methods: vec![
                Method::GET,
                Method::HEAD,
                Method::PUT,
                Method::PATCH,
                Method::POST,
                Method::DELETE,
            ],
            credentials: true,
            max_age: None,
        }
    }

    /// Restricts to a list of origins.
    #[must_use]
    pub fn allow_origins<I, S>(mut self, origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.origins = AllowedOrigins::List(origins.into_iter().map(Into::into).collect());
        self
    }

    /// Methods announced to preflight requests.
    #[must_use]
    pub fn allow_methods<I>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = Method>,
    {
        self.methods = methods.into_iter().collect();
        self
    }

    /// Whether `Access-Control-Allow-Credentials: true` is sent.
    #[must_use]
    pub fn allow_credentials(mut self, allow: bool) -> Self {
        self.credentials = allow;
        self
    }

    /// Preflight cache duration.
    #[must_use]
    pub fn max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }

    fn is_preflight(request: &Request) -> bool {
        request.method() == Method::OPTIONS
            && request.headers().contains_key(header::ORIGIN)
            && request.headers().contains_key(headers::REQUEST_METHOD)
    }

    fn allowed_origin(&self, request: &Request) -> Option<HeaderValue> {
        let origin = request.headers().get(header::ORIGIN)?;
        let allowed = origin
            .to_str()
            .map(|o| self.origins.allows(o))
            .unwrap_or(false);
        allowed.then(|| origin.clone())
    }

    fn add_common_headers(&self, response: &mut Response, origin: HeaderValue) {
        let headers = response.headers_mut();
        headers.insert(headers::ALLOW_ORIGIN, origin);
        if self.credentials {
            headers.insert(headers::ALLOW_CREDENTIALS, HeaderValue::from_static("true"));
        }
        headers.append(header::VARY, HeaderValue::from_static("Origin"));
    }

    fn preflight(&self, request: &Request, origin: HeaderValue) -> Response {
        let mut response = empty_response(StatusCode::NO_CONTENT);
        self.add_common_headers(&mut response, origin);

        let methods = self
            .methods
            .iter()
            .map(Method::as_str)
            .collect::<Vec<_>>()
            .join(",");
        let headers = response.headers_mut();
        if let Ok(value) = HeaderValue::from_str(&methods) {
            headers.insert(headers::ALLOW_METHODS, value);
        }
        // requested headers are reflected
        if let Some(requested) = request.headers().get(headers::REQUEST_HEADERS) {
            headers.insert(headers::ALLOW_HEADERS, requested.clone());
        }
        if let Some(max_age) = self.max_age {
            headers.insert(headers::MAX_AGE, HeaderValue::from(max_age.as_secs()));
        }
        response
    }
}

impl Middleware for CorsMiddleware {
    fn process<'a>(
        &'a self,
        ctx: &'a mut MiddlewareContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, HandlerResult> {
        Box::pin(async move {
            let origin = self.allowed_origin(&request);

            if Self::is_preflight(&request) {
                if let Some(origin) = &origin {
                    return Ok(self.preflight(&request, origin.clone()));
                }
            }

            let mut response = match next.run(ctx, request).await {
                Ok(response) => response,
                // browsers only expose failures that carry the CORS headers
                Err(error) => ErrorTranslator::new().translate(ctx, &error),
            };
            if let Some(origin) = origin {
                self.add_common_headers(&mut response, origin);
            }
            Ok(response)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HandlerError;
    use crate::middleware::{FnMiddleware, StatusResponder};
    use crate::pipeline::{Mount, Pipeline};
    use crate::scope::Scope;
    use bytes::Bytes;
    use http_body_util::{BodyExt, Full};
    use std::sync::Arc;

    fn pipeline(cors: CorsMiddleware) -> Pipeline {
        let mut builder = Pipeline::builder();
        builder.mount("cors", Scope::new(), Arc::new(cors));
        builder.mount("ok", Scope::new(), Arc::new(StatusResponder(StatusCode::OK)));
        builder.build()
    }

    fn request(method: Method, origin: Option<&str>, preflight_method: Option<&str>) -> Request {
        let mut builder = http::Request::builder().method(method).uri("/data");
        if let Some(origin) = origin {
            builder = builder.header(header::ORIGIN, origin);
        }
        if let Some(m) = preflight_method {
            builder = builder
                .header(headers::REQUEST_METHOD, m)
                .header(headers::REQUEST_HEADERS, "x-custom");
        }
        builder.body(Full::new(Bytes::new())).unwrap()
    }

    #[tokio::test]
    async fn test_reflects_origin_with_credentials() {
        let response = pipeline(CorsMiddleware::new())
            .handle(request(Method::GET, Some("https://a.example"), None))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[headers::ALLOW_ORIGIN], "https://a.example");
        assert_eq!(response.headers()[headers::ALLOW_CREDENTIALS], "true");
    }

    #[tokio::test]
    async fn test_no_origin_no_headers() {
        let response = pipeline(CorsMiddleware::new())
            .handle(request(Method::GET, None, None))
            .await;
        assert!(response.headers().get(headers::ALLOW_ORIGIN).is_none());
    }

    #[tokio::test]
    async fn test_preflight_answered_directly() {
        let response = pipeline(CorsMiddleware::new().max_age(Duration::from_secs(60)))
            .handle(request(Method::OPTIONS, Some("https://a.example"), Some("PUT")))
            .await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(response.headers()[headers::ALLOW_HEADERS], "x-custom");
        assert_eq!(response.headers()[headers::MAX_AGE], "60");
        assert!(response.headers()[headers::ALLOW_METHODS]
            .to_str()
            .unwrap()
            .contains("PUT"));
    }

    #[tokio::test]
    async fn test_failures_carry_cors_headers() {
        let mut builder = Pipeline::builder();
        builder.mount("cors", Scope::new(), Arc::new(CorsMiddleware::new()));
        builder.mount(
            "fail",
            Scope::new(),
            Arc::new(FnMiddleware::new(|_ctx, _request, _next| {
                Box::pin(async move { Err(HandlerError::from_status(StatusCode::FORBIDDEN)) })
            })),
        );

        let response = builder
            .build()
            .handle(request(Method::GET, Some("https://a.example"), None))
            .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(response.headers()[headers::ALLOW_ORIGIN], "https://a.example");
        assert_eq!(response.headers()[headers::ALLOW_CREDENTIALS], "true");
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn test_origin_list() {
        let pipeline = pipeline(CorsMiddleware::new().allow_origins(["https://ok.example"]));

        let allowed = pipeline
            .handle(request(Method::GET, Some("https://ok.example"), None))
            .await;
        assert!(allowed.headers().contains_key(headers::ALLOW_ORIGIN));

        let denied = pipeline
            .handle(request(Method::GET, Some("https://evil.example"), None))
            .await;
        assert!(!denied.headers().contains_key(headers::ALLOW_ORIGIN));

        // a preflight from an unlisted origin falls through to the chain
        let preflight = pipeline
            .handle(request(Method::OPTIONS, Some("https://evil.example"), Some("GET")))
            .await;
        assert_eq!(preflight.status(), StatusCode::OK);
    }
}
