//! Request cookie parsing.
//!
//! Mounted right after CORS. Every `Cookie` header is parsed once and the
//! result is stored as a [`Cookies`] context extension, so later middlewares
//! read cookies without touching the header.
//!
//! Values are percent-decoded and surrounding quotes are stripped. Malformed
//! pairs are skipped. When a name repeats, the first occurrence wins.

use std::collections::HashMap;

use cookie::Cookie;
use http::header;

use crate::context::MiddlewareContext;
use crate::middleware::{BoxFuture, HandlerResult, Middleware, Next};
use crate::types::Request;

/// Cookies sent with the request.
///
/// ```
/// use tessera_middleware::stages::Cookies;
///
/// let cookies = Cookies::parse(["session=abc123; theme=dark%20mode"]);
/// assert_eq!(cookies.get("session"), Some("abc123"));
/// assert_eq!(cookies.get("theme"), Some("dark mode"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cookies {
    cookies: HashMap<String, String>,
}

impl Cookies {
    /// No cookies.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses `Cookie` header values.
    pub fn parse<'h, I>(headers: I) -> Self
    where
        I: IntoIterator<Item = &'h str>,
    {
        let mut cookies = HashMap::new();
        for value in headers {
            for parsed in Cookie::split_parse_encoded(value).flatten() {
                let value = strip_quotes(parsed.value());
                cookies
                    .entry(parsed.name().to_string())
                    .or_insert_with(|| value.to_string());
            }
        }
        Self { cookies }
    }

    /// Parses the `Cookie` headers of `request`. Non-UTF-8 headers are ignored.
    #[must_use]
    pub fn from_request(request: &Request) -> Self {
        Self::parse(
            request
                .headers()
                .get_all(header::COOKIE)
                .iter()
                .filter_map(|v| v.to_str().ok()),
        )
    }

    /// A cookie value by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    /// Whether a cookie is present.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.cookies.contains_key(name)
    }

    /// All cookies, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.cookies.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of cookies.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    /// Whether no cookie was sent.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }
}

fn strip_quotes(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}

/// Stores the request's [`Cookies`] in the context and passes the request on.
#[derive(Debug, Clone, Copy, Default)]
pub struct CookieParser;

impl CookieParser {
    /// Creates the stage.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Middleware for CookieParser {
    fn process<'a>(
        &'a self,
        ctx: &'a mut MiddlewareContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, HandlerResult> {
        Box::pin(async move {
            if !ctx.has_extension::<Cookies>() {
                ctx.set_extension(Cookies::from_request(&request));
            }
            next.run(ctx, request).await
        })
    }
}
