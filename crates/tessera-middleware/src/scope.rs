//! Request scoping of mounted middlewares.
//!
//! A [`Scope`] restricts which requests reach a middleware:
//!
//! - path prefixes, matched on segment boundaries (`/api` matches `/api` and
//!   `/api/users` but not `/apix`; `/` matches everything),
//! - host patterns, matched case-insensitively against the `Host` header
//!   without its port; `*` stands for one label or part of one
//!   (`*.example.com` matches `a.example.com` but not `example.com`),
//! - HTTP methods.
//!
//! An absent host or method list matches every request.

use http::Method;
use regex::Regex;

use crate::error::ScopeError;
use crate::types::Request;

/// A compiled host pattern.
#[derive(Debug, Clone)]
pub struct HostPattern {
    pattern: String,
    regex: Regex,
}

impl HostPattern {
    /// Compiles a pattern such as `example.com` or `*.example.com`.
    pub fn new(pattern: &str) -> Result<Self, ScopeError> {
        let body = pattern
            .split('*')
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join("[^.]+");
        let regex = Regex::new(&format!("(?i)^{body}$")).map_err(|source| {
            ScopeError::InvalidHost {
                pattern: pattern.to_string(),
                source,
            }
        })?;
        Ok(Self {
            pattern: pattern.to_string(),
            regex,
        })
    }

    /// The pattern as written.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.pattern
    }

    /// Returns true if `host` (without port) matches.
    #[must_use]
    pub fn matches(&self, host: &str) -> bool {
        self.regex.is_match(host)
    }
}

/// The set of requests a middleware receives.
///
/// # Example
///
/// ```
/// use http::Method;
/// use tessera_middleware::Scope;
///
/// let scope = Scope::new()
///     .with_paths(["/api"])
///     .with_methods([Method::GET])
///     .with_hosts(["*.example.com"])
///     .unwrap();
///
/// assert!(scope.matches_parts(&Method::GET, "/api/users", Some("eu.example.com:8080")));
/// assert!(!scope.matches_parts(&Method::POST, "/api/users", Some("eu.example.com")));
/// assert!(!scope.matches_parts(&Method::GET, "/apix", Some("eu.example.com")));
/// ```
#[derive(Debug, Clone)]
pub struct Scope {
    paths: Vec<String>,
    methods: Option<Vec<Method>>,
    hosts: Option<Vec<HostPattern>>,
}

impl Default for Scope {
    fn default() -> Self {
        Self::new()
    }
}

impl Scope {
    /// A scope matching every request.
    #[must_use]
    pub fn new() -> Self {
        Self {
            paths: vec!["/".to_string()],
            methods: None,
            hosts: None,
        }
    }

    /// Restricts to the given path prefixes. An empty list means `/`.
    #[must_use]
    pub fn with_paths<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let paths: Vec<String> = paths
            .into_iter()
            .map(|p| normalize_prefix(p.as_ref()))
            .collect();
        self.paths = if paths.is_empty() {
            vec!["/".to_string()]
        } else {
            paths
        };
        self
    }

    /// Restricts to the given methods.
    #[must_use]
    pub fn with_methods<I>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = Method>,
    {
        self.methods = Some(methods.into_iter().collect());
        self
    }

    /// Restricts to methods given by name. Names are case-insensitive.
    pub fn with_method_names<I, S>(self, names: I) -> Result<Self, ScopeError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let methods = names
            .into_iter()
            .map(|name| parse_method(name.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(self.with_methods(methods))
    }

    /// Restricts to the given host patterns.
    pub fn with_hosts<I, S>(mut self, hosts: I) -> Result<Self, ScopeError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let hosts = hosts
            .into_iter()
            .map(|h| HostPattern::new(h.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        self.hosts = Some(hosts);
        Ok(self)
    }

    /// Path prefixes.
    #[must_use]
    pub fn paths(&self) -> &[String] {
        &self.paths
    }

    /// Method filter, if any.
    #[must_use]
    pub fn methods(&self) -> Option<&[Method]> {
        self.methods.as_deref()
    }

    /// Host filter, if any.
    #[must_use]
    pub fn hosts(&self) -> Option<&[HostPattern]> {
        self.hosts.as_deref()
    }

    /// Returns the matched path prefix if `request` is in scope.
    #[must_use]
    pub fn match_request(&self, request: &Request) -> Option<&str> {
        self.match_parts(request.method(), request.uri().path(), request_host(request))
    }

    /// Returns true if `request` is in scope.
    #[must_use]
    pub fn matches(&self, request: &Request) -> bool {
        self.match_request(request).is_some()
    }

    /// Like [`Scope::matches`] on the individual request parts.
    #[must_use]
    pub fn matches_parts(&self, method: &Method, path: &str, host: Option<&str>) -> bool {
        self.match_parts(method, path, host).is_some()
    }

    fn match_parts(&self, method: &Method, path: &str, host: Option<&str>) -> Option<&str> {
        if let Some(methods) = &self.methods {
            if !methods.contains(method) {
                return None;
            }
        }

        if let Some(hosts) = &self.hosts {
            let host = strip_port(host?);
            if !hosts.iter().any(|pattern| pattern.matches(host)) {
                return None;
            }
        }

        // longest prefix first so the reported mount path is the most specific
        self.paths
            .iter()
            .filter(|prefix| path_matches(prefix, path))
            .max_by_key(|prefix| prefix.len())
            .map(String::as_str)
    }
}

fn parse_method(name: &str) -> Result<Method, ScopeError> {
    Method::from_bytes(name.trim().to_ascii_uppercase().as_bytes())
        .map_err(|_| ScopeError::InvalidMethod(name.to_string()))
}

fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

fn path_matches(prefix: &str, path: &str) -> bool {
    if prefix == "/" {
        return true;
    }
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// The request host: the `Host` header, or the authority of an absolute URI.
#[must_use]
pub fn request_host(request: &Request) -> Option<&str> {
    request
        .headers()
        .get(http::header::HOST)
        .and_then(|v| v.to_str().ok())
        .or_else(|| request.uri().host())
}

fn strip_port(host: &str) -> &str {
    if host.starts_with('[') {
        // IPv6 literal
        return host.find(']').map_or(host, |end| &host[..=end]);
    }
    host.rsplit_once(':').map_or(host, |(name, _)| name)
}
