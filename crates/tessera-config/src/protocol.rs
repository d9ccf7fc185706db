//! Late binding of `scheme:payload` strings.
//!
//! A [`ProtocolRegistry`] maps scheme names to [`ProtocolResolver`]s. Every
//! string in a document whose prefix before the first `:` is a registered
//! scheme is replaced by whatever the resolver returns for the rest of the
//! string. Other strings are left alone, so `http://example.com` survives
//! resolution unless an `http` resolver is registered.
//!
//! # Example
//!
//! ```
//! use serde_json::json;
//! use std::path::Path;
//! use tessera_config::protocol::{resolve_document, ProtocolRegistry};
//!
//! # tokio_test::block_on(async {
//! let registry = ProtocolRegistry::with_defaults();
//! let doc = json!({"static": "path:public", "url": "http://example.com"});
//! let resolved = resolve_document(&doc, &registry, Path::new("/srv/app"))
//!     .await
//!     .unwrap();
//!
//! assert_eq!(resolved["static"], "/srv/app/public");
//! assert_eq!(resolved["url"], "http://example.com");
//! # });
//! ```

use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use base64::Engine as _;
use futures_util::future::{try_join_all, BoxFuture};
use indexmap::IndexMap;
use serde_json::Value;

use crate::error::BoxError;
use crate::ConfigError;

/// Resolves the payload of a protocol reference into a value.
///
/// Resolvers may perform I/O but must not have side effects on the document
/// being resolved; they only see the payload and the directory of the
/// document that contains the reference.
pub trait ProtocolResolver: Send + Sync + 'static {
    /// Resolve `payload`. `base_dir` is the directory of the defining document.
    fn resolve<'a>(&'a self, payload: &'a str, base_dir: &'a Path)
        -> BoxFuture<'a, Result<Value, BoxError>>;
}

/// A resolver built from an async closure.
///
/// ```
/// use serde_json::Value;
/// use std::path::PathBuf;
/// use tessera_config::protocol::{FnResolver, ProtocolRegistry};
///
/// let registry = ProtocolRegistry::new().with(
///     "upper",
///     FnResolver::new(|payload: String, _dir: PathBuf| async move {
///         Ok(Value::String(payload.to_uppercase()))
///     }),
/// );
/// assert!(registry.contains("upper"));
/// ```
pub struct FnResolver<F> {
    func: F,
}

impl<F, Fut> FnResolver<F>
where
    F: Fn(String, PathBuf) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, BoxError>> + Send + 'static,
{
    /// Wrap a closure taking the payload and the document directory.
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

impl<F, Fut> ProtocolResolver for FnResolver<F>
where
    F: Fn(String, PathBuf) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, BoxError>> + Send + 'static,
{
    fn resolve<'a>(
        &'a self,
        payload: &'a str,
        base_dir: &'a Path,
    ) -> BoxFuture<'a, Result<Value, BoxError>> {
        Box::pin((self.func)(payload.to_string(), base_dir.to_path_buf()))
    }
}

/// Scheme name to resolver mapping.
///
/// Passed explicitly to the loader; there is no process-wide registry.
#[derive(Clone, Default)]
pub struct ProtocolRegistry {
    resolvers: IndexMap<String, Arc<dyn ProtocolResolver>>,
}

impl ProtocolRegistry {
    /// An empty registry. No string is treated as a reference.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the built-in `path`, `cwd`, `file`, `base64` and `env`
    /// schemes.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new()
            .with("path", PathResolver)
            .with("cwd", CwdResolver)
            .with("file", FileResolver)
            .with("base64", Base64Resolver)
            .with("env", EnvResolver)
    }

    /// Register a resolver, builder style.
    #[must_use]
    pub fn with(mut self, scheme: impl Into<String>, resolver: impl ProtocolResolver) -> Self {
        self.register(scheme, resolver);
        self
    }

    /// Register a resolver, replacing any previous one for the scheme.
    pub fn register(&mut self, scheme: impl Into<String>, resolver: impl ProtocolResolver) {
        self.resolvers.insert(scheme.into(), Arc::new(resolver));
    }

    /// Remove a scheme.
    pub fn unregister(&mut self, scheme: &str) -> bool {
        self.resolvers.shift_remove(scheme).is_some()
    }

    /// Returns true if `scheme` is registered.
    #[must_use]
    pub fn contains(&self, scheme: &str) -> bool {
        self.resolvers.contains_key(scheme)
    }

    /// Registered scheme names, in registration order.
    pub fn schemes(&self) -> impl Iterator<Item = &str> {
        self.resolvers.keys().map(String::as_str)
    }

    /// Splits `value` into its resolver and payload if it is a reference.
    fn lookup<'v>(&self, value: &'v str) -> Option<(&'v str, &'v str, &Arc<dyn ProtocolResolver>)> {
        let (scheme, payload) = value.split_once(':')?;
        self.resolvers
            .get(scheme)
            .map(|resolver| (scheme, payload, resolver))
    }

    /// Returns true if `value` would be replaced during resolution.
    #[must_use]
    pub fn is_reference(&self, value: &str) -> bool {
        self.lookup(value).is_some()
    }
}

impl fmt::Debug for ProtocolRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProtocolRegistry")
            .field("schemes", &self.resolvers.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Resolves every protocol reference in `document`, returning a new value.
///
/// All references are resolved concurrently. The first failure aborts the
/// whole call and is returned as [`ConfigError::ProtocolResolution`].
pub async fn resolve_document(
    document: &Value,
    registry: &ProtocolRegistry,
    base_dir: &Path,
) -> Result<Value, ConfigError> {
    let mut references = Vec::new();
    collect_references(document, registry, &mut references);

    if references.is_empty() {
        return Ok(document.clone());
    }

    let pending = references.iter().map(|value| async move {
        // collect_references only keeps strings that have a resolver
        let (scheme, payload, resolver) = registry.lookup(value).ok_or_else(|| {
            ConfigError::ProtocolResolution {
                scheme: String::new(),
                value: (*value).to_string(),
                source: "no resolver registered".into(),
            }
        })?;
        resolver
            .resolve(payload, base_dir)
            .await
            .map_err(|source| ConfigError::ProtocolResolution {
                scheme: scheme.to_string(),
                value: (*value).to_string(),
                source,
            })
    });

    let resolved = try_join_all(pending).await?;

    tracing::debug!(
        count = resolved.len(),
        base_dir = %base_dir.display(),
        "resolved protocol references"
    );

    let mut results = resolved.into_iter();
    Ok(rebuild(document, registry, &mut results))
}

fn collect_references<'v>(value: &'v Value, registry: &ProtocolRegistry, out: &mut Vec<&'v str>) {
    match value {
        Value::String(s) if registry.is_reference(s) => out.push(s),
        Value::Array(items) => {
            for item in items {
                collect_references(item, registry, out);
            }
        }
        Value::Object(map) => {
            for item in map.values() {
                collect_references(item, registry, out);
            }
        }
        _ => {}
    }
}

// Walks in the same order as `collect_references`.
fn rebuild(value: &Value, registry: &ProtocolRegistry, results: &mut impl Iterator<Item = Value>) -> Value {
    match value {
        Value::String(s) if registry.is_reference(s) => {
            results.next().unwrap_or_else(|| value.clone())
        }
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| rebuild(item, registry, results))
                .collect(),
        ),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, item)| (key.clone(), rebuild(item, registry, results)))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn relative_to(base_dir: &Path, payload: &str) -> PathBuf {
    let path = Path::new(payload);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}

fn path_value(path: &Path) -> Value {
    Value::String(path.to_string_lossy().into_owned())
}

/// `path:` - a path relative to the defining document's directory.
#[derive(Debug, Clone, Copy)]
pub struct PathResolver;

impl ProtocolResolver for PathResolver {
    fn resolve<'a>(
        &'a self,
        payload: &'a str,
        base_dir: &'a Path,
    ) -> BoxFuture<'a, Result<Value, BoxError>> {
        Box::pin(async move { Ok(path_value(&relative_to(base_dir, payload))) })
    }
}

/// `cwd:` - a path relative to the process working directory.
#[derive(Debug, Clone, Copy)]
pub struct CwdResolver;

impl ProtocolResolver for CwdResolver {
    fn resolve<'a>(
        &'a self,
        payload: &'a str,
        _base_dir: &'a Path,
    ) -> BoxFuture<'a, Result<Value, BoxError>> {
        Box::pin(async move {
            let cwd = std::env::current_dir()?;
            Ok(path_value(&relative_to(&cwd, payload)))
        })
    }
}

/// `file:` - the contents of a file, relative to the defining document.
#[derive(Debug, Clone, Copy)]
pub struct FileResolver;

impl ProtocolResolver for FileResolver {
    fn resolve<'a>(
        &'a self,
        payload: &'a str,
        base_dir: &'a Path,
    ) -> BoxFuture<'a, Result<Value, BoxError>> {
        Box::pin(async move {
            let path = relative_to(base_dir, payload);
            let contents = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| format!("cannot read {}: {e}", path.display()))?;
            Ok(Value::String(contents))
        })
    }
}

/// `base64:` - decodes standard base64 into a UTF-8 string.
#[derive(Debug, Clone, Copy)]
pub struct Base64Resolver;

impl ProtocolResolver for Base64Resolver {
    fn resolve<'a>(
        &'a self,
        payload: &'a str,
        _base_dir: &'a Path,
    ) -> BoxFuture<'a, Result<Value, BoxError>> {
        Box::pin(async move {
            let bytes = base64::engine::general_purpose::STANDARD.decode(payload.trim())?;
            Ok(Value::String(String::from_utf8(bytes)?))
        })
    }
}

/// `env:` - the value of an environment variable.
#[derive(Debug, Clone, Copy)]
pub struct EnvResolver;

impl ProtocolResolver for EnvResolver {
    fn resolve<'a>(
        &'a self,
        payload: &'a str,
        _base_dir: &'a Path,
    ) -> BoxFuture<'a, Result<Value, BoxError>> {
        Box::pin(async move {
            std::env::var(payload)
                .map(Value::String)
                .map_err(|_| format!("environment variable {payload} is not set").into())
        })
    }
}
