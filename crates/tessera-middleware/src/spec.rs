//! Middleware declarations, before they are mounted.

use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};
use tessera_config::MiddlewareEntry;

use crate::error::ScopeError;
use crate::loader::MiddlewareFactory;
use crate::scope::Scope;

/// Where a middleware's factory comes from.
#[derive(Clone)]
pub enum MiddlewareModule {
    /// A name resolved through the [`ModuleLoader`](crate::ModuleLoader).
    Reference(String),
    /// A factory supplied directly.
    Factory(Arc<dyn MiddlewareFactory>),
}

impl fmt::Debug for MiddlewareModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reference(name) => f.debug_tuple("Reference").field(name).finish(),
            Self::Factory(_) => f.write_str("Factory(..)"),
        }
    }
}

impl From<&str> for MiddlewareModule {
    fn from(reference: &str) -> Self {
        Self::Reference(reference.to_string())
    }
}

impl From<String> for MiddlewareModule {
    fn from(reference: String) -> Self {
        Self::Reference(reference)
    }
}

impl From<Arc<dyn MiddlewareFactory>> for MiddlewareModule {
    fn from(factory: Arc<dyn MiddlewareFactory>) -> Self {
        Self::Factory(factory)
    }
}

/// A middleware to be mounted.
///
/// Built either from a configuration entry with [`MiddlewareSpec::from_entry`]
/// or in code:
///
/// ```
/// use std::sync::Arc;
/// use http::StatusCode;
/// use serde_json::json;
/// use tessera_middleware::{InstanceFactory, MiddlewareSpec, StatusResponder};
///
/// let health = MiddlewareSpec::with_factory(
///     "health",
///     InstanceFactory(Arc::new(StatusResponder(StatusCode::NO_CONTENT))),
/// )
/// .order(-10.0)
/// .paths(["/healthz"])
/// .methods(["GET"]);
///
/// assert_eq!(health.name(), "health");
/// assert!(health.scope().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct MiddlewareSpec {
    name: String,
    order: f64,
    module: MiddlewareModule,
    paths: Vec<String>,
    methods: Option<Vec<String>>,
    hosts: Option<Vec<String>>,
    config: Value,
}

impl MiddlewareSpec {
    /// A spec named `name` using `module`, order 0, unscoped.
    pub fn new(name: impl Into<String>, module: impl Into<MiddlewareModule>) -> Self {
        Self {
            name: name.into(),
            order: 0.0,
            module: module.into(),
            paths: Vec::new(),
            methods: None,
            hosts: None,
            config: Value::Object(Map::new()),
        }
    }

    /// A spec with a factory supplied directly.
    pub fn with_factory(name: impl Into<String>, factory: impl MiddlewareFactory) -> Self {
        Self::new(name, MiddlewareModule::Factory(Arc::new(factory)))
    }

    /// Builds a spec from a validated configuration entry.
    #[must_use]
    pub fn from_entry(name: &str, entry: &MiddlewareEntry) -> Self {
        Self {
            name: name.to_string(),
            order: entry.order.unwrap_or(0.0),
            module: MiddlewareModule::Reference(entry.module.clone()),
            paths: entry.paths.as_ref().map(|p| p.to_vec()).unwrap_or_default(),
            methods: entry.methods.as_ref().map(|m| m.to_vec()),
            hosts: entry.hosts.as_ref().map(|h| h.to_vec()),
            config: Value::Object(entry.config.clone().unwrap_or_default()),
        }
    }

    /// Sets the order. Lower runs earlier.
    #[must_use]
    pub fn order(mut self, order: f64) -> Self {
        self.order = order;
        self
    }

    /// Restricts to path prefixes.
    #[must_use]
    pub fn paths<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.paths = paths.into_iter().map(Into::into).collect();
        self
    }

    /// Restricts to HTTP methods.
    #[must_use]
    pub fn methods<I, S>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.methods = Some(methods.into_iter().map(Into::into).collect());
        self
    }

    /// Restricts to host patterns.
    #[must_use]
    pub fn hosts<I, S>(mut self, hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.hosts = Some(hosts.into_iter().map(Into::into).collect());
        self
    }

    /// Sets the configuration handed to the factory.
    #[must_use]
    pub fn config(mut self, config: Value) -> Self {
        self.config = config;
        self
    }

    /// The name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The order value.
    #[must_use]
    pub fn order_value(&self) -> f64 {
        self.order
    }

    /// The module.
    #[must_use]
    pub fn module(&self) -> &MiddlewareModule {
        &self.module
    }

    /// The configuration handed to the factory.
    #[must_use]
    pub fn config_value(&self) -> &Value {
        &self.config
    }

    /// Compiles the scope restrictions.
    pub fn scope(&self) -> Result<Scope, ScopeError> {
        let mut scope = Scope::new().with_paths(&self.paths);
        if let Some(methods) = &self.methods {
            scope = scope.with_method_names(methods)?;
        }
        if let Some(hosts) = &self.hosts {
            scope = scope.with_hosts(hosts)?;
        }
        Ok(scope)
    }
}
