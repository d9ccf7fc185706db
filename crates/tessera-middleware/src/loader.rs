//! Middleware factories and module loading.
//!
//! A middleware declared in configuration names a *module*. The host supplies
//! a [`ModuleLoader`] that resolves that name to a [`MiddlewareFactory`]; the
//! factory is then called once, at startup, with a [`FactoryContext`] and
//! returns the handler to mount.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::BoxError;
use crate::middleware::{BoxFuture, Middleware};

/// The globals map shared by every middleware of a pipeline.
///
/// All factories receive the same instance; writes by one middleware are
/// visible to the others.
pub type SharedGlobals = Arc<RwLock<Map<String, Value>>>;

/// Creates a [`SharedGlobals`] from an initial map.
#[must_use]
pub fn shared_globals(initial: Map<String, Value>) -> SharedGlobals {
    Arc::new(RwLock::new(initial))
}

/// Everything a factory gets to build its middleware.
#[derive(Debug, Clone)]
pub struct FactoryContext {
    name: String,
    globals: SharedGlobals,
    logger: tracing::Span,
    config: Value,
    template: Arc<Value>,
}

impl FactoryContext {
    /// Creates a context.
    pub fn new(
        name: impl Into<String>,
        globals: SharedGlobals,
        logger: tracing::Span,
        config: Value,
        template: Arc<Value>,
    ) -> Self {
        Self {
            name: name.into(),
            globals,
            logger,
            config,
            template,
        }
    }

    /// Name of the middleware being built.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The shared globals.
    #[must_use]
    pub fn globals(&self) -> &SharedGlobals {
        &self.globals
    }

    /// Span to log under. Enter it, or pass it to `Instrument::instrument`.
    #[must_use]
    pub fn logger(&self) -> &tracing::Span {
        &self.logger
    }

    /// This middleware's `config` section (an empty map when absent).
    #[must_use]
    pub fn config(&self) -> &Value {
        &self.config
    }

    /// Deserialises the `config` section into a typed value.
    pub fn config_as<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.config)
    }

    /// Template engine settings.
    #[must_use]
    pub fn template(&self) -> &Arc<Value> {
        &self.template
    }
}

/// Builds a middleware from its context.
pub trait MiddlewareFactory: Send + Sync + 'static {
    /// Builds the middleware. Called once per mounted middleware.
    fn create(&self, ctx: FactoryContext) -> BoxFuture<'static, Result<Arc<dyn Middleware>, BoxError>>;
}

/// A factory from an async closure.
///
/// ```
/// use std::sync::Arc;
/// use http::StatusCode;
/// use tessera_middleware::{FnFactory, Middleware, StatusResponder};
///
/// let factory = FnFactory::new(|ctx| async move {
///     let status: u16 = ctx.config_as().unwrap_or(204);
///     let status = StatusCode::from_u16(status)?;
///     Ok(Arc::new(StatusResponder(status)) as Arc<dyn Middleware>)
/// });
/// ```
pub struct FnFactory<F> {
    func: F,
}

impl<F, Fut> FnFactory<F>
where
    F: Fn(FactoryContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Arc<dyn Middleware>, BoxError>> + Send + 'static,
{
    /// Wraps an async closure.
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

impl<F, Fut> MiddlewareFactory for FnFactory<F>
where
    F: Fn(FactoryContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Arc<dyn Middleware>, BoxError>> + Send + 'static,
{
    fn create(&self, ctx: FactoryContext) -> BoxFuture<'static, Result<Arc<dyn Middleware>, BoxError>> {
        Box::pin((self.func)(ctx))
    }
}

/// A factory from a plain closure.
pub struct SyncFactory<F> {
    func: F,
}

impl<F> SyncFactory<F>
where
    F: Fn(FactoryContext) -> Result<Arc<dyn Middleware>, BoxError> + Send + Sync + 'static,
{
    /// Wraps a closure.
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

impl<F> MiddlewareFactory for SyncFactory<F>
where
    F: Fn(FactoryContext) -> Result<Arc<dyn Middleware>, BoxError> + Send + Sync + 'static,
{
    fn create(&self, ctx: FactoryContext) -> BoxFuture<'static, Result<Arc<dyn Middleware>, BoxError>> {
        let result = (self.func)(ctx);
        Box::pin(async move { result })
    }
}

/// A factory handing out one prebuilt middleware.
#[derive(Clone)]
pub struct InstanceFactory(pub Arc<dyn Middleware>);

impl MiddlewareFactory for InstanceFactory {
    fn create(&self, _ctx: FactoryContext) -> BoxFuture<'static, Result<Arc<dyn Middleware>, BoxError>> {
        let middleware = Arc::clone(&self.0);
        Box::pin(async move { Ok(middleware) })
    }
}

/// Resolves module references to factories.
pub trait ModuleLoader: Send + Sync + 'static {
    /// Looks up a module. `None` means it does not exist.
    fn load(&self, reference: &str) -> Option<Arc<dyn MiddlewareFactory>>;
}

/// A [`ModuleLoader`] backed by a name to factory map.
///
/// ```
/// use tessera_middleware::{ModuleLoader, ModuleRegistry, SyncFactory, StatusResponder};
/// use std::sync::Arc;
/// use http::StatusCode;
///
/// let registry = ModuleRegistry::new().with(
///     "teapot",
///     SyncFactory::new(|_ctx| Ok(Arc::new(StatusResponder(StatusCode::IM_A_TEAPOT)) as _)),
/// );
/// assert!(registry.load("teapot").is_some());
/// assert!(registry.load("kettle").is_none());
/// ```
#[derive(Clone, Default)]
pub struct ModuleRegistry {
    modules: IndexMap<String, Arc<dyn MiddlewareFactory>>,
}

impl ModuleRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a module, builder style.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, factory: impl MiddlewareFactory) -> Self {
        self.register(name, factory);
        self
    }

    /// Registers a module, replacing any previous one with that name.
    pub fn register(&mut self, name: impl Into<String>, factory: impl MiddlewareFactory) {
        self.modules.insert(name.into(), Arc::new(factory));
    }

    /// Registers an already shared factory.
    pub fn register_shared(&mut self, name: impl Into<String>, factory: Arc<dyn MiddlewareFactory>) {
        self.modules.insert(name.into(), factory);
    }

    /// Registered module names.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.modules.keys().map(String::as_str)
    }
}

impl ModuleLoader for ModuleRegistry {
    fn load(&self, reference: &str) -> Option<Arc<dyn MiddlewareFactory>> {
        self.modules.get(reference).cloned()
    }
}

impl fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleRegistry")
            .field("modules", &self.modules.keys().collect::<Vec<_>>())
            .finish()
    }
}
