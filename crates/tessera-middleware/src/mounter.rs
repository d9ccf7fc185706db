//! Instantiates middlewares and mounts them onto a pipeline.

use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::error::MountError;
use crate::loader::{shared_globals, FactoryContext, MiddlewareFactory, ModuleLoader, SharedGlobals};
use crate::pipeline::Mount;
use crate::spec::{MiddlewareModule, MiddlewareSpec};

/// Mounts assembled specs, in order, onto a [`Mount`] target.
///
/// Mounting is sequential and stops at the first failure; whatever was
/// mounted before the failure stays mounted, so the target should be
/// discarded.
pub struct PipelineMounter {
    loader: Arc<dyn ModuleLoader>,
    globals: SharedGlobals,
    template: Arc<Value>,
}

impl PipelineMounter {
    /// A mounter resolving references through `loader`, with empty globals.
    pub fn new(loader: Arc<dyn ModuleLoader>) -> Self {
        Self {
            loader,
            globals: shared_globals(Map::new()),
            template: Arc::new(Value::Null),
        }
    }

    /// Shares `globals` with every middleware.
    #[must_use]
    pub fn with_globals(mut self, globals: SharedGlobals) -> Self {
        self.globals = globals;
        self
    }

    /// Template engine settings handed to every factory.
    #[must_use]
    pub fn with_template(mut self, template: Value) -> Self {
        self.template = Arc::new(template);
        self
    }

    /// The shared globals.
    #[must_use]
    pub fn globals(&self) -> &SharedGlobals {
        &self.globals
    }

    /// Mounts every spec. Returns how many were mounted.
    pub async fn mount_all<M>(&self, target: &mut M, specs: &[MiddlewareSpec]) -> Result<usize, MountError>
    where
        M: Mount + Send,
    {
        for spec in specs {
            self.mount_one(target, spec).await?;
        }
        tracing::info!(count = specs.len(), "middleware pipeline assembled");
        Ok(specs.len())
    }

    /// Instantiates and mounts a single spec.
    pub async fn mount_one<M>(&self, target: &mut M, spec: &MiddlewareSpec) -> Result<(), MountError>
    where
        M: Mount + Send,
    {
        let name = spec.name();
        let factory = self.factory_for(spec)?;
        let scope = spec.scope().map_err(|source| MountError::InvalidScope {
            name: name.to_string(),
            source,
        })?;

        let ctx = FactoryContext::new(
            name,
            Arc::clone(&self.globals),
            tracing::info_span!("middleware", name = %name),
            spec.config_value().clone(),
            Arc::clone(&self.template),
        );
        let handler = factory
            .create(ctx)
            .await
            .map_err(|source| MountError::Instantiation {
                name: name.to_string(),
                source,
            })?;

        tracing::debug!(
            name,
            order = spec.order_value(),
            paths = ?scope.paths(),
            "mounting middleware"
        );
        target.mount(name, scope, handler);
        Ok(())
    }

    fn factory_for(&self, spec: &MiddlewareSpec) -> Result<Arc<dyn MiddlewareFactory>, MountError> {
        match spec.module() {
            MiddlewareModule::Factory(factory) => Ok(Arc::clone(factory)),
            MiddlewareModule::Reference(reference) => {
                self.loader
                    .load(reference)
                    .ok_or_else(|| MountError::ModuleNotFound {
                        name: spec.name().to_string(),
                        module: reference.clone(),
                    })
            }
        }
    }
}

impl fmt::Debug for PipelineMounter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineMounter")
            .field("globals", &self.globals)
            .field("template", &self.template)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::{InstanceFactory, ModuleRegistry, SyncFactory};
    use crate::middleware::{Middleware, StatusResponder};
    use crate::pipeline::Pipeline;
    use http::StatusCode;
    use serde_json::json;

    fn registry() -> Arc<ModuleRegistry> {
        Arc::new(
            ModuleRegistry::new()
                .with("ok", InstanceFactory(Arc::new(StatusResponder(StatusCode::OK))))
                .with(
                    "status",
                    SyncFactory::new(|ctx| {
                        let code: u16 = ctx.config()["code"].as_u64().unwrap_or(200).try_into()?;
                        Ok(Arc::new(StatusResponder(StatusCode::from_u16(code)?)) as Arc<dyn Middleware>)
                    }),
                ),
        )
    }

    #[tokio::test]
    async fn test_mounts_in_order() {
        let mounter = PipelineMounter::new(registry());
        let mut builder = Pipeline::builder();
        let count = mounter
            .mount_all(
                &mut builder,
                &[
                    MiddlewareSpec::new("first", "ok"),
                    MiddlewareSpec::new("second", "status").config(json!({"code": 418})),
                ],
            )
            .await
            .unwrap();
        assert_eq!(count, 2);
        assert_eq!(builder.build().names(), ["first", "second"]);
    }

    #[tokio::test]
    async fn test_missing_module_stops_mounting() {
        let mounter = PipelineMounter::new(registry());
        let mut builder = Pipeline::builder();
        let err = mounter
            .mount_all(
                &mut builder,
                &[
                    MiddlewareSpec::new("first", "ok"),
                    MiddlewareSpec::new("ghost", "nope"),
                    MiddlewareSpec::new("never", "ok"),
                ],
            )
            .await
            .unwrap_err();
        assert!(matches!(&err, MountError::ModuleNotFound { module, .. } if module == "nope"));
        assert_eq!(err.middleware_name(), "ghost");
        assert_eq!(builder.len(), 1);
    }

    #[tokio::test]
    async fn test_factory_failure_is_instantiation_error() {
        let mounter = PipelineMounter::new(registry());
        let mut builder = Pipeline::builder();
        let err = mounter
            .mount_one(
                &mut builder,
                &MiddlewareSpec::new("bad", "status").config(json!({"code": 42})),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, MountError::Instantiation { .. }));
        assert!(builder.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_method_is_scope_error() {
        let mounter = PipelineMounter::new(registry());
        let mut builder = Pipeline::builder();
        let err = mounter
            .mount_one(&mut builder, &MiddlewareSpec::new("m", "ok").methods(["NOT A METHOD"]))
            .await
            .unwrap_err();
        assert!(matches!(err, MountError::InvalidScope { .. }));
    }

    #[tokio::test]
    async fn test_factories_share_globals_and_template() {
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let seen_in_factory = Arc::clone(&seen);
        let mut registry = ModuleRegistry::new();
        registry.register(
            "inspect",
            SyncFactory::new(move |ctx| {
                let counter = {
                    let mut globals = ctx.globals().write();
                    let next = globals.get("count").and_then(Value::as_u64).unwrap_or(0) + 1;
                    globals.insert("count".into(), json!(next));
                    next
                };
                seen_in_factory
                    .lock()
                    .push((ctx.name().to_string(), counter, ctx.template()["engine"].clone()));
                Ok(Arc::new(StatusResponder(StatusCode::OK)) as Arc<dyn Middleware>)
            }),
        );

        let mut initial = Map::new();
        initial.insert("site".into(), json!("example"));
        let mounter = PipelineMounter::new(Arc::new(registry))
            .with_globals(shared_globals(initial))
            .with_template(json!({"engine": "tera"}));
        let mut builder = Pipeline::builder();
        mounter
            .mount_all(
                &mut builder,
                &[MiddlewareSpec::new("a", "inspect"), MiddlewareSpec::new("b", "inspect")],
            )
            .await
            .unwrap();

        assert_eq!(
            *seen.lock(),
            [
                ("a".to_string(), 1, json!("tera")),
                ("b".to_string(), 2, json!("tera")),
            ]
        );
        assert_eq!(mounter.globals().read()["site"], "example");
    }
}
