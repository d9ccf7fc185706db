//! Assembling an instance from configuration.

use std::sync::Arc;

use serde_json::Value;
use tessera_config::{validate, ConfigLoader, DocumentSource, ProtocolRegistry, TesseraConfig};
use tessera_middleware::stages::{CookieParser, CorsMiddleware};
use tessera_middleware::{
    shared_globals, MiddlewareAssembler, MiddlewareSpec, ModuleLoader, ModuleRegistry, Mount,
    Pipeline, PipelineMounter, Precedence, Request, Response, Scope, SharedGlobals,
};
use tessera_server::{EngineSettings, Server, ServerConfig, ShutdownSignal};
use tessera_telemetry::{init_logging, LogConfig, TelemetryError};

use crate::error::TesseraResult;

/// Name the CORS stage is mounted under.
pub const CORS_STAGE: &str = "cors";

/// Name the cookie parsing stage is mounted under, right after CORS.
pub const COOKIE_STAGE: &str = "cookies";

/// Loads `source`, mounts its middlewares plus `additional` ones and returns
/// the ready instance.
///
/// Uses the default protocols, an empty module registry and
/// [`Precedence::ConfigFirst`]; see [`Tessera::builder`] to change them.
///
/// # Errors
///
/// Any configuration or mounting failure. Nothing is listening yet when this
/// returns.
pub async fn tessera<I>(source: impl Into<DocumentSource>, additional: I) -> TesseraResult<Tessera>
where
    I: IntoIterator<Item = MiddlewareSpec>,
{
    Tessera::builder().middlewares(additional).build(source).await
}

/// An assembled server: validated configuration plus mounted pipeline.
#[derive(Debug)]
pub struct Tessera {
    config: TesseraConfig,
    document: Value,
    pipeline: Arc<Pipeline>,
    globals: SharedGlobals,
    server: ServerConfig,
}

impl Tessera {
    /// A builder with defaults.
    #[must_use]
    pub fn builder() -> TesseraBuilder {
        TesseraBuilder::new()
    }

    /// The validated configuration.
    #[must_use]
    pub fn config(&self) -> &TesseraConfig {
        &self.config
    }

    /// The resolved configuration document, after inheritance and breakdown.
    #[must_use]
    pub fn document(&self) -> &Value {
        &self.document
    }

    /// The mounted pipeline.
    #[must_use]
    pub fn pipeline(&self) -> &Arc<Pipeline> {
        &self.pipeline
    }

    /// Globals shared by all middlewares.
    #[must_use]
    pub fn globals(&self) -> &SharedGlobals {
        &self.globals
    }

    /// The `server.express` settings.
    #[must_use]
    pub fn settings(&self) -> &EngineSettings {
        self.server.settings()
    }

    /// Listener configuration.
    #[must_use]
    pub fn server_config(&self) -> &ServerConfig {
        &self.server
    }

    /// Dispatches a request in-process, without a listener.
    pub async fn handle(&self, request: Request) -> Response {
        self.pipeline.handle(request).await
    }

    /// Installs the global log subscriber at the configured `server.logLevel`.
    ///
    /// # Errors
    ///
    /// Fails if another global subscriber is already installed.
    pub fn init_logging(&self) -> TesseraResult<()> {
        init_logging(&LogConfig::from(self.config.log_level()))?;
        Ok(())
    }

    /// Starts listening and serves until SIGTERM or SIGINT.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener cannot be bound.
    pub async fn start(self) -> TesseraResult<()> {
        self.start_with_shutdown(ShutdownSignal::with_os_signals()).await
    }

    /// Starts listening and serves until `shutdown` triggers.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener cannot be bound.
    pub async fn start_with_shutdown(self, shutdown: ShutdownSignal) -> TesseraResult<()> {
        match self.init_logging() {
            // a subscriber installed by the host wins
            Err(crate::TesseraError::Telemetry(TelemetryError::LoggingInit(reason))) => {
                tracing::debug!(%reason, "keeping existing log subscriber");
            }
            other => other?,
        }
        self.into_server().run_with_shutdown(shutdown).await?;
        Ok(())
    }

    /// The server for this instance, for hosts that drive it themselves.
    #[must_use]
    pub fn into_server(self) -> Server {
        Server::new(self.server, self.pipeline)
    }
}

/// Configures how an instance is assembled.
///
/// ```no_run
/// use std::sync::Arc;
/// use http::StatusCode;
/// use tessera::{Tessera, Precedence};
/// use tessera::middleware::{InstanceFactory, ModuleRegistry, StatusResponder};
///
/// # async fn run() -> Result<(), tessera::TesseraError> {
/// let modules = ModuleRegistry::new()
///     .with("health", InstanceFactory(Arc::new(StatusResponder(StatusCode::NO_CONTENT))));
///
/// let app = Tessera::builder()
///     .modules(modules)
///     .precedence(Precedence::ProgrammaticFirst)
///     .build("config/app.json")
///     .await?;
/// app.start().await
/// # }
/// ```
pub struct TesseraBuilder {
    protocols: ProtocolRegistry,
    modules: Arc<dyn ModuleLoader>,
    precedence: Precedence,
    cors: Option<CorsMiddleware>,
    cookies: Option<CookieParser>,
    additional: Vec<MiddlewareSpec>,
}

impl Default for TesseraBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TesseraBuilder {
    /// Default protocols, no modules, config-first precedence, permissive
    /// CORS and cookie parsing.
    #[must_use]
    pub fn new() -> Self {
        Self {
            protocols: ProtocolRegistry::with_defaults(),
            modules: Arc::new(ModuleRegistry::new()),
            precedence: Precedence::default(),
            cors: Some(CorsMiddleware::new()),
            cookies: Some(CookieParser::new()),
            additional: Vec::new(),
        }
    }

    /// Protocols recognised in configuration values.
    #[must_use]
    pub fn protocols(mut self, protocols: ProtocolRegistry) -> Self {
        self.protocols = protocols;
        self
    }

    /// Resolves middleware `module` references.
    #[must_use]
    pub fn modules(mut self, modules: impl ModuleLoader) -> Self {
        self.modules = Arc::new(modules);
        self
    }

    /// Collision rule between configured and programmatic middlewares.
    #[must_use]
    pub fn precedence(mut self, precedence: Precedence) -> Self {
        self.precedence = precedence;
        self
    }

    /// Replaces the CORS stage mounted ahead of all middlewares; `None`
    /// mounts none.
    #[must_use]
    pub fn cors(mut self, cors: Option<CorsMiddleware>) -> Self {
        self.cors = cors;
        self
    }

    /// Replaces the cookie parsing stage; `None` mounts none.
    #[must_use]
    pub fn cookies(mut self, cookies: Option<CookieParser>) -> Self {
        self.cookies = cookies;
        self
    }

    /// Adds a programmatic middleware.
    #[must_use]
    pub fn middleware(mut self, spec: MiddlewareSpec) -> Self {
        self.additional.push(spec);
        self
    }

    /// Adds programmatic middlewares.
    #[must_use]
    pub fn middlewares<I>(mut self, specs: I) -> Self
    where
        I: IntoIterator<Item = MiddlewareSpec>,
    {
        self.additional.extend(specs);
        self
    }

    /// Loads the configuration and mounts the pipeline.
    ///
    /// # Errors
    ///
    /// Any configuration or mounting failure.
    pub async fn build(self, source: impl Into<DocumentSource>) -> TesseraResult<Tessera> {
        let document = ConfigLoader::new()
            .with_registry(self.protocols)
            .resolve(source)
            .await?;
        let config = validate(&document)?;

        let specs = MiddlewareAssembler::new()
            .precedence(self.precedence)
            .assemble(&config.middlewares, self.additional);

        let globals = shared_globals(config.globals.clone());
        let mounter = PipelineMounter::new(self.modules)
            .with_globals(Arc::clone(&globals))
            .with_template(config.template.clone());

        let mut builder = Pipeline::builder();
        if let Some(cors) = self.cors {
            builder.mount(CORS_STAGE, Scope::new(), Arc::new(cors));
        }
        if let Some(cookies) = self.cookies {
            builder.mount(COOKIE_STAGE, Scope::new(), Arc::new(cookies));
        }
        mounter.mount_all(&mut builder, &specs).await?;

        let server = ServerConfig::from_config(&config);
        tracing::debug!(
            address = %server.bind_addr(),
            log_level = %config.log_level(),
            "instance assembled"
        );

        Ok(Tessera {
            config,
            document,
            pipeline: Arc::new(builder.build()),
            globals,
            server,
        })
    }
}

impl std::fmt::Debug for TesseraBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TesseraBuilder")
            .field("protocols", &self.protocols)
            .field("precedence", &self.precedence)
            .field("cors", &self.cors)
            .field("cookies", &self.cookies)
            .field("additional", &self.additional)
            .finish_non_exhaustive()
    }
}
