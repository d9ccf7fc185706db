//! The HTTP server.
//!
//! Accepts HTTP/1.1 connections with hyper, buffers each request body and
//! hands the request to the [`Pipeline`]. Everything the client sees comes
//! from the pipeline, except the transport failures answered here:
//! unreadable bodies (`400`), oversized bodies (`413`) and timeouts
//! (`408`, `504`).

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use http::{Request, StatusCode};
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use tessera_middleware::{empty_response, MiddlewareContext, Pipeline, Response};
use tokio::net::{TcpListener, TcpStream};

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::shutdown::{ConnectionTracker, ShutdownSignal};

/// Address of the connected client, available to middlewares as a context
/// extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientAddr(pub SocketAddr);

/// Serves a pipeline over HTTP.
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use tessera_server::{Server, ServerConfig};
///
/// let server = Server::new(ServerConfig::default(), Arc::new(pipeline));
/// server.run().await?;
/// ```
#[derive(Debug)]
pub struct Server {
    config: ServerConfig,
    pipeline: Arc<Pipeline>,
}

impl Server {
    /// A server for `pipeline`.
    #[must_use]
    pub fn new(config: ServerConfig, pipeline: Arc<Pipeline>) -> Self {
        Self { config, pipeline }
    }

    /// The configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// The pipeline requests are dispatched into.
    #[must_use]
    pub fn pipeline(&self) -> &Arc<Pipeline> {
        &self.pipeline
    }

    /// Binds the configured address and serves until SIGTERM or SIGINT.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Bind`] if the address cannot be bound.
    pub async fn run(self) -> Result<(), ServerError> {
        self.run_with_shutdown(ShutdownSignal::with_os_signals()).await
    }

    /// Binds the configured address and serves until `shutdown` triggers.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Bind`] if the address cannot be bound.
    pub async fn run_with_shutdown(self, shutdown: ShutdownSignal) -> Result<(), ServerError> {
        let listener = self.bind().await?;
        self.serve(listener, shutdown).await
    }

    /// Binds the configured address.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Bind`] if the address cannot be bound.
    pub async fn bind(&self) -> Result<TcpListener, ServerError> {
        let addr = self.config.bind_addr();
        TcpListener::bind(addr.as_str())
            .await
            .map_err(|source| ServerError::Bind { addr, source })
    }

    /// Serves connections from an already bound listener until `shutdown`
    /// triggers, then waits up to the shutdown timeout for open connections.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Io`] if the listener address cannot be read.
    pub async fn serve(self, listener: TcpListener, shutdown: ShutdownSignal) -> Result<(), ServerError> {
        let local_addr = listener.local_addr()?;
        tracing::info!(address = %local_addr, "listening");

        let server = Arc::new(self);
        let tracker = ConnectionTracker::new();

        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, remote_addr)) => {
                        let server = Arc::clone(&server);
                        let token = tracker.acquire();
                        let shutdown = shutdown.clone();
                        tokio::spawn(async move {
                            if let Err(e) = server.handle_connection(stream, remote_addr, shutdown).await {
                                tracing::debug!(client = %remote_addr, error = %e, "connection error");
                            }
                            drop(token);
                        });
                    }
                    Err(e) => tracing::error!(error = %e, "failed to accept connection"),
                },
                () = shutdown.recv() => {
                    tracing::info!("shutdown signal received, no longer accepting connections");
                    break;
                }
            }
        }

        let timeout = server.config.shutdown_timeout();
        tokio::select! {
            () = tracker.wait_for_shutdown() => tracing::info!("all connections closed"),
            () = tokio::time::sleep(timeout) => tracing::warn!(
                active = tracker.active_connections(),
                "shutdown timeout reached with connections still open"
            ),
        }

        tracing::info!("server stopped");
        Ok(())
    }

    async fn handle_connection(
        self: &Arc<Self>,
        stream: TcpStream,
        remote_addr: SocketAddr,
        shutdown: ShutdownSignal,
    ) -> Result<(), hyper::Error> {
        let io = TokioIo::new(stream);
        let server = Arc::clone(self);
        let service = service_fn(move |request: Request<Incoming>| {
            let server = Arc::clone(&server);
            async move { Ok::<_, Infallible>(server.handle_request(request, remote_addr).await) }
        });

        let conn = http1::Builder::new().serve_connection(io, service);
        tokio::pin!(conn);

        tokio::select! {
            result = conn.as_mut() => result,
            () = shutdown.recv() => {
                // let the request in progress finish, refuse further ones
                conn.as_mut().graceful_shutdown();
                conn.await
            }
        }
    }

    async fn handle_request(&self, request: Request<Incoming>, remote_addr: SocketAddr) -> Response {
        let timeout = self.config.request_timeout();
        let (parts, body) = request.into_parts();

        let limited = Limited::new(body, self.config.max_body_size());
        let body = match tokio::time::timeout(timeout, limited.collect()).await {
            Ok(Ok(collected)) => collected.to_bytes(),
            Ok(Err(e)) if e.is::<LengthLimitError>() => {
                tracing::debug!(limit = self.config.max_body_size(), "request body too large");
                return empty_response(StatusCode::PAYLOAD_TOO_LARGE);
            }
            Ok(Err(e)) => {
                tracing::debug!(error = %e, "failed to read request body");
                return empty_response(StatusCode::BAD_REQUEST);
            }
            Err(_) => return empty_response(StatusCode::REQUEST_TIMEOUT),
        };
        let request = Request::from_parts(parts, Full::new(body));

        let mut ctx = MiddlewareContext::new();
        ctx.set_extension(ClientAddr(remote_addr));
        let method = request.method().clone();
        let path = request.uri().path().to_string();

        let handled = tokio::time::timeout(timeout, self.pipeline.handle_with_context(&mut ctx, request)).await;
        let response = handled.unwrap_or_else(|_| {
            tracing::warn!(request_id = %ctx.request_id(), %method, %path, "request timed out");
            empty_response(StatusCode::GATEWAY_TIMEOUT)
        });

        tracing::debug!(
            request_id = %ctx.request_id(),
            %method,
            %path,
            status = response.status().as_u16(),
            duration_ms = u64::try_from(ctx.elapsed().as_millis()).unwrap_or(u64::MAX),
            "request completed"
        );
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tessera_middleware::{Mount, Scope, StatusResponder};

    fn server() -> Server {
        let mut builder = Pipeline::builder();
        builder.mount("ok", Scope::new(), Arc::new(StatusResponder(StatusCode::OK)));
        let config = ServerConfig::builder()
            .host("127.0.0.1")
            .port(0)
            .shutdown_timeout(Duration::from_millis(100))
            .build();
        Server::new(config, Arc::new(builder.build()))
    }

    #[tokio::test]
    async fn test_run_and_shutdown() {
        let shutdown = ShutdownSignal::new();
        shutdown.trigger();

        let result = tokio::time::timeout(Duration::from_secs(5), server().run_with_shutdown(shutdown)).await;
        assert!(matches!(result, Ok(Ok(()))));
    }

    #[tokio::test]
    async fn test_bind_error() {
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = taken.local_addr().unwrap().port();

        let config = ServerConfig::builder().host("127.0.0.1").port(port).build();
        let server = Server::new(config, Arc::new(Pipeline::default()));
        let err = server.run_with_shutdown(ShutdownSignal::new()).await.unwrap_err();
        assert!(matches!(err, ServerError::Bind { ref addr, .. } if *addr == format!("127.0.0.1:{port}")));
    }
}
