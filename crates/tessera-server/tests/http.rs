//! Requests over a real socket.

use std::sync::Arc;
use std::time::Duration;

use http::StatusCode;
use tessera_middleware::{
    empty_response, FnMiddleware, HandlerError, Mount, Pipeline, Request, Scope,
};
use tessera_server::{ClientAddr, Server, ServerConfig, ShutdownSignal};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

fn pipeline() -> Pipeline {
    let mut builder = Pipeline::builder();
    builder.mount(
        "echo",
        Scope::new().with_paths(["/echo"]),
        Arc::new(FnMiddleware::new(|ctx, request: Request, _next| {
            let client = ctx.get_extension::<ClientAddr>().map(|c| c.0.ip().to_string());
            Box::pin(async move {
                let body = request.into_body();
                let mut response = http::Response::new(body);
                if let Some(client) = client {
                    response
                        .headers_mut()
                        .insert("x-client", client.parse().unwrap());
                }
                Ok(response)
            })
        })),
    );
    builder.mount(
        "fail",
        Scope::new().with_paths(["/fail"]),
        Arc::new(FnMiddleware::new(|_ctx, _request, _next| {
            Box::pin(async move { Err(HandlerError::with_status(StatusCode::SERVICE_UNAVAILABLE, "down")) })
        })),
    );
    builder.mount(
        "created",
        Scope::new().with_paths(["/created"]),
        Arc::new(FnMiddleware::new(|_ctx, _request, _next| {
            Box::pin(async move { Ok(empty_response(StatusCode::CREATED)) })
        })),
    );
    builder.build()
}

async fn start() -> (std::net::SocketAddr, ShutdownSignal, tokio::task::JoinHandle<()>) {
    start_with(ServerConfig::builder().shutdown_timeout(Duration::from_millis(200)).build()).await
}

async fn start_with(config: ServerConfig) -> (std::net::SocketAddr, ShutdownSignal, tokio::task::JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = Server::new(config, Arc::new(pipeline()));
    let shutdown = ShutdownSignal::new();
    let signal = shutdown.clone();
    let handle = tokio::spawn(async move {
        server.serve(listener, signal).await.unwrap();
    });
    (addr, shutdown, handle)
}

async fn send(addr: std::net::SocketAddr, raw: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(raw.as_bytes()).await.unwrap();
    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();
    response
}

#[tokio::test]
async fn test_requests_reach_pipeline() {
    let (addr, shutdown, handle) = start().await;

    let response = send(
        addr,
        "POST /echo HTTP/1.1\r\nHost: localhost\r\nContent-Length: 5\r\nConnection: close\r\n\r\nhello",
    )
    .await;
    assert!(response.starts_with("HTTP/1.1 200 OK"), "{response}");
    assert!(response.contains("x-client: 127.0.0.1"), "{response}");
    assert!(response.ends_with("hello"), "{response}");

    let response = send(addr, "GET /created HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n").await;
    assert!(response.starts_with("HTTP/1.1 201 Created"), "{response}");

    let response = send(addr, "GET /fail HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n").await;
    assert!(response.starts_with("HTTP/1.1 503"), "{response}");
    assert!(response.contains("content-length: 0"), "{response}");

    let response = send(addr, "GET /missing HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n").await;
    assert!(response.starts_with("HTTP/1.1 404"), "{response}");

    shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("server should stop")
        .unwrap();
}

#[tokio::test]
async fn test_oversized_body_rejected() {
    let config = ServerConfig::builder()
        .shutdown_timeout(Duration::from_millis(200))
        .max_body_size(16)
        .build();
    let (addr, shutdown, handle) = start_with(config).await;

    let body = "x".repeat(32);
    let response = send(
        addr,
        &format!("POST /echo HTTP/1.1\r\nHost: localhost\r\nContent-Length: 32\r\nConnection: close\r\n\r\n{body}"),
    )
    .await;
    assert!(response.starts_with("HTTP/1.1 413"), "{response}");

    let response = send(
        addr,
        "POST /echo HTTP/1.1\r\nHost: localhost\r\nContent-Length: 5\r\nConnection: close\r\n\r\nsmall",
    )
    .await;
    assert!(response.ends_with("small"), "{response}");

    shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("server should stop")
        .unwrap();
}
