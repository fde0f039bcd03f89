//! Shared utilities for integration testing.
#![allow(dead_code)]

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, Method, Uri},
    routing::any,
    Json, Router,
};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

use lb_proxy::config::{BackendConfig, PersistedConfig, ProxyConfig, Strategy};
use lb_proxy::http::HttpServer;
use lb_proxy::lifecycle::Shutdown;
use lb_proxy::load_balancer::TargetPool;

async fn echo(
    State(name): State<&'static str>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Json<Value> {
    if uri.path().starts_with("/slow") {
        tokio::time::sleep(Duration::from_millis(200)).await;
    }
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok()).map(str::to_string);
    Json(json!({
        "backend": name,
        "method": method.as_str(),
        "path": uri.path(),
        "query": uri.query(),
        "x_test": header("x-test"),
        "x_forwarded_for": header("x-forwarded-for"),
        "x_request_id": header("x-request-id"),
        "body": String::from_utf8_lossy(&body),
    }))
}

/// Start an upstream that answers every request with a JSON echo of it.
/// Paths under `/slow` answer after 200ms.
pub async fn start_echo_backend(name: &'static str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = Router::new()
        .route("/", any(echo))
        .route("/{*path}", any(echo))
        .with_state(name);
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

/// Start an upstream that accepts connections and never answers.
pub async fn start_hanging_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let _held = socket;
                tokio::time::sleep(Duration::from_secs(3600)).await;
            });
        }
    });
    addr
}

/// An address nothing listens on.
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

pub fn url(addr: SocketAddr) -> String {
    format!("http://{}", addr)
}

/// A proxy listener over `pool` with no health probe running.
pub struct TestProxy {
    pub addr: SocketAddr,
    pub pool: Arc<TargetPool>,
    pub shutdown: Shutdown,
}

pub async fn start_proxy(strategy: Strategy, urls: &[String], request_timeout: Duration) -> TestProxy {
    let pool = Arc::new(TargetPool::from_urls(urls).unwrap());
    let mut config = ProxyConfig::new(0, strategy, Duration::from_secs(60));
    config.request_timeout = Some(request_timeout.into());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let server = HttpServer::new(&config, pool.clone());
    let rx = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, rx).await;
    });

    TestProxy { addr, pool, shutdown }
}

/// Configuration with ephemeral listeners on loopback.
pub fn ephemeral_config(strategy: Strategy, urls: &[String]) -> PersistedConfig {
    let mut proxy = ProxyConfig::new(0, strategy, Duration::from_millis(100));
    proxy.host = Some("127.0.0.1".into());
    proxy.admin_port = Some(0);
    proxy.probe_timeout = Some(Duration::from_millis(200).into());
    PersistedConfig {
        proxy,
        backends: urls.iter().cloned().map(BackendConfig::from).collect(),
    }
}

pub fn write_config(path: &Path, config: &PersistedConfig) {
    std::fs::write(path, serde_json::to_vec_pretty(config).unwrap()).unwrap();
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

/// Poll `check` until it holds or two seconds pass.
pub async fn eventually<F: Fn() -> bool>(check: F) -> bool {
    for _ in 0..40 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    check()
}
