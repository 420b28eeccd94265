//! Shared utilities for integration testing.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{body::Body, extract::State, http::Request, routing::any, Router};
use form2json::{Form2JsonConfig, HttpServer, Shutdown};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

/// A request as seen by the mock upstream.
#[derive(Debug, Clone)]
#[allow(dead_code)]
pub struct Captured {
    pub method: String,
    pub path: String,
    pub headers: axum::http::HeaderMap,
    pub body: Vec<u8>,
}

pub type Captures = Arc<Mutex<Vec<Captured>>>;

/// Start a mock upstream that records every request and answers "ok".
#[allow(dead_code)]
pub async fn start_recording_backend() -> (SocketAddr, Captures) {
    let captures: Captures = Arc::default();

    async fn record(State(captures): State<Captures>, request: Request<Body>) -> &'static str {
        let (parts, body) = request.into_parts();
        let body = axum::body::to_bytes(body, usize::MAX).await.unwrap();
        captures.lock().unwrap().push(Captured {
            method: parts.method.to_string(),
            path: parts.uri.path().to_string(),
            headers: parts.headers,
            body: body.to_vec(),
        });
        "ok"
    }

    let app = Router::new()
        .route("/", any(record))
        .route("/{*path}", any(record))
        .with_state(captures.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    (addr, captures)
}

/// A running form2json server.
#[allow(dead_code)]
pub struct TestServer {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub config_updates: mpsc::UnboundedSender<Form2JsonConfig>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Start form2json on an ephemeral port.
pub async fn start_server(config: Form2JsonConfig) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let (config_updates, updates_rx) = mpsc::unbounded_channel();
    let server = HttpServer::new(config);
    let server_shutdown = shutdown.subscribe();

    tokio::spawn(async move {
        let _ = server.run(listener, updates_rx, server_shutdown).await;
    });

    tokio::time::sleep(Duration::from_millis(50)).await;

    TestServer {
        addr,
        shutdown,
        config_updates,
    }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
