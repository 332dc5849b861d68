#![allow(dead_code)]

pub mod config_test_utils;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    response::Response,
    Router,
};
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tokio::sync::Notify;

use sharegate::server::routes;
use sharegate::share::{LinkEncoder, LocalFileGateway, ManagerSettings, SessionManager};
use sharegate::transport::{Tunnel, TunnelProvider};

pub const TEST_PORT: u16 = 4321;
pub const TUNNEL_URL: &str = "https://test-share.trycloudflare.com";

//===============
// Mock Tunnels
//===============
#[derive(Default)]
pub struct TunnelCounters {
    pub opens: AtomicUsize,
    pub closes: AtomicUsize,
    pub fail_open: AtomicBool,
    pub fail_close: AtomicBool,
    /// Signaled each time an open begins
    pub open_started: Notify,
}

/// Provider that hands out fake tunnels and records every call.
#[derive(Clone, Default)]
pub struct MockTunnelProvider {
    pub counters: Arc<TunnelCounters>,
    open_delay: Option<Duration>,
}

impl MockTunnelProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_open_delay(delay: Duration) -> Self {
        Self {
            open_delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn opens(&self) -> usize {
        self.counters.opens.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.counters.closes.load(Ordering::SeqCst)
    }

    pub fn fail_open(&self, fail: bool) {
        self.counters.fail_open.store(fail, Ordering::SeqCst);
    }

    /// Resolves once some call to `open` has begun.
    pub async fn wait_for_open(&self) {
        self.counters.open_started.notified().await;
    }

    pub fn fail_close(&self, fail: bool) {
        self.counters.fail_close.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl TunnelProvider for MockTunnelProvider {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn open(&self, _local_port: u16) -> Result<Box<dyn Tunnel>> {
        self.counters.open_started.notify_one();
        if let Some(delay) = self.open_delay {
            tokio::time::sleep(delay).await;
        }
        if self.counters.fail_open.load(Ordering::SeqCst) {
            bail!("mock tunnel refused to open");
        }
        self.counters.opens.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockTunnel {
            url: TUNNEL_URL.to_string(),
            counters: self.counters.clone(),
        }))
    }
}

struct MockTunnel {
    url: String,
    counters: Arc<TunnelCounters>,
}

#[async_trait]
impl Tunnel for MockTunnel {
    fn url(&self) -> &str {
        &self.url
    }

    async fn close(&mut self) -> Result<()> {
        self.counters.closes.fetch_add(1, Ordering::SeqCst);
        if self.counters.fail_close.load(Ordering::SeqCst) {
            bail!("mock tunnel refused to close");
        }
        Ok(())
    }
}

/// Link encoder that always fails.
pub struct FailingLinkEncoder;

impl LinkEncoder for FailingLinkEncoder {
    fn encode(&self, _url: &str) -> Result<String> {
        Err(anyhow!("QR rendering failed"))
    }
}

//===============
// Factories
//===============
pub fn settings(confirm_window: Duration) -> ManagerSettings {
    ManagerSettings {
        listen_port: TEST_PORT,
        confirm_window,
    }
}

pub fn create_manager(provider: &MockTunnelProvider, confirm_window: Duration) -> SessionManager {
    SessionManager::new(settings(confirm_window), Arc::new(provider.clone()))
}

pub fn create_manager_with_failing_links(
    provider: &MockTunnelProvider,
    confirm_window: Duration,
) -> SessionManager {
    SessionManager::with_collaborators(
        settings(confirm_window),
        Arc::new(provider.clone()),
        Arc::new(FailingLinkEncoder),
        Arc::new(LocalFileGateway),
    )
}

pub fn create_test_app(
    provider: &MockTunnelProvider,
    confirm_window: Duration,
) -> (Router, SessionManager) {
    let manager = create_manager(provider, confirm_window);
    let app = routes::create_router(&manager);
    (app, manager)
}

pub fn setup_temp_dir() -> TempDir {
    TempDir::new().expect("Failed to create temp directory")
}

pub fn write_file(dir: &TempDir, name: &str, contents: &[u8]) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, contents).expect("Failed to write test file");
    path
}

pub fn path_str(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

//=================
// Request Builders
//=================
pub fn build_request(method: Method, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .expect("Failed to build request")
}

pub fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("Failed to build request")
}

pub fn start_request(path: &Path) -> Request<Body> {
    json_request(
        Method::POST,
        "/api/start",
        serde_json::json!({ "filePath": path_str(path) }),
    )
}

//=================
// Response Helpers
//=================
pub async fn extract_bytes(response: Response) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .expect("Failed to read body")
        .to_bytes()
        .to_vec()
}

pub async fn extract_json(response: Response) -> Value {
    let bytes = extract_bytes(response).await;
    serde_json::from_slice(&bytes).expect("Response body is not JSON")
}

/// Assert status plus the `{message, error: {type, message}}` body shape.
pub async fn assert_error_response(response: Response, status: StatusCode, error_type: &str) -> Value {
    assert_eq!(response.status(), status);
    let json = extract_json(response).await;
    assert_eq!(json["error"]["type"], error_type);
    assert!(json["message"].is_string(), "error body carries a message");
    assert_eq!(json["message"], json["error"]["message"]);
    json
}
