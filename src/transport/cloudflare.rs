//! Cloudflare quick tunnel process management.

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr, Command};
use tracing::warn;

use super::{get_available_port, shutdown_child, with_startup_timeout, Tunnel, TunnelProvider};

const TUNNEL_POLL_INTERVAL: Duration = Duration::from_millis(200);
const START_MAX_ATTEMPTS: u8 = 3;
const START_RETRY_BACKOFF: Duration = Duration::from_millis(300);

#[derive(Deserialize)]
struct QuickTunnelResponse {
    hostname: String,
}

/// Spawns `cloudflared` quick tunnels.
#[derive(Debug, Clone, Copy, Default)]
pub struct CloudflareProvider;

/// Running `cloudflared` process and its resolved public URL.
pub struct CloudflareTunnel {
    process: Child,
    url: String,
}

#[derive(Debug, Error)]
enum CloudflareError {
    #[error("cloudflared binary not found")]
    BinaryMissing,
    #[error("no free local port available for cloudflared metrics")]
    MetricsPortUnavailable,
    #[error("cloudflared exited before URL became available (status: {0})")]
    ProcessExited(String),
    #[error("timed out waiting for Cloudflare tunnel URL")]
    UrlTimeout,
    #[error("cloudflared startup failed: {0}")]
    StartupFailed(String),
}

fn map_start_error(err: CloudflareError) -> anyhow::Error {
    match err {
        CloudflareError::BinaryMissing => anyhow::anyhow!(
            "Failed to start Cloudflare tunnel: cloudflared is not installed.\n\
             Install it from https://developers.cloudflare.com/cloudflare-one/connections/connect-networks/downloads/ \
             or choose another transport."
        ),
        CloudflareError::MetricsPortUnavailable => anyhow::anyhow!(
            "No free local port for Cloudflare tunnel metrics. Close some local services and retry."
        ),
        CloudflareError::UrlTimeout => anyhow::anyhow!(
            "Timed out waiting for Cloudflare tunnel URL. Check your internet connection and firewall."
        ),
        CloudflareError::ProcessExited(status) => anyhow::anyhow!(
            "cloudflared exited before the tunnel URL became available (status: {status})"
        ),
        CloudflareError::StartupFailed(msg) => {
            anyhow::anyhow!("Failed to start Cloudflare tunnel: {msg}")
        }
    }
}

#[async_trait]
impl TunnelProvider for CloudflareProvider {
    fn name(&self) -> &'static str {
        "cloudflare"
    }

    #[tracing::instrument(skip(self))]
    async fn open(&self, local_port: u16) -> Result<Box<dyn Tunnel>> {
        let tunnel = CloudflareTunnel::start_with_retry(local_port)
            .await
            .map_err(map_start_error)?;
        Ok(Box::new(tunnel))
    }
}

#[async_trait]
impl Tunnel for CloudflareTunnel {
    fn url(&self) -> &str {
        &self.url
    }

    async fn close(&mut self) -> Result<()> {
        shutdown_child(&mut self.process, "cloudflared").await
    }
}

impl CloudflareTunnel {
    async fn start_with_retry(local_port: u16) -> Result<Self, CloudflareError> {
        let mut attempt = 1;
        loop {
            match Self::start_once(local_port).await {
                Ok(tunnel) => return Ok(tunnel),
                Err(err) if attempt < START_MAX_ATTEMPTS && is_retryable_start_error(&err) => {
                    warn!(
                        "Cloudflare tunnel startup attempt {}/{} failed: {}. Retrying...",
                        attempt, START_MAX_ATTEMPTS, err
                    );
                    tokio::time::sleep(START_RETRY_BACKOFF * u32::from(attempt)).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn start_once(local_port: u16) -> Result<Self, CloudflareError> {
        let metrics_port = get_available_port().ok_or(CloudflareError::MetricsPortUnavailable)?;

        let mut child = Command::new("cloudflared")
            .args([
                "tunnel",
                "--url",
                &format!("http://localhost:{local_port}"),
                "--metrics",
                &format!("localhost:{metrics_port}"),
                "--no-autoupdate",
                "--protocol",
                "http2",
            ])
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| {
                if err.kind() == std::io::ErrorKind::NotFound {
                    CloudflareError::BinaryMissing
                } else {
                    CloudflareError::StartupFailed(err.to_string())
                }
            })?;

        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(log_stderr(stderr));
        }

        let url = match with_startup_timeout(wait_for_url(metrics_port, &mut child)).await {
            Ok(Ok(u)) => u,
            Ok(Err(e)) => {
                if let Err(kill_err) = child.kill().await {
                    warn!("Failed to kill cloudflared after startup failure: {}", kill_err);
                }
                return Err(e);
            }
            Err(_) => {
                if let Err(kill_err) = child.kill().await {
                    warn!("Failed to kill cloudflared after startup timeout: {}", kill_err);
                }
                return Err(CloudflareError::UrlTimeout);
            }
        };

        Ok(Self {
            process: child,
            url,
        })
    }
}

async fn wait_for_url(metrics_port: u16, child: &mut Child) -> Result<String, CloudflareError> {
    let client = reqwest::Client::new();
    let api_url = format!("http://localhost:{metrics_port}/quicktunnel");

    loop {
        if let Some(status) = child
            .try_wait()
            .map_err(|err| CloudflareError::StartupFailed(err.to_string()))?
        {
            return Err(CloudflareError::ProcessExited(status.to_string()));
        }

        // connection refused is expected until the metrics server is up
        if let Ok(res) = client.get(&api_url).send().await {
            if let Ok(json) = res.json::<QuickTunnelResponse>().await {
                if !json.hostname.is_empty() {
                    return Ok(format!("https://{}", json.hostname));
                }
            }
        }

        tokio::time::sleep(TUNNEL_POLL_INTERVAL).await;
    }
}

fn is_retryable_start_error(error: &CloudflareError) -> bool {
    match error {
        CloudflareError::UrlTimeout | CloudflareError::ProcessExited(_) => true,
        CloudflareError::StartupFailed(msg) => {
            let text = msg.to_lowercase();
            text.contains("failed to bind")
                || text.contains("address already in use")
                || text.contains("connection refused")
        }
        CloudflareError::BinaryMissing | CloudflareError::MetricsPortUnavailable => false,
    }
}

// cloudflared logs everything to stderr; only surface problems
async fn log_stderr(stderr: ChildStderr) {
    let mut lines = BufReader::new(stderr).lines();

    while let Some(line) = lines.next_line().await.ok().flatten() {
        let lowercase_line = line.to_lowercase();
        if lowercase_line.contains("error") || lowercase_line.contains("fatal") {
            tracing::error!("cloudflared stderr: {}", line);
        }
    }
}
