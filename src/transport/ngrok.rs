//! ngrok agent process management.

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::{Child, Command};
use tracing::warn;

use super::{shutdown_child, with_startup_timeout, Tunnel, TunnelProvider};

/// Local inspection API of the ngrok agent.
const AGENT_API_URL: &str = "http://127.0.0.1:4040/api/tunnels";
const TUNNEL_POLL_INTERVAL: Duration = Duration::from_millis(250);
const LEGACY_TOKEN_ENV: &str = "NGROK_AUTH_TOKEN";

#[derive(Deserialize)]
struct TunnelList {
    tunnels: Vec<AgentTunnel>,
}

#[derive(Deserialize)]
struct AgentTunnel {
    public_url: String,
    proto: String,
    #[serde(default)]
    config: Option<AgentTunnelConfig>,
}

#[derive(Deserialize)]
struct AgentTunnelConfig {
    addr: String,
}

#[derive(Debug, Error)]
enum NgrokError {
    #[error("ngrok binary not found")]
    BinaryMissing,
    #[error("ngrok exited before URL became available (status: {0})")]
    ProcessExited(String),
    #[error("timed out waiting for ngrok tunnel URL")]
    UrlTimeout,
    #[error("ngrok startup failed: {0}")]
    StartupFailed(String),
}

fn map_start_error(err: NgrokError) -> anyhow::Error {
    match err {
        NgrokError::BinaryMissing => anyhow::anyhow!(
            "Failed to start ngrok tunnel: ngrok is not installed.\n\
             Install it from https://ngrok.com/download or choose another transport."
        ),
        NgrokError::ProcessExited(status) => anyhow::anyhow!(
            "ngrok exited before the tunnel URL became available (status: {status}). \
             Check that an authtoken is configured (ngrok.authtoken or NGROK_AUTHTOKEN)."
        ),
        NgrokError::UrlTimeout => anyhow::anyhow!(
            "Timed out waiting for ngrok tunnel URL. Check your internet connection."
        ),
        NgrokError::StartupFailed(msg) => anyhow::anyhow!("Failed to start ngrok tunnel: {msg}"),
    }
}

/// Spawns `ngrok http <port>` agents.
#[derive(Debug, Clone, Default)]
pub struct NgrokProvider {
    authtoken: Option<String>,
}

impl NgrokProvider {
    pub fn new(authtoken: Option<String>) -> Self {
        let authtoken = authtoken.or_else(|| std::env::var(LEGACY_TOKEN_ENV).ok());
        Self { authtoken }
    }
}

pub struct NgrokTunnel {
    process: Child,
    url: String,
}

#[async_trait]
impl TunnelProvider for NgrokProvider {
    fn name(&self) -> &'static str {
        "ngrok"
    }

    #[tracing::instrument(skip(self))]
    async fn open(&self, local_port: u16) -> Result<Box<dyn Tunnel>> {
        let tunnel = self.start(local_port).await.map_err(map_start_error)?;
        Ok(Box::new(tunnel))
    }
}

impl NgrokProvider {
    async fn start(&self, local_port: u16) -> Result<NgrokTunnel, NgrokError> {
        let mut command = Command::new("ngrok");
        command
            .args(["http", &local_port.to_string(), "--log", "false"])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        // env instead of argv so the token never shows up in `ps`
        if let Some(token) = &self.authtoken {
            command.env("NGROK_AUTHTOKEN", token);
        }

        let mut child = command.spawn().map_err(|err| {
            if err.kind() == std::io::ErrorKind::NotFound {
                NgrokError::BinaryMissing
            } else {
                NgrokError::StartupFailed(err.to_string())
            }
        })?;

        let url = match with_startup_timeout(wait_for_url(local_port, &mut child)).await {
            Ok(Ok(url)) => url,
            Ok(Err(e)) => {
                if let Err(kill_err) = child.kill().await {
                    warn!("Failed to kill ngrok after startup failure: {}", kill_err);
                }
                return Err(e);
            }
            Err(_) => {
                if let Err(kill_err) = child.kill().await {
                    warn!("Failed to kill ngrok after startup timeout: {}", kill_err);
                }
                return Err(NgrokError::UrlTimeout);
            }
        };

        Ok(NgrokTunnel {
            process: child,
            url,
        })
    }
}

#[async_trait]
impl Tunnel for NgrokTunnel {
    fn url(&self) -> &str {
        &self.url
    }

    async fn close(&mut self) -> Result<()> {
        shutdown_child(&mut self.process, "ngrok").await
    }
}

async fn wait_for_url(local_port: u16, child: &mut Child) -> Result<String, NgrokError> {
    let client = reqwest::Client::new();

    loop {
        if let Some(status) = child
            .try_wait()
            .map_err(|err| NgrokError::StartupFailed(err.to_string()))?
        {
            return Err(NgrokError::ProcessExited(status.to_string()));
        }

        if let Ok(res) = client.get(AGENT_API_URL).send().await {
            if let Ok(list) = res.json::<TunnelList>().await {
                if let Some(url) = select_public_url(&list, local_port) {
                    return Ok(url);
                }
            }
        }

        tokio::time::sleep(TUNNEL_POLL_INTERVAL).await;
    }
}

/// Pick the https tunnel forwarding to `local_port`.
///
/// Another agent may already own the inspection API, so tunnels for other
/// ports are ignored.
fn select_public_url(list: &TunnelList, local_port: u16) -> Option<String> {
    let port_suffix = format!(":{local_port}");
    list.tunnels
        .iter()
        .filter(|t| t.proto == "https")
        .find(|t| {
            t.config
                .as_ref()
                .map_or(true, |c| c.addr.ends_with(&port_suffix))
        })
        .map(|t| t.public_url.clone())
}
