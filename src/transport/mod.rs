//! Public endpoints for the local listening port.

pub mod cloudflare;
pub mod local;
pub mod ngrok;

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Child;
use tokio::time::error::Elapsed;
use tracing::{info, warn};

use crate::common::config::{AppConfig, Transport};

pub use cloudflare::CloudflareProvider;
pub use local::LanProvider;
pub use ngrok::NgrokProvider;

const TUNNEL_STARTUP_TIMEOUT: Duration = Duration::from_secs(20);
const TUNNEL_EXIT_TIMEOUT: Duration = Duration::from_secs(5);

/// Opens public endpoints that forward to a local port.
#[async_trait]
pub trait TunnelProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn open(&self, local_port: u16) -> Result<Box<dyn Tunnel>>;
}

/// An open public endpoint.
#[async_trait]
pub trait Tunnel: Send + Sync {
    /// Public base URL, e.g. `https://abc.trycloudflare.com`
    fn url(&self) -> &str;

    async fn close(&mut self) -> Result<()>;
}

/// Provider for the configured transport.
pub fn provider_for(config: &AppConfig) -> Arc<dyn TunnelProvider> {
    match config.transport {
        Transport::Cloudflare => Arc::new(CloudflareProvider),
        Transport::Ngrok => Arc::new(NgrokProvider::new(config.ngrok.authtoken.clone())),
        Transport::Local => Arc::new(LanProvider),
    }
}

pub(crate) async fn with_startup_timeout<F: Future>(future: F) -> Result<F::Output, Elapsed> {
    tokio::time::timeout(TUNNEL_STARTUP_TIMEOUT, future).await
}

/// Kill a tunnel agent process and wait briefly for it to exit.
pub(crate) async fn shutdown_child(process: &mut Child, label: &str) -> Result<()> {
    if let Err(e) = process.kill().await {
        // failed kill often means the process is already dead
        warn!("Failed to signal {} process: {}", label, e);
        return Ok(());
    }

    match tokio::time::timeout(TUNNEL_EXIT_TIMEOUT, process.wait()).await {
        Ok(Ok(status)) => {
            info!("{} process exited with status: {}", label, status);
            Ok(())
        }
        Ok(Err(e)) => Err(e).with_context(|| format!("Failed to wait for {label} process")),
        Err(_) => {
            warn!("{} process did not exit after 5 seconds, may be stuck", label);
            Ok(())
        }
    }
}

pub(crate) fn get_available_port() -> Option<u16> {
    std::net::TcpListener::bind("127.0.0.1:0")
        .ok()
        .and_then(|l| l.local_addr().ok())
        .map(|a| a.port())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_matches_configured_transport() {
        let mut config = AppConfig::default();
        assert_eq!(provider_for(&config).name(), "cloudflare");

        config.transport = Transport::Ngrok;
        assert_eq!(provider_for(&config).name(), "ngrok");

        config.transport = Transport::Local;
        assert_eq!(provider_for(&config).name(), "local");
    }

    #[test]
    fn available_port_is_nonzero() {
        assert!(get_available_port().is_some_and(|p| p != 0));
    }
}
