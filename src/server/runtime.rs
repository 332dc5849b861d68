//! Runtime lifecycle: bind, serve, run a share from the CLI, and shutdown.

use anyhow::Result;
use console::style;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::watch;

use crate::common::config::{AppConfig, Transport};
use crate::server::routes;
use crate::share::{terminal_qr, ManagerSettings, SessionManager, SessionState};
use crate::transport::local::{bind_listener, spawn_server, BindScope};
use crate::transport::provider_for;
use crate::ui::{spinner, spinner_error, spinner_success};

const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// A listening server and the manager behind it.
pub struct RunningServer {
    pub manager: SessionManager,
    pub port: u16,
    handle: axum_server::Handle,
}

impl RunningServer {
    /// Stop any active share, then drain connections.
    pub async fn shutdown(self) {
        self.manager.shutdown().await;
        self.handle.graceful_shutdown(Some(SHUTDOWN_GRACE));
        tracing::info!("Server shutdown complete");
    }
}

fn bind_scope(transport: Transport) -> BindScope {
    match transport {
        Transport::Local => BindScope::AllInterfaces,
        Transport::Cloudflare | Transport::Ngrok => BindScope::Loopback,
    }
}

/// Bind the configured port and start serving.
pub async fn start_server(config: &AppConfig) -> Result<RunningServer> {
    let (listener, port) = bind_listener(bind_scope(config.transport), config.server.port)?;

    let settings = ManagerSettings {
        listen_port: port,
        confirm_window: config.share.confirm_window(),
    };
    let manager = SessionManager::new(settings, provider_for(config));
    let app = routes::create_router(&manager);
    let handle = spawn_server(listener, app);

    tracing::info!(
        port,
        transport = config.transport.label(),
        "Server listening"
    );

    Ok(RunningServer {
        manager,
        port,
        handle,
    })
}

/// Serve the sender page and API until Ctrl+C.
pub async fn run_server(config: AppConfig) -> Result<()> {
    let server = start_server(&config).await?;

    println!("Sender page: http://localhost:{}/", server.port);
    println!("Press Ctrl+C to stop.");

    wait_for_ctrl_c().await;
    server.shutdown().await;
    Ok(())
}

/// Share one file straight from the command line and wait for it to end.
pub async fn run_share(config: AppConfig, file: PathBuf) -> Result<()> {
    let server = start_server(&config).await?;
    let path = absolute_path(&file);

    // subscribe first so a fast confirmation is not missed
    let mut states = server.manager.subscribe();

    let tunnel_spinner = spinner(&format!("Starting {} tunnel...", config.transport.label()));
    let share = match server.manager.start(&path.to_string_lossy()).await {
        Ok(share) => {
            spinner_success(&tunnel_spinner, "Tunnel established");
            share
        }
        Err(err) => {
            spinner_error(&tunnel_spinner, "Failed to start sharing");
            server.shutdown().await;
            return Err(err.into());
        }
    };

    println!();
    match terminal_qr(&share.public_url) {
        Ok(qr) => println!("{qr}"),
        Err(e) => tracing::warn!("Failed to render QR code: {:#}", e),
    }
    println!("{}", style(&share.public_url).cyan().underlined());
    if let Some(expires_at) = share.expires_at {
        println!(
            "Waiting for the receiver to confirm (link expires at {}).",
            expires_at.with_timezone(&chrono::Local).format("%H:%M:%S")
        );
    }
    println!("Press Ctrl+C to stop sharing.");

    tokio::select! {
        _ = wait_for_ctrl_c() => {
            tracing::info!("Ctrl+C received - stopping share");
        }
        _ = follow_share(&mut states) => {}
    }

    server.shutdown().await;
    Ok(())
}

/// Report transitions until the share returns to idle.
async fn follow_share(states: &mut watch::Receiver<SessionState>) {
    while states.changed().await.is_ok() {
        let state = *states.borrow_and_update();
        match state {
            SessionState::Sharing => {}
            SessionState::Confirmed => {
                println!(
                    "{} Receiver confirmed, download authorized",
                    style("✓").green().bold()
                );
            }
            SessionState::Idle => {
                println!("Sharing ended.");
                return;
            }
        }
    }
}

fn absolute_path(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

async fn wait_for_ctrl_c() {
    if tokio::signal::ctrl_c().await.is_err() {
        tracing::error!("Failed to listen for Ctrl+C");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::config::ConfigOverrides;

    #[test]
    fn tunnels_bind_loopback_only() {
        assert_eq!(bind_scope(Transport::Cloudflare), BindScope::Loopback);
        assert_eq!(bind_scope(Transport::Ngrok), BindScope::Loopback);
        assert_eq!(bind_scope(Transport::Local), BindScope::AllInterfaces);
    }

    #[tokio::test]
    async fn server_starts_idle_on_ephemeral_port() {
        let overrides = ConfigOverrides {
            transport: Some(Transport::Local),
            port: Some(0),
            timeout: Some(60),
        };
        let config = crate::common::config::apply_overrides(AppConfig::default(), &overrides)
            .expect("valid config");

        let server = start_server(&config).await.expect("server starts");
        assert_ne!(server.port, 0);
        assert_eq!(server.manager.settings().listen_port, server.port);
        assert_eq!(server.manager.state().await, SessionState::Idle);

        server.shutdown().await;
    }
}
