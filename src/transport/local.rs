//! Local listener bootstrap and the no-tunnel LAN provider.
//!
//! - Tunnel transports bind loopback only; the tunnel agent connects locally.
//! - The LAN transport binds all interfaces so peers on the network can reach it.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::net::{SocketAddr, TcpListener, UdpSocket};

use super::{Tunnel, TunnelProvider};

/// Address exposure policy for the listening socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindScope {
    Loopback,
    AllInterfaces,
}

fn bind_addr(scope: BindScope, port: u16) -> SocketAddr {
    match scope {
        BindScope::Loopback => SocketAddr::from(([127, 0, 0, 1], port)),
        BindScope::AllInterfaces => SocketAddr::from(([0, 0, 0, 0], port)),
    }
}

/// Bind the listening socket and return it with the actual port (`port` may be 0).
pub fn bind_listener(scope: BindScope, port: u16) -> Result<(TcpListener, u16)> {
    let listener = TcpListener::bind(bind_addr(scope, port)).context(
        "Failed to bind to port - port already in use.\n\n\
         Is another sharegate instance running?\n\
         Or is another service using this port?",
    )?;

    listener
        .set_nonblocking(true)
        .context("Failed to set listener to non-blocking mode")?;

    let port = listener.local_addr()?.port();
    Ok((listener, port))
}

/// Serve `app` on an already bound listener in the background.
pub fn spawn_server(listener: TcpListener, app: axum::Router) -> axum_server::Handle {
    let handle = axum_server::Handle::new();
    let server_handle = handle.clone();

    tokio::spawn(async move {
        if let Err(e) = axum_server::from_tcp(listener)
            .handle(server_handle)
            .serve(app.into_make_service())
            .await
        {
            tracing::error!("Server error: {}", e);
        }
    });

    handle
}

/// Best-effort local non-loopback IP discovery.
pub fn get_local_ip() -> Result<String> {
    let socket = UdpSocket::bind("0.0.0.0:0").context("Failed to bind socket for IP detection")?;

    // no packets are sent; connect only selects the outbound interface
    socket
        .connect("8.8.8.8:80")
        .context("Failed to connect socket for IP detection")?;

    let local_addr = socket.local_addr().context("Failed to get local address")?;

    Ok(local_addr.ip().to_string())
}

/// Exposes the LAN address directly. Nothing to tear down.
#[derive(Debug, Clone, Copy, Default)]
pub struct LanProvider;

pub struct LanEndpoint {
    url: String,
}

#[async_trait]
impl TunnelProvider for LanProvider {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn open(&self, local_port: u16) -> Result<Box<dyn Tunnel>> {
        let ip = get_local_ip().unwrap_or_else(|_| "127.0.0.1".to_string());
        Ok(Box::new(LanEndpoint {
            url: format!("http://{ip}:{local_port}"),
        }))
    }
}

#[async_trait]
impl Tunnel for LanEndpoint {
    fn url(&self) -> &str {
        &self.url
    }

    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}
