//! Share lifecycle: start, confirm, stream authorization, stop, expiry.
//!
//! Every transition runs under one async mutex around the session record,
//! including validation of a firing timeout ticket. Tunnel close is awaited
//! while holding it; tunnel open runs under a start reservation instead so
//! status and confirm stay responsive. Byte transfer never holds the lock:
//! `authorize_stream` hands back an owned reader.

use chrono::Utc;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tracing::{debug, error, info, warn};

use super::gateway::{FileGateway, LocalFileGateway};
use super::link::{LinkEncoder, QrLinkEncoder};
use super::session::{
    display_name_for, receive_url, ActiveShare, ConfirmOutcome, Download, Gate, Session,
    SessionSnapshot, SessionState, StartedShare, StopReason,
};
use super::timeout::{TimeoutScheduler, TimeoutTicket};
use crate::common::ShareError;
use crate::transport::TunnelProvider;

#[derive(Debug, Clone, Copy)]
pub struct ManagerSettings {
    /// Port the tunnel forwards to
    pub listen_port: u16,
    /// How long a receiver has to confirm
    pub confirm_window: Duration,
}

/// Cheap-to-clone handle to the process-wide share.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

struct Inner {
    session: Mutex<Session>,
    state_tx: watch::Sender<SessionState>,
    scheduler: TimeoutScheduler,
    tunnels: Arc<dyn TunnelProvider>,
    links: Arc<dyn LinkEncoder>,
    files: Arc<dyn FileGateway>,
    settings: ManagerSettings,
    /// Set while a start is opening its tunnel
    starting: AtomicBool,
}

/// Claim on the `starting` flag. Released on drop, including when the start
/// future is abandoned mid-open.
struct StartReservation<'a> {
    flag: &'a AtomicBool,
}

impl<'a> StartReservation<'a> {
    fn claim(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for StartReservation<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

impl SessionManager {
    /// Manager backed by QR links and the local filesystem.
    pub fn new(settings: ManagerSettings, tunnels: Arc<dyn TunnelProvider>) -> Self {
        Self::with_collaborators(
            settings,
            tunnels,
            Arc::new(QrLinkEncoder::default()),
            Arc::new(LocalFileGateway),
        )
    }

    pub fn with_collaborators(
        settings: ManagerSettings,
        tunnels: Arc<dyn TunnelProvider>,
        links: Arc<dyn LinkEncoder>,
        files: Arc<dyn FileGateway>,
    ) -> Self {
        let (state_tx, _) = watch::channel(SessionState::Idle);
        Self {
            inner: Arc::new(Inner {
                session: Mutex::new(Session::default()),
                state_tx,
                scheduler: TimeoutScheduler::new(),
                tunnels,
                links,
                files,
                settings,
                starting: AtomicBool::new(false),
            }),
        }
    }

    pub fn settings(&self) -> ManagerSettings {
        self.inner.settings
    }

    /// Receives every state transition.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.inner.state_tx.subscribe()
    }

    pub async fn state(&self) -> SessionState {
        self.inner.session.lock().await.state()
    }

    pub async fn status(&self) -> SessionSnapshot {
        self.inner.session.lock().await.snapshot()
    }

    /// Reserve the session for `path`, open a tunnel and arm the confirm timeout.
    ///
    /// The tunnel opens outside the session lock; a reservation flag keeps
    /// concurrent starts out meanwhile, while status and confirm still answer.
    #[tracing::instrument(skip(self))]
    pub async fn start(&self, path: &str) -> Result<StartedShare, ShareError> {
        if path.trim().is_empty() {
            return Err(ShareError::Validation("File path is required".to_string()));
        }
        let shared_path = PathBuf::from(path);
        let display_name = display_name_for(&shared_path)
            .ok_or_else(|| ShareError::Validation(format!("Path has no file name: {path}")))?;

        let reservation = {
            let session = self.inner.session.lock().await;

            if let Some(existing) = &session.active {
                warn!(
                    "Start rejected, already sharing '{}' ({})",
                    existing.display_name,
                    existing.state()
                );
                return Err(ShareError::Conflict);
            }

            let Some(reservation) = StartReservation::claim(&self.inner.starting) else {
                warn!("Start rejected, another share is still opening its tunnel");
                return Err(ShareError::Conflict);
            };

            if !self.inner.files.exists(&shared_path).await {
                return Err(ShareError::NotFound(path.to_string()));
            }

            reservation
        };

        let mut tunnel = self
            .inner
            .tunnels
            .open(self.inner.settings.listen_port)
            .await
            .map_err(|e| {
                error!("Failed to open {} tunnel: {:#}", self.inner.tunnels.name(), e);
                ShareError::Provider(e)
            })?;

        let public_url = receive_url(tunnel.url(), &display_name);

        let link_image = match self.inner.links.encode(&public_url) {
            Ok(image) => image,
            Err(e) => {
                if let Err(close_err) = tunnel.close().await {
                    warn!("Failed to close tunnel after link error: {:#}", close_err);
                }
                return Err(ShareError::Link(e));
            }
        };

        let mut session = self.inner.session.lock().await;
        drop(reservation);

        let created_at = Utc::now();
        let expires_at = chrono::Duration::from_std(self.inner.settings.confirm_window)
            .ok()
            .and_then(|window| created_at.checked_add_signed(window));
        let ticket = self.arm_timeout();

        session.active = Some(ActiveShare {
            shared_path,
            display_name: display_name.clone(),
            public_url: public_url.clone(),
            link_image: link_image.clone(),
            created_at,
            gate: Gate::Pending { ticket, expires_at },
            tunnel,
        });
        self.publish(SessionState::Sharing);

        info!(file = %display_name, url = %public_url, %ticket, "Sharing started");

        Ok(StartedShare {
            public_url,
            link_image,
            expires_at,
        })
    }

    /// Authorize streaming. Repeat confirmations succeed without changes.
    pub async fn confirm(&self) -> Result<ConfirmOutcome, ShareError> {
        let mut session = self.inner.session.lock().await;
        let share = session.active.as_mut().ok_or(ShareError::NoActiveSession)?;

        match share.gate {
            Gate::Confirmed { .. } => Ok(ConfirmOutcome::AlreadyConfirmed),
            Gate::Pending { ticket, .. } => {
                self.inner.scheduler.cancel(ticket);
                share.gate = Gate::Confirmed { at: Utc::now() };
                self.publish(SessionState::Confirmed);
                info!(file = %share.display_name, "Receiver confirmed");
                Ok(ConfirmOutcome::Confirmed)
            }
        }
    }

    /// Check the gate and open the shared file.
    ///
    /// `requested_name` only names the attachment; it is not matched against
    /// the shared file. Blank names fall back to the shared file's name.
    pub async fn authorize_stream(
        &self,
        requested_name: Option<&str>,
    ) -> Result<Download, ShareError> {
        let (path, display_name) = {
            let session = self.inner.session.lock().await;
            match &session.active {
                Some(share) if share.state() == SessionState::Confirmed => {
                    (share.shared_path.clone(), share.display_name.clone())
                }
                _ => return Err(ShareError::NotConfirmed),
            }
        };

        let file_name = match requested_name.map(str::trim).filter(|n| !n.is_empty()) {
            Some(name) => {
                if name != display_name {
                    debug!(
                        requested = name,
                        shared = %display_name,
                        "Requested name differs from shared file"
                    );
                }
                name.to_string()
            }
            None => display_name,
        };

        if !self.inner.files.exists(&path).await {
            warn!("Shared file vanished: {}", path.display());
            return Err(ShareError::FileMissing);
        }

        let stream = self.inner.files.open(&path).await?;
        info!(file = %file_name, bytes = ?stream.len, "Streaming file");

        Ok(Download {
            reader: stream.reader,
            file_name,
            len: stream.len,
        })
    }

    /// Tear down the active share.
    pub async fn stop(&self) -> Result<StopReason, ShareError> {
        let mut session = self.inner.session.lock().await;
        let share = session.active.take().ok_or(ShareError::NoActiveSession)?;
        self.teardown(share, StopReason::Stopped).await;
        Ok(StopReason::Stopped)
    }

    /// Expire the share if it is still waiting on exactly this ticket.
    /// Returns whether anything was torn down.
    pub async fn on_timeout_fired(&self, ticket: TimeoutTicket) -> bool {
        let mut session = self.inner.session.lock().await;

        let current = matches!(
            session.active.as_ref().map(|share| share.gate),
            Some(Gate::Pending { ticket: t, .. }) if t == ticket
        );
        if !current {
            debug!(%ticket, "Ignoring stale confirmation timeout");
            return false;
        }

        match session.active.take() {
            Some(share) => {
                warn!(
                    "Sharing '{}' timed out due to lack of confirmation",
                    share.display_name
                );
                self.teardown(share, StopReason::Expired).await;
                true
            }
            None => false,
        }
    }

    /// Stop whatever is active; used on process exit.
    pub async fn shutdown(&self) {
        if self.stop().await.is_ok() {
            info!("Active share stopped during shutdown");
        }
    }

    fn arm_timeout(&self) -> TimeoutTicket {
        // weak so a pending timer never keeps a dropped manager alive
        let inner = Arc::downgrade(&self.inner);
        self.inner
            .scheduler
            .arm(self.inner.settings.confirm_window, move |ticket| async move {
                if let Some(inner) = inner.upgrade() {
                    SessionManager { inner }.on_timeout_fired(ticket).await;
                }
            })
    }

    /// Caller must hold the session lock and have taken `share` out of it.
    async fn teardown(&self, mut share: ActiveShare, reason: StopReason) {
        if let Gate::Pending { ticket, .. } = share.gate {
            self.inner.scheduler.cancel(ticket);
        }

        // local state resets regardless of the provider
        if let Err(e) = share.tunnel.close().await {
            warn!(
                "Failed to close {} tunnel for '{}': {:#}",
                self.inner.tunnels.name(),
                share.display_name,
                e
            );
        }

        self.publish(SessionState::Idle);
        info!(file = %share.display_name, %reason, "Sharing ended");
    }

    fn publish(&self, state: SessionState) {
        self.inner.state_tx.send_replace(state);
    }
}
