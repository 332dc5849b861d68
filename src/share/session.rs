//! The single share record and its public views.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::io::AsyncRead;

use super::timeout::TimeoutTicket;
use crate::transport::Tunnel;

/// Lifecycle state of the process-wide share.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    #[default]
    Idle,
    Sharing,
    Confirmed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Idle => write!(f, "idle"),
            SessionState::Sharing => write!(f, "sharing"),
            SessionState::Confirmed => write!(f, "confirmed"),
        }
    }
}

/// Why a share returned to idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Stopped,
    Expired,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::Stopped => write!(f, "stopped"),
            StopReason::Expired => write!(f, "expired"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmOutcome {
    Confirmed,
    AlreadyConfirmed,
}

/// Result of a successful start.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartedShare {
    pub public_url: String,
    pub link_image: String,
    pub expires_at: Option<DateTime<Utc>>,
}

/// An authorized download. The reader is owned by the caller, so the
/// transfer never holds the session lock.
pub struct Download {
    pub reader: Box<dyn AsyncRead + Send + Unpin>,
    pub file_name: String,
    pub len: Option<u64>,
}

/// Confirmation gate of an active share.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Gate {
    Pending {
        ticket: TimeoutTicket,
        expires_at: Option<DateTime<Utc>>,
    },
    Confirmed {
        at: DateTime<Utc>,
    },
}

pub(crate) struct ActiveShare {
    pub shared_path: PathBuf,
    pub display_name: String,
    pub public_url: String,
    pub link_image: String,
    pub created_at: DateTime<Utc>,
    pub gate: Gate,
    pub tunnel: Box<dyn Tunnel>,
}

impl ActiveShare {
    pub fn state(&self) -> SessionState {
        match self.gate {
            Gate::Pending { .. } => SessionState::Sharing,
            Gate::Confirmed { .. } => SessionState::Confirmed,
        }
    }
}

/// `None` is idle; an active share always carries its path, URL and tunnel.
#[derive(Default)]
pub(crate) struct Session {
    pub active: Option<ActiveShare>,
}

impl Session {
    pub fn state(&self) -> SessionState {
        self.active
            .as_ref()
            .map_or(SessionState::Idle, ActiveShare::state)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let Some(share) = &self.active else {
            return SessionSnapshot::default();
        };

        let (confirmed_at, expires_at, timeout_ticket) = match share.gate {
            Gate::Pending { ticket, expires_at } => (None, expires_at, Some(ticket)),
            Gate::Confirmed { at } => (Some(at), None, None),
        };

        SessionSnapshot {
            state: share.state(),
            file_name: Some(share.display_name.clone()),
            shared_path: Some(share.shared_path.clone()),
            public_url: Some(share.public_url.clone()),
            link_image: Some(share.link_image.clone()),
            created_at: Some(share.created_at),
            confirmed_at,
            expires_at,
            timeout_ticket,
        }
    }
}

/// Point-in-time copy of the session for status reporting.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub file_name: Option<String>,
    /// Local path on the sender's machine; never serialized.
    #[serde(skip)]
    pub shared_path: Option<PathBuf>,
    pub public_url: Option<String>,
    pub link_image: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub timeout_ticket: Option<TimeoutTicket>,
}

pub(crate) fn display_name_for(path: &Path) -> Option<String> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
}

/// `<base>/receive?file=<name>` with the name percent-encoded.
pub(crate) fn receive_url(base: &str, display_name: &str) -> String {
    format!(
        "{}/receive?file={}",
        base.trim_end_matches('/'),
        urlencoding::encode(display_name)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_is_last_component() {
        assert_eq!(
            display_name_for(Path::new("/tmp/report.pdf")).as_deref(),
            Some("report.pdf")
        );
        assert!(display_name_for(Path::new("/")).is_none());
        assert!(display_name_for(Path::new("dir/..")).is_none());
    }

    #[test]
    fn receive_url_encodes_name_and_trims_slash() {
        assert_eq!(
            receive_url("https://abc.trycloudflare.com/", "my report&v2.pdf"),
            "https://abc.trycloudflare.com/receive?file=my%20report%26v2.pdf"
        );
        assert_eq!(
            receive_url("https://abc.trycloudflare.com", "report.pdf"),
            "https://abc.trycloudflare.com/receive?file=report.pdf"
        );
    }

    #[test]
    fn idle_snapshot_is_empty() {
        let snapshot = Session::default().snapshot();
        assert_eq!(snapshot.state, SessionState::Idle);
        assert!(snapshot.public_url.is_none());
        assert!(snapshot.shared_path.is_none());
        assert!(snapshot.timeout_ticket.is_none());
    }
}
