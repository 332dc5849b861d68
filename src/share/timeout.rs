//! One-shot cancelable timers identified by tickets.

use dashmap::DashMap;
use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Opaque handle for one armed timer. Never reused within a scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct TimeoutTicket(u64);

impl fmt::Display for TimeoutTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Runs an action once after a delay unless its ticket is canceled first.
///
/// A ticket leaves the pending set before its action runs, so for any ticket
/// exactly one of `cancel` returning `true` or the action running happens.
#[derive(Clone, Default)]
pub struct TimeoutScheduler {
    next_ticket: Arc<AtomicU64>,
    pending: Arc<DashMap<TimeoutTicket, CancellationToken>>,
}

impl TimeoutScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm a timer. Must be called from within a tokio runtime.
    pub fn arm<F, Fut>(&self, delay: Duration, action: F) -> TimeoutTicket
    where
        F: FnOnce(TimeoutTicket) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let ticket = TimeoutTicket(self.next_ticket.fetch_add(1, Ordering::SeqCst) + 1);
        let token = CancellationToken::new();
        self.pending.insert(ticket, token.clone());

        let pending = self.pending.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {
                    tracing::debug!(%ticket, "Timer canceled");
                }
                _ = tokio::time::sleep(delay) => {
                    // lost the race against cancel
                    if pending.remove(&ticket).is_none() {
                        return;
                    }
                    tracing::debug!(%ticket, "Timer fired");
                    action(ticket).await;
                }
            }
        });

        ticket
    }

    /// Cancel a pending timer. Returns `false` if it already fired, was
    /// already canceled, or never existed.
    pub fn cancel(&self, ticket: TimeoutTicket) -> bool {
        match self.pending.remove(&ticket) {
            Some((_, token)) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn is_pending(&self, ticket: TimeoutTicket) -> bool {
        self.pending.contains_key(&ticket)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}
