//! Background delivery of notifications.
//!
//! [`Dispatcher::dispatch`] pushes onto an unbounded channel and returns at once. A
//! worker task drains the channel, calling the sink with exponential backoff between
//! attempts. A notification that exhausts its attempts, or whose recipient the sink
//! rejects outright, is logged and dropped; the operation that produced it has already
//! committed.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::notify::{Notification, NotificationSink, NotifyError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(5),
        }
    }
}

/// Delivery totals reported by a finished worker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub delivered: usize,
    pub failed: usize,
}

/// Cheap, cloneable handle for enqueueing notifications.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    tx: Option<mpsc::UnboundedSender<Notification>>,
}

impl Dispatcher {
    /// Start a worker on the current tokio runtime.
    ///
    /// The worker runs until every `Dispatcher` clone has been dropped and the queue is
    /// empty. Await [`DispatchWorker::finish`] to wait for that.
    pub fn spawn(sink: Arc<dyn NotificationSink>, policy: RetryPolicy) -> (Self, DispatchWorker) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run(rx, sink, policy));
        (Self { tx: Some(tx) }, DispatchWorker { handle })
    }

    /// A dispatcher that drops everything. Useful where no runtime is available.
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    /// Enqueue a notification. Never blocks and never fails the caller.
    pub fn dispatch(&self, notification: Notification) {
        match &self.tx {
            Some(tx) => {
                if let Err(err) = tx.send(notification) {
                    warn!(
                        to = %err.0.recipient.email,
                        booking = %err.0.booking,
                        "notification worker has stopped; dropping notification"
                    );
                }
            }
            None => debug!(
                to = %notification.recipient.email,
                kind = ?notification.kind,
                "notifications disabled; dropping notification"
            ),
        }
    }
}

pub struct DispatchWorker {
    handle: JoinHandle<DispatchStats>,
}

impl DispatchWorker {
    /// Wait for the queue to drain. Returns once all dispatchers are dropped.
    pub async fn finish(self) -> DispatchStats {
        match self.handle.await {
            Ok(stats) => stats,
            Err(err) => {
                error!(error = %err, "notification worker panicked");
                DispatchStats::default()
            }
        }
    }
}

async fn run(
    mut rx: mpsc::UnboundedReceiver<Notification>,
    sink: Arc<dyn NotificationSink>,
    policy: RetryPolicy,
) -> DispatchStats {
    let mut stats = DispatchStats::default();
    while let Some(notification) = rx.recv().await {
        if deliver(sink.as_ref(), &notification, &policy).await {
            stats.delivered += 1;
        } else {
            stats.failed += 1;
        }
    }
    debug!(
        delivered = stats.delivered,
        failed = stats.failed,
        "notification queue drained"
    );
    stats
}

async fn deliver(sink: &dyn NotificationSink, notification: &Notification, policy: &RetryPolicy) -> bool {
    let attempts = policy.max_attempts.max(1);
    let mut backoff = policy.initial_backoff;

    for attempt in 1..=attempts {
        match sink.notify(notification).await {
            Ok(()) => return true,
            Err(err @ NotifyError::Rejected(_)) => {
                warn!(
                    to = %notification.recipient.email,
                    booking = %notification.booking,
                    error = %err,
                    "recipient rejected notification; not retrying"
                );
                return false;
            }
            Err(err) if attempt < attempts => {
                warn!(
                    to = %notification.recipient.email,
                    attempt,
                    error = %err,
                    "notification delivery failed; retrying in {:?}",
                    backoff
                );
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(policy.max_backoff);
            }
            Err(err) => {
                warn!(
                    to = %notification.recipient.email,
                    booking = %notification.booking,
                    attempts,
                    error = %err,
                    "giving up on notification"
                );
            }
        }
    }
    false
}
