// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Subscription runtime.
//!
//! Each subscription is its own task with its own dedicated connection,
//! consuming a blocking range read in a loop and forwarding decoded
//! payloads over an internally-owned channel. Cancelling a subscription
//! both drops the in-flight read (Rust's cooperative cancellation) and
//! explicitly kills the connection server-side — the latter because a
//! conforming [`LogStore`] is free to implement `read_from` with a
//! blocking call that `select!` alone cannot interrupt.
//!
//! The same task both reads and (on cancellation) kills its own
//! connection — `tokio::select!` collapses what would otherwise be a
//! two-sided handshake between a reader and a separate canceller into
//! one. The connection id never needs to leave the task.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, Notify};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::store::LogStore;
use crate::subtree::decode_payload;

/// Default bound on a subscription's delivery channel: a slow consumer
/// applies backpressure to the subscription task rather than the task
/// buffering unboundedly.
pub const DEFAULT_BUFFER: usize = 128;

/// Completion signal shared between a subscription task, its
/// [`SubscriptionHandle`], and the owning `Watcher`'s registry. Several
/// independent waiters observe the same signal; none of them consumes it
/// for the others, unlike a `oneshot` receiver.
pub(crate) struct Done {
    finished: AtomicBool,
    notify: Notify,
}

impl Done {
    fn new() -> Self {
        Self { finished: AtomicBool::new(false), notify: Notify::new() }
    }

    fn signal(&self) {
        self.finished.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub(crate) async fn wait(&self) {
        loop {
            // Must be created before the finished check: see the identical
            // pattern (and rationale) in `store::memory`.
            let notified = self.notify.notified();
            if self.finished.load(Ordering::SeqCst) {
                return;
            }
            notified.await;
        }
    }
}

/// RAII guard that signals [`Done`] on every exit path of the subscription
/// task.
struct DoneGuard(Arc<Done>);

impl Drop for DoneGuard {
    fn drop(&mut self) {
        self.0.signal();
    }
}

/// Caller-held handle to a running subscription.
///
/// Dropping the handle does not stop the subscription; call
/// [`SubscriptionHandle::cancel`] for synchronous cancellation, or close the
/// owning `Watcher` to stop every outstanding subscription at once.
pub struct SubscriptionHandle {
    token: CancellationToken,
    done: Arc<Done>,
}

impl SubscriptionHandle {
    /// Request cancellation and wait for the subscription task to actually
    /// exit. Synchronous: once this returns, the backing connection has been
    /// released and no further items will be delivered on the paired
    /// receiver.
    pub async fn cancel(&self) {
        self.token.cancel();
        self.done.wait().await;
    }
}

/// Spawn a subscription task, returning the caller's handle, the completion
/// signal the owning `Watcher` also tracks, and the delivery channel's
/// receiving half.
///
/// `shutdown` is the owning `Watcher`'s token: the subscription's own token
/// is a child of it, so closing the watcher cancels every outstanding
/// subscription without the watcher needing to cancel each individually.
pub(crate) fn spawn<T>(
    store: Arc<dyn LogStore>,
    log_key: String,
    group_key: String,
    buffer: usize,
    shutdown: &CancellationToken,
) -> (SubscriptionHandle, Arc<Done>, mpsc::Receiver<T>)
where
    T: serde::de::DeserializeOwned + Send + 'static,
{
    let token = shutdown.child_token();
    let done = Arc::new(Done::new());
    let (tx, rx) = mpsc::channel(buffer);

    tokio::spawn(run(log_key, group_key, store, tx, token.clone(), Arc::clone(&done)));

    (SubscriptionHandle { token, done: Arc::clone(&done) }, done, rx)
}

async fn run<T>(
    log_key: String,
    group_key: String,
    store: Arc<dyn LogStore>,
    delivery: mpsc::Sender<T>,
    token: CancellationToken,
    done: Arc<Done>,
) where
    T: serde::de::DeserializeOwned + Send + 'static,
{
    let _guard = DoneGuard(done);

    // Taken purely for the log line below; every subscription replays the
    // full log from seq 1 regardless — a snapshot length makes a poor read
    // cursor since entries can land between the snapshot and the first
    // blocking read.
    let start_seq = store.len(&log_key).await.unwrap_or(0);

    let mut conn = match store.connect().await {
        Ok(conn) => conn,
        Err(e) => {
            warn!(subtree = %group_key, key = %log_key, error = %e, "subscription failed to acquire a connection");
            return;
        }
    };

    debug!(subtree = %group_key, key = %log_key, start_seq, "subscription started");

    let mut next_seq: u64 = 1;

    loop {
        let read = tokio::select! {
            biased;
            _ = token.cancelled() => {
                let _ = store.kill_connection(conn.id()).await;
                return;
            }
            r = conn.read_from(&log_key, next_seq) => r,
        };

        let entries = match read {
            Ok(entries) => entries,
            Err(_) if token.is_cancelled() => return,
            Err(e) => {
                warn!(subtree = %group_key, key = %log_key, error = %e, "subscription terminated");
                return;
            }
        };

        for entry in entries {
            next_seq = entry.seq + 1;

            let Some(payload) = entry.payload else {
                warn!(subtree = %group_key, key = %log_key, seq = entry.seq, "entry missing payload field, skipping");
                continue;
            };

            let value = match decode_payload::<T>(&payload) {
                Ok(value) => value,
                Err(e) => {
                    warn!(subtree = %group_key, key = %log_key, seq = entry.seq, error = %e, "entry failed to decode, skipping");
                    continue;
                }
            };

            if delivery.send(value).await.is_err() {
                // No one is listening any more; nothing left to do.
                return;
            }
        }
    }
}

#[cfg(test)]
#[path = "subscription_tests.rs"]
mod tests;
