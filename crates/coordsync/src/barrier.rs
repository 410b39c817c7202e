// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! State barriers.
//!
//! A barrier completes no earlier than a state counter reaching its target,
//! with bounded latency thereafter. This implementation polls
//! [`crate::store::LogStore::peek_counter`] at a fixed interval rather than
//! requiring a change-notification capability from the backing store — the
//! one `peek_counter` accessor is all it needs.

use std::time::Duration;

use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::SyncError;
use crate::store::LogStore;

/// How often the barrier task re-checks the counter. There is no timeout
/// on the wait itself, only a bound on how late a barrier can notice its
/// target was already met; this interval is that bound.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Spawn a barrier task and return its single-use completion receiver.
///
/// `cancel` is the caller's own cancellation token: if it fires before the
/// target is met, the barrier yields [`SyncError::BarrierCancelled`].
/// `shutdown` is the
/// owning [`crate::session::Watcher`]'s token: if it fires first (the
/// session closed), the barrier yields [`SyncError::BarrierFailed`] instead,
/// since that's the target becoming unreachable rather than the caller
/// giving up.
pub(crate) fn spawn(
    store: std::sync::Arc<dyn LogStore>,
    key: String,
    target: u64,
    cancel: CancellationToken,
    shutdown: CancellationToken,
) -> oneshot::Receiver<Result<(), SyncError>> {
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        let outcome = run(&*store, &key, target, &cancel, &shutdown).await;
        let _ = tx.send(outcome);
    });

    rx
}

async fn run(
    store: &dyn LogStore,
    key: &str,
    target: u64,
    cancel: &CancellationToken,
    shutdown: &CancellationToken,
) -> Result<(), SyncError> {
    loop {
        match store.peek_counter(key).await {
            Ok(count) if count >= target => {
                debug!(key, target, count, "barrier satisfied");
                return Ok(());
            }
            Ok(_) => {}
            Err(e) => {
                return Err(SyncError::BarrierFailed { reason: e.to_string() });
            }
        }

        tokio::select! {
            biased;
            _ = shutdown.cancelled() => {
                return Err(SyncError::BarrierFailed { reason: "session closed".into() });
            }
            _ = cancel.cancelled() => {
                return Err(SyncError::BarrierCancelled);
            }
            _ = tokio::time::sleep(POLL_INTERVAL) => {}
        }
    }
}

#[cfg(test)]
#[path = "barrier_tests.rs"]
mod tests;
