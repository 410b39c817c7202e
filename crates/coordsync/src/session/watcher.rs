// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::barrier;
use crate::error::SyncError;
use crate::keys::{state_counter_key, subtree_log_key};
use crate::runenv::RunEnv;
use crate::store::LogStore;
use crate::subscription::{self, Done, SubscriptionHandle, DEFAULT_BUFFER};
use crate::subtree::Subtree;

/// Read-side half of a session: subscribes to subtree logs and waits on
/// state barriers.
///
/// Tracks every subscription it has spawned via their shared completion
/// signal, so [`Watcher::close`] can cancel and join all of them without
/// the caller needing to hold onto each handle. The watcher's own
/// cancellation token doubles as its closed flag: a child token created
/// after the parent fires is born already cancelled, so subscriptions
/// spawned after close exit immediately rather than leaking.
pub struct Watcher {
    run_env: Arc<RunEnv>,
    store: Arc<dyn LogStore>,
    shutdown: CancellationToken,
    subscriptions: Mutex<Vec<Arc<Done>>>,
}

impl Watcher {
    pub(crate) fn new(run_env: Arc<RunEnv>, store: Arc<dyn LogStore>) -> Self {
        Self { run_env, store, shutdown: CancellationToken::new(), subscriptions: Mutex::new(Vec::new()) }
    }

    /// Subscribe to a subtree: replays its full history, then delivers new
    /// entries as they're written, until cancelled or the watcher closes.
    ///
    /// Returns a handle for cancelling this one subscription and the
    /// receiving half of its delivery channel. The channel closes once the
    /// subscription stops for any reason.
    pub async fn subscribe<T>(
        &self,
        subtree: &Subtree<T>,
    ) -> Result<(SubscriptionHandle, mpsc::Receiver<T>), SyncError>
    where
        T: serde::de::DeserializeOwned + Send + 'static,
    {
        self.ensure_open()?;
        let key = subtree_log_key(&self.run_env.run_id, subtree.group_key());
        let (handle, done, rx) = subscription::spawn(
            Arc::clone(&self.store),
            key,
            subtree.group_key().to_owned(),
            DEFAULT_BUFFER,
            &self.shutdown,
        );
        self.subscriptions.lock().await.push(done);
        Ok((handle, rx))
    }

    /// Wait until a named state's counter reaches `target`, or until
    /// `cancel` fires first.
    ///
    /// Resolves to [`SyncError::BarrierCancelled`] if `cancel` fires first,
    /// or [`SyncError::BarrierFailed`] if this watcher closes before the
    /// target is met.
    pub async fn barrier(&self, state: &str, target: u64, cancel: CancellationToken) -> Result<(), SyncError> {
        self.ensure_open()?;
        let key = state_counter_key(&self.run_env.run_id, state);
        let rx = barrier::spawn(Arc::clone(&self.store), key, target, cancel, self.shutdown.clone());
        match rx.await {
            Ok(outcome) => outcome,
            Err(_) => Err(SyncError::BarrierFailed { reason: "barrier task dropped".into() }),
        }
    }

    /// Cancel every outstanding subscription and wait for each to exit.
    /// Idempotent: closing an already-closed watcher just joins an empty
    /// set.
    pub async fn close(&self) {
        self.shutdown.cancel();
        let dones = std::mem::take(&mut *self.subscriptions.lock().await);
        debug!(count = dones.len(), "closing watcher, joining subscriptions");
        for done in dones {
            done.wait().await;
        }
    }

    fn ensure_open(&self) -> Result<(), SyncError> {
        if self.shutdown.is_cancelled() {
            Err(SyncError::SessionClosed)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
#[path = "watcher_tests.rs"]
mod tests;
