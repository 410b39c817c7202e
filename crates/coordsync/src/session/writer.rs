// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::debug;

use crate::error::SyncError;
use crate::keys::{state_counter_key, subtree_log_key};
use crate::runenv::RunEnv;
use crate::store::{AppendResult, LogStore};
use crate::subtree::{encode_payload, Subtree};

/// Write-side half of a session: appends to subtree logs and signals state
/// counters.
///
/// Cheap to clone: every clone shares the same backing store and closed
/// flag. Unlike a [`crate::subscription::SubscriptionHandle`], a `Writer`
/// holds no dedicated connection — `write`/`signal_entry` are single
/// round-trip calls the shared store handles directly.
#[derive(Clone)]
pub struct Writer {
    run_env: Arc<RunEnv>,
    store: Arc<dyn LogStore>,
    closed: Arc<AtomicBool>,
}

impl Writer {
    pub(crate) fn new(run_env: Arc<RunEnv>, store: Arc<dyn LogStore>) -> Self {
        Self { run_env, store, closed: Arc::new(AtomicBool::new(false)) }
    }

    /// Append a payload to a subtree's log, returning its assigned sequence
    /// number and the log's new length.
    pub async fn write<T>(&self, subtree: &Subtree<T>, payload: &T) -> Result<AppendResult, SyncError>
    where
        T: serde::Serialize,
    {
        self.ensure_open()?;
        let key = subtree_log_key(&self.run_env.run_id, subtree.group_key());
        let bytes = encode_payload(payload)?;
        let result = self.store.append(&key, bytes).await?;
        debug!(subtree = %subtree.group_key(), key, seq = result.seq, "wrote entry");
        Ok(result)
    }

    /// Atomically increment a named state counter, returning its new value.
    /// Every instance that reaches a state calls this once; a
    /// [`crate::session::Watcher::barrier`] on the same state completes
    /// once enough instances have.
    pub async fn signal_entry(&self, state: &str) -> Result<u64, SyncError> {
        self.ensure_open()?;
        let key = state_counter_key(&self.run_env.run_id, state);
        let count = self.store.incr(&key).await?;
        debug!(state, key, count, "signalled entry");
        Ok(count)
    }

    /// Mark this writer closed. Further calls fail with
    /// [`SyncError::SessionClosed`]; calls already in flight are unaffected.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    fn ensure_open(&self) -> Result<(), SyncError> {
        if self.closed.load(Ordering::SeqCst) {
            Err(SyncError::SessionClosed)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
#[path = "writer_tests.rs"]
mod tests;
