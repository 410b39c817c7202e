// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process `LogStore` implementation.
//!
//! Backs the integration tests in `tests/specs` and is a perfectly usable
//! `LogStore` for single-process coordination (e.g. a plan that spawns its
//! instances as tasks rather than separate processes). Blocking reads are
//! implemented with a single `tokio::sync::Notify` shared by every log and
//! counter in the store — connections woken spuriously just recheck their
//! own condition and go back to sleep, which is cheap enough for a store
//! that never leaves one process.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::{Mutex, Notify, RwLock};

use crate::error::SyncError;
use crate::store::{AppendResult, ConnectionId, LogEntry, LogStore, StoreConnection};

struct Inner {
    logs: RwLock<HashMap<String, Vec<LogEntry>>>,
    counters: RwLock<HashMap<String, u64>>,
    next_conn_id: AtomicI64,
    killed: Mutex<HashSet<i64>>,
    activity: Notify,
}

/// An in-process, `Arc`-backed [`LogStore`]. Cheap to clone (clone the
/// handle, not the store): all clones share the same logs and counters.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                logs: RwLock::new(HashMap::new()),
                counters: RwLock::new(HashMap::new()),
                next_conn_id: AtomicI64::new(1),
                killed: Mutex::new(HashSet::new()),
                activity: Notify::new(),
            }),
        }
    }

    /// Append an entry with no `payload` field, as if placed by a tool other
    /// than this SDK's `Writer`. Exists for exercising the subscription
    /// runtime's missing-payload-field tolerance; not part of [`LogStore`]
    /// since a conforming backing store never produces such entries on its
    /// own.
    pub async fn append_without_payload(&self, key: &str) -> AppendResult {
        let (seq, length) = {
            let mut logs = self.inner.logs.write().await;
            let log = logs.entry(key.to_owned()).or_default();
            let seq = log.len() as u64 + 1;
            log.push(LogEntry { seq, payload: None });
            (seq, log.len() as u64)
        };
        self.inner.activity.notify_waiters();
        AppendResult { seq, length }
    }
}

#[async_trait]
impl LogStore for MemoryStore {
    async fn append(&self, key: &str, payload: Bytes) -> Result<AppendResult, SyncError> {
        let (seq, length) = {
            let mut logs = self.inner.logs.write().await;
            let log = logs.entry(key.to_owned()).or_default();
            let seq = log.len() as u64 + 1;
            log.push(LogEntry { seq, payload: Some(payload) });
            (seq, log.len() as u64)
        };
        self.inner.activity.notify_waiters();
        Ok(AppendResult { seq, length })
    }

    async fn len(&self, key: &str) -> Result<u64, SyncError> {
        Ok(self.inner.logs.read().await.get(key).map(|log| log.len() as u64).unwrap_or(0))
    }

    async fn incr(&self, key: &str) -> Result<u64, SyncError> {
        let mut counters = self.inner.counters.write().await;
        let value = counters.entry(key.to_owned()).or_insert(0);
        *value += 1;
        Ok(*value)
    }

    async fn peek_counter(&self, key: &str) -> Result<u64, SyncError> {
        Ok(self.inner.counters.read().await.get(key).copied().unwrap_or(0))
    }

    async fn connect(&self) -> Result<Box<dyn StoreConnection>, SyncError> {
        let id = self.inner.next_conn_id.fetch_add(1, Ordering::Relaxed);
        Ok(Box::new(MemoryConnection { id: ConnectionId(id), inner: Arc::clone(&self.inner) }))
    }

    async fn kill_connection(&self, id: ConnectionId) -> Result<(), SyncError> {
        self.inner.killed.lock().await.insert(id.0);
        self.inner.activity.notify_waiters();
        Ok(())
    }
}

struct MemoryConnection {
    id: ConnectionId,
    inner: Arc<Inner>,
}

#[async_trait]
impl StoreConnection for MemoryConnection {
    fn id(&self) -> ConnectionId {
        self.id
    }

    async fn read_from(&mut self, key: &str, from_seq: u64) -> Result<Vec<LogEntry>, SyncError> {
        loop {
            // Must be created before the condition check below: `Notify`
            // remembers notifications that land between this call and the
            // eventual `.await`, which is what makes the check-then-wait
            // sequence below race-free.
            let notified = self.inner.activity.notified();

            if self.inner.killed.lock().await.remove(&self.id.0) {
                return Err(SyncError::SubscriptionTerminated {
                    reason: "connection killed".into(),
                });
            }

            if let Some(entries) = self.inner.logs.read().await.get(key) {
                let batch: Vec<LogEntry> =
                    entries.iter().filter(|e| e.seq >= from_seq).cloned().collect();
                if !batch.is_empty() {
                    return Ok(batch);
                }
            }

            notified.await;
        }
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
