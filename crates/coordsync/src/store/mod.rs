// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Backing log store abstraction.
//!
//! Any ordered-log-with-admin store can satisfy [`LogStore`]: an in-process
//! [`memory::MemoryStore`] for tests and single-process coordination, or a
//! Redis-backed implementation (the `coordsync-redis` crate) for real
//! multi-process runs.

pub mod memory;

use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::SyncError;

/// Identifier of a connection obtained from [`LogStore::connect`]. `NONE`
/// is the sentinel published when a connection could not be established.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub i64);

impl ConnectionId {
    pub const NONE: ConnectionId = ConnectionId(-1);

    pub fn is_none(&self) -> bool {
        self.0 < 0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Result of an append: the assigned sequence number and the log's
/// post-append length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppendResult {
    pub seq: u64,
    pub length: u64,
}

/// A single entry read back from a log. `seq` is 1-based and monotonically
/// increasing within a log key.
///
/// `payload` is `None` when the underlying record lacks the `payload` field
/// the wire format requires — e.g. an entry placed by a tool other than
/// this SDK's `Writer`. The subscription runtime skips such entries with a
/// warning rather than treating them as fatal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub seq: u64,
    pub payload: Option<Bytes>,
}

/// A dedicated, per-subscription connection to the backing store.
///
/// Subscriptions never share a connection: each one acquires its own via
/// [`LogStore::connect`] specifically so that [`LogStore::kill_connection`]
/// can abort exactly one in-flight read.
#[async_trait]
pub trait StoreConnection: Send + Sync {
    /// The id administratively killable via [`LogStore::kill_connection`].
    fn id(&self) -> ConnectionId;

    /// Blocking range read of entries with `seq >= from_seq`. Blocks
    /// indefinitely until new entries are available, this connection is
    /// killed (surfacing as [`SyncError::SubscriptionTerminated`]), or the
    /// calling future is dropped.
    async fn read_from(&mut self, key: &str, from_seq: u64) -> Result<Vec<LogEntry>, SyncError>;
}

/// The backing log store abstraction every coordination SDK operation is
/// ultimately expressed in terms of.
#[async_trait]
pub trait LogStore: Send + Sync {
    /// Atomically append to a named log, returning the assigned sequence
    /// number and the log's new length.
    async fn append(&self, key: &str, payload: Bytes) -> Result<AppendResult, SyncError>;

    /// Current length of a named log. Used by the subscription runtime's
    /// start-up snapshot, which is retained only for its log line — every
    /// subscription replays from seq 1 regardless, since a snapshot length
    /// makes a poor read cursor when entries can land between the snapshot
    /// and the first blocking read.
    async fn len(&self, key: &str) -> Result<u64, SyncError>;

    /// Atomic increment-and-fetch on a named integer counter, backing
    /// [`crate::session::Writer::signal_entry`].
    async fn incr(&self, key: &str) -> Result<u64, SyncError>;

    /// Read-only snapshot of a named counter, without incrementing it.
    /// Needed by [`crate::barrier`]'s polling loop so that checking the
    /// counter never perturbs the value being observed.
    async fn peek_counter(&self, key: &str) -> Result<u64, SyncError>;

    /// Obtain a dedicated connection with an inspectable id.
    async fn connect(&self) -> Result<Box<dyn StoreConnection>, SyncError>;

    /// Administratively kill a connection by id, aborting any outstanding
    /// blocking read on it.
    async fn kill_connection(&self, id: ConnectionId) -> Result<(), SyncError>;
}
