// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Redis Streams-backed [`LogStore`], using `XADD`/`XLEN`/`XREAD BLOCK`/
//! `CLIENT ID`/`CLIENT KILL` for the append log, counters, and killable
//! subscription connections respectively.
//!
//! Redis stream entry IDs are `<ms>-<seq>` pairs, not the plain integer
//! sequence numbers the rest of the SDK hands callers. This store
//! sidesteps the mismatch by assigning each entry's ID explicitly as
//! `<n>-0`, where `n` is reserved
//! from a companion `INCR` counter in the same Lua script as the `XADD` —
//! the reservation and the append must be atomic together, or two
//! concurrent writers could race between "pick a sequence" and "append
//! with it" and collide on the same stream ID.

use async_trait::async_trait;
use bytes::Bytes;
use redis::aio::MultiplexedConnection;
use redis::streams::{StreamReadOptions, StreamReadReply};
use redis::{AsyncCommands, Client, Script};

use coordsync::error::SyncError;
use coordsync::store::{AppendResult, ConnectionId, LogEntry, LogStore, StoreConnection};

use crate::config::RedisConfig;

const PAYLOAD_FIELD: &str = "payload";

/// Atomically reserves the next sequence number for a stream and appends to
/// it under that number, so `INCR` and `XADD` can never be observed apart.
const APPEND_SCRIPT: &str = r#"
local seq = redis.call('INCR', KEYS[2])
redis.call('XADD', KEYS[1], seq .. '-0', ARGV[1], ARGV[2])
return seq
"#;

fn seq_counter_key(log_key: &str) -> String {
    format!("{log_key}:seq")
}

fn store_unavailable(err: redis::RedisError) -> SyncError {
    SyncError::StoreUnavailable { reason: err.to_string() }
}

/// Parse the integer prefix of a stream entry ID minted by [`APPEND_SCRIPT`]
/// (always `<n>-0`) back into the sequence number the SDK hands callers.
fn parse_seq(id: &str) -> Result<u64, SyncError> {
    id.split('-')
        .next()
        .and_then(|n| n.parse::<u64>().ok())
        .ok_or_else(|| SyncError::SubscriptionTerminated { reason: format!("unparseable stream id {id:?}") })
}

/// [`LogStore`] backed by a Redis server.
///
/// Holds one multiplexed connection for append/incr/len/admin traffic.
/// Each [`RedisConnection`] handed out by [`RedisStore::connect`] is its
/// own dedicated connection, so [`LogStore::kill_connection`] can target
/// exactly one subscription's blocking `XREAD` without disturbing any
/// other session on the same store.
#[derive(Clone)]
pub struct RedisStore {
    client: Client,
    conn: MultiplexedConnection,
    append_script: Script,
}

impl RedisStore {
    /// Open a connection to the server described by `config`. Fails with
    /// [`SyncError::StoreUnavailable`] rather than panicking.
    pub async fn connect(config: &RedisConfig) -> Result<Self, SyncError> {
        let client = Client::open(config.url()).map_err(store_unavailable)?;
        let conn = client.get_multiplexed_tokio_connection().await.map_err(store_unavailable)?;
        Ok(Self { client, conn, append_script: Script::new(APPEND_SCRIPT) })
    }
}

#[async_trait]
impl LogStore for RedisStore {
    async fn append(&self, key: &str, payload: Bytes) -> Result<AppendResult, SyncError> {
        let mut conn = self.conn.clone();
        let seq: u64 = self
            .append_script
            .key(key)
            .key(seq_counter_key(key))
            .arg(PAYLOAD_FIELD)
            .arg(payload.as_ref())
            .invoke_async(&mut conn)
            .await
            .map_err(store_unavailable)?;
        let length: u64 = conn.xlen(key).await.map_err(store_unavailable)?;
        Ok(AppendResult { seq, length })
    }

    async fn len(&self, key: &str) -> Result<u64, SyncError> {
        let mut conn = self.conn.clone();
        conn.xlen(key).await.map_err(store_unavailable)
    }

    async fn incr(&self, key: &str) -> Result<u64, SyncError> {
        let mut conn = self.conn.clone();
        conn.incr(key, 1u64).await.map_err(store_unavailable)
    }

    async fn peek_counter(&self, key: &str) -> Result<u64, SyncError> {
        let mut conn = self.conn.clone();
        let value: Option<u64> = conn.get(key).await.map_err(store_unavailable)?;
        Ok(value.unwrap_or(0))
    }

    async fn connect(&self) -> Result<Box<dyn StoreConnection>, SyncError> {
        let mut conn = self.client.get_multiplexed_tokio_connection().await.map_err(store_unavailable)?;
        let id: i64 = redis::cmd("CLIENT").arg("ID").query_async(&mut conn).await.map_err(store_unavailable)?;
        Ok(Box::new(RedisConnection { id: ConnectionId(id), conn }))
    }

    async fn kill_connection(&self, id: ConnectionId) -> Result<(), SyncError> {
        let mut conn = self.conn.clone();
        let result: redis::RedisResult<()> =
            redis::cmd("CLIENT").arg("KILL").arg("ID").arg(id.0).query_async(&mut conn).await;
        // A connection that already closed on its own (the read it was
        // blocking on returned first) is not an error here — the caller
        // only wants it gone, and it already is.
        match result {
            Ok(()) => Ok(()),
            Err(e) if e.to_string().contains("No such client") => Ok(()),
            Err(e) => Err(store_unavailable(e)),
        }
    }
}

/// A dedicated Redis connection backing one [`crate::store::RedisStore`]
/// subscription. `CLIENT ID` is read once at construction and never
/// changes for the connection's lifetime.
struct RedisConnection {
    id: ConnectionId,
    conn: MultiplexedConnection,
}

#[async_trait]
impl StoreConnection for RedisConnection {
    fn id(&self) -> ConnectionId {
        self.id
    }

    async fn read_from(&mut self, key: &str, from_seq: u64) -> Result<Vec<LogEntry>, SyncError> {
        // XREAD returns entries with id > last_id, so the cursor we hand it
        // is one less than the sequence we actually want to start from.
        let last_id = if from_seq <= 1 { "0".to_owned() } else { format!("{}-0", from_seq - 1) };
        let opts = StreamReadOptions::default().block(0);

        let reply: StreamReadReply = self
            .conn
            .xread_options(&[key], &[last_id.as_str()], &opts)
            .await
            .map_err(|e| SyncError::SubscriptionTerminated { reason: e.to_string() })?;

        let mut entries = Vec::new();
        for stream in reply.keys {
            for stream_id in stream.ids {
                let seq = parse_seq(&stream_id.id)?;
                let payload = stream_id
                    .map
                    .get(PAYLOAD_FIELD)
                    .and_then(|value| redis::from_redis_value::<Vec<u8>>(value).ok())
                    .map(Bytes::from);
                entries.push(LogEntry { seq, payload });
            }
        }
        Ok(entries)
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
