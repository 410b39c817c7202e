// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Subtree registry & codec.
//!
//! A [`Subtree`] is an immutable descriptor: a group key, a dedup key
//! function, and (via its type parameter) the payload type. It carries no
//! runtime type tag — correctness rests on every instance of a run
//! constructing the same `Subtree<T>` for a given group key. The codec
//! (`encode_payload`/`decode_payload`) is JSON: it needs no schema registry
//! of its own because the `Subtree`'s type parameter already pins the shape
//! on both the write and read side.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::SyncError;

/// Pure function from a decoded payload to its dedup string. May be a
/// constant (e.g. `"cid"`) for singleton subtrees — see
/// [`Subtree::constant_key`].
type KeyFn<T> = Arc<dyn Fn(&T) -> String + Send + Sync>;

/// Immutable descriptor of a logical, typed, append-only topic.
///
/// Shared read-only by every instance in a run. Construct one `Subtree<T>`
/// per group key and reuse the same value (or an equal one) on every
/// instance; the group key, not the Rust type, is what the backing store
/// actually keys on.
pub struct Subtree<T> {
    group_key: String,
    key_fn: KeyFn<T>,
    _payload: PhantomData<fn() -> T>,
}

impl<T> Subtree<T> {
    /// Build a subtree with an arbitrary dedup key function over decoded
    /// payloads.
    pub fn new(group_key: impl Into<String>, key_fn: impl Fn(&T) -> String + Send + Sync + 'static) -> Self {
        Self { group_key: group_key.into(), key_fn: Arc::new(key_fn), _payload: PhantomData }
    }

    /// Build a singleton subtree whose dedup key is a fixed constant
    /// regardless of payload (e.g. a subtree that only ever holds one kind
    /// of record, such as a published CID).
    pub fn constant_key(group_key: impl Into<String>, constant: impl Into<String>) -> Self {
        let constant = constant.into();
        Self::new(group_key, move |_: &T| constant.clone())
    }

    /// The group key — unique across the run, and the sole input to the
    /// backing store's key layout.
    pub fn group_key(&self) -> &str {
        &self.group_key
    }

    /// Compute the dedup key for a decoded payload.
    pub fn dedup_key(&self, payload: &T) -> String {
        (self.key_fn)(payload)
    }
}

impl<T> Clone for Subtree<T> {
    fn clone(&self) -> Self {
        Self { group_key: self.group_key.clone(), key_fn: Arc::clone(&self.key_fn), _payload: PhantomData }
    }
}

impl<T> fmt::Debug for Subtree<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subtree").field("group_key", &self.group_key).finish()
    }
}

impl<T> fmt::Display for Subtree<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.group_key)
    }
}

/// Encode a payload to the opaque byte blob stored under the wire format's
/// `payload` field. Stable across restarts and across instances as long as
/// both sides agree on `T`.
pub fn encode_payload<T: Serialize>(value: &T) -> Result<Bytes, SyncError> {
    serde_json::to_vec(value).map(Bytes::from).map_err(SyncError::from)
}

/// Decode a payload from its opaque byte blob. Mismatched shapes fail with
/// [`SyncError::MalformedPayload`] rather than panicking.
pub fn decode_payload<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, SyncError> {
    serde_json::from_slice(bytes).map_err(SyncError::from)
}

#[cfg(test)]
#[path = "subtree_tests.rs"]
mod tests;
