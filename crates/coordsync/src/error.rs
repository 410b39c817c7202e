// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error taxonomy for the coordination SDK.
//!
//! Kinds are hand-written rather than derived: per-entry errors
//! (`MalformedPayload`, `MissingPayloadField`) are swallowed by the
//! subscription runtime and only ever reach a log line, while the rest are
//! returned directly from the offending call. Nothing here is retried by the
//! SDK itself.

use std::fmt;

/// All error kinds the SDK can surface. Each variant's doc comment notes
/// whether it is fatal to the caller or swallowed internally.
#[derive(Debug, Clone)]
pub enum SyncError {
    /// Missing or unparseable `RunEnv` field. Fatal before any session exists.
    ConfigInvalid { field: &'static str, reason: String },
    /// Cannot connect to the backing log store. Fatal to session creation;
    /// recoverable by caller retry.
    StoreUnavailable { reason: String },
    /// Decode failure for a single entry. Non-fatal: logged, entry skipped.
    MalformedPayload { reason: String },
    /// Entry lacks the `payload` field. Non-fatal: logged, entry skipped.
    MissingPayloadField,
    /// Underlying read failed for a reason other than user cancellation.
    /// Reported as a subscription's terminal error.
    SubscriptionTerminated { reason: String },
    /// The caller's cancellation token fired before the barrier's target
    /// was reached.
    BarrierCancelled,
    /// The barrier's target can no longer be met (e.g. the watcher closed).
    BarrierFailed { reason: String },
    /// Operation attempted on an already-closed Writer or Watcher.
    SessionClosed,
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigInvalid { field, reason } => {
                write!(f, "invalid run environment field {field:?}: {reason}")
            }
            Self::StoreUnavailable { reason } => write!(f, "backing store unavailable: {reason}"),
            Self::MalformedPayload { reason } => write!(f, "malformed payload: {reason}"),
            Self::MissingPayloadField => write!(f, "log entry missing payload field"),
            Self::SubscriptionTerminated { reason } => {
                write!(f, "subscription terminated: {reason}")
            }
            Self::BarrierCancelled => write!(f, "barrier cancelled"),
            Self::BarrierFailed { reason } => write!(f, "barrier failed: {reason}"),
            Self::SessionClosed => write!(f, "session already closed"),
        }
    }
}

impl std::error::Error for SyncError {}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        Self::MalformedPayload { reason: err.to_string() }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
