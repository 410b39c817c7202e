// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! RunEnv: immutable, environment-sourced configuration for one instance.
//!
//! `RunEnv` is an owned value constructed once via [`RunEnv::from_env`] and
//! passed explicitly into [`crate::session::watcher_writer`]. An explicitly
//! threaded, `Clone`-able value gets a "read once, never mutate after"
//! contract without any process-wide global state.

use std::collections::HashMap;
use std::env;

use crate::error::SyncError;

const ENV_RUN_ID: &str = "TEST_RUN_ID";
const ENV_PLAN: &str = "TEST_PLAN";
const ENV_CASE: &str = "TEST_CASE";
const ENV_INSTANCE_COUNT: &str = "TEST_INSTANCE_COUNT";
const ENV_INSTANCE_ROLE: &str = "TEST_INSTANCE_ROLE";
const ENV_INSTANCE_SEQ: &str = "TEST_INSTANCE_SEQ";
const ENV_SIDECAR: &str = "TEST_SIDECAR";
const ENV_PARAMS_PREFIX: &str = "TEST_PARAMS_";

/// Immutable, per-instance configuration. Construct once with
/// [`RunEnv::from_env`]; every field is fixed for the lifetime of the
/// instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunEnv {
    pub run_id: String,
    pub plan_name: String,
    pub test_case: String,
    pub instance_count: u64,
    pub instance_role: Option<String>,
    pub instance_seq: u64,
    /// When true, the plan is expected to synchronise on a
    /// `network-initialized` state before proceeding. The SDK does not
    /// perform that synchronisation itself — this flag only records the
    /// intent.
    pub sidecar: bool,
    pub params: HashMap<String, String>,
}

impl RunEnv {
    /// Parse a `RunEnv` from the process environment. Fails fast on the
    /// first missing or unparseable required field with
    /// [`SyncError::ConfigInvalid`] — never panics.
    pub fn from_env() -> Result<Self, SyncError> {
        let run_id = required(ENV_RUN_ID)?;
        let plan_name = required(ENV_PLAN)?;
        let test_case = required(ENV_CASE)?;
        let instance_count = required_u64(ENV_INSTANCE_COUNT)?;
        let instance_seq = required_u64(ENV_INSTANCE_SEQ)?;
        let instance_role = env::var(ENV_INSTANCE_ROLE).ok();
        let sidecar = optional_bool(ENV_SIDECAR)?;
        let params = collect_params();

        if instance_count == 0 {
            return Err(SyncError::ConfigInvalid {
                field: "TEST_INSTANCE_COUNT",
                reason: "must be a positive integer".into(),
            });
        }
        if instance_seq == 0 || instance_seq > instance_count {
            return Err(SyncError::ConfigInvalid {
                field: "TEST_INSTANCE_SEQ",
                reason: format!("must be a 1-based ordinal <= {instance_count}"),
            });
        }

        Ok(Self {
            run_id,
            plan_name,
            test_case,
            instance_count,
            instance_role,
            instance_seq,
            sidecar,
            params,
        })
    }

    /// Convenience accessor over `params`, for plan-facing parameter
    /// lookups.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }
}

fn required(var: &'static str) -> Result<String, SyncError> {
    match env::var(var) {
        Ok(value) if !value.is_empty() => Ok(value),
        Ok(_) => Err(SyncError::ConfigInvalid { field: var, reason: "must not be empty".into() }),
        Err(_) => Err(SyncError::ConfigInvalid { field: var, reason: "not set".into() }),
    }
}

fn required_u64(var: &'static str) -> Result<u64, SyncError> {
    let raw = required(var)?;
    raw.parse::<u64>()
        .map_err(|e| SyncError::ConfigInvalid { field: var, reason: format!("not an integer: {e}") })
}

fn optional_bool(var: &'static str) -> Result<bool, SyncError> {
    match env::var(var) {
        Ok(raw) => raw
            .parse::<bool>()
            .map_err(|e| SyncError::ConfigInvalid { field: var, reason: format!("not a boolean: {e}") }),
        Err(_) => Ok(false),
    }
}

fn collect_params() -> HashMap<String, String> {
    env::vars()
        .filter_map(|(key, value)| {
            key.strip_prefix(ENV_PARAMS_PREFIX).map(|suffix| (suffix.to_lowercase(), value))
        })
        .collect()
}

#[cfg(test)]
#[path = "runenv_tests.rs"]
mod tests;
