// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared harness for the integration tests in `tests/`.
//!
//! These tests drive `coordsync`'s public API directly, in-process, against
//! `MemoryStore` (and, when `REDIS_URL` is set, `coordsync-redis`'s
//! `RedisStore`) rather than spawning a subprocess — `coordsync` is a
//! library, not a server binary, so there is no binary to spawn the way the
//! reference workspace's own `tests/specs` spawns `coop`.

use std::collections::HashMap;
use std::sync::{Arc, Once};

use coordsync::{LogStore, MemoryStore, RunEnv};

static TRACING_INIT: Once = Once::new();

/// Install a `tracing` subscriber for test output. Safe to call from every
/// test — only the first call has effect.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("coordsync=debug")),
            )
            .with_test_writer()
            .try_init();
    });
}

/// The `LogStore` every test in this crate runs against by default.
pub fn memory_store() -> Arc<dyn LogStore> {
    Arc::new(MemoryStore::new())
}

/// A `RunEnv` for a fixed-size run, as if parsed from the environment, for
/// tests that construct a `Watcher`/`Writer` pair directly rather than
/// going through `RunEnv::from_env`.
pub fn test_run_env(run_id: &str, instance_seq: u64, instance_count: u64) -> RunEnv {
    RunEnv {
        run_id: run_id.to_owned(),
        plan_name: "spec-tests".into(),
        test_case: "integration".into(),
        instance_count,
        instance_role: None,
        instance_seq,
        sidecar: false,
        params: HashMap::new(),
    }
}
