// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Writer/Watcher session.
//!
//! Both halves share a `RunEnv` and a [`LogStore`](crate::store::LogStore)
//! but own independent lifecycles — closing one has no effect on the
//! other, so a caller that only needs to publish (or only needs to watch)
//! can drop the half it doesn't use.

mod watcher;
mod writer;

pub use watcher::Watcher;
pub use writer::Writer;

use std::sync::Arc;

use crate::runenv::RunEnv;
use crate::store::LogStore;

/// Construct the paired [`Writer`] and [`Watcher`] for one instance's run.
pub fn watcher_writer(run_env: RunEnv, store: Arc<dyn LogStore>) -> (Writer, Watcher) {
    let run_env = Arc::new(run_env);
    let writer = Writer::new(Arc::clone(&run_env), Arc::clone(&store));
    let watcher = Watcher::new(run_env, store);
    (writer, watcher)
}
