// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end scenarios against the coordination SDK, minus the two-peer
//! TCP handoff (which needs real sockets across two processes and lives as
//! a runnable program in `demos/two_peer_tcp` instead of an in-process
//! test).

use std::time::Duration;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use coordsync::{watcher_writer, LogStore, SyncError};
use coordsync_specs::{init_tracing, memory_store, test_run_env};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct Record(String);

fn records_subtree() -> coordsync::Subtree<Record> {
    coordsync::Subtree::new("records", |r: &Record| r.0.clone())
}

/// Late subscriber replay: a publisher writes three records before any
/// subscriber exists; a subscriber started afterwards still receives all
/// three, in order, then blocks for more.
#[tokio::test]
async fn late_subscriber_replay() -> anyhow::Result<()> {
    init_tracing();
    let store = memory_store();
    let (writer, watcher) = watcher_writer(test_run_env("r-replay", 1, 2), store);
    let subtree = records_subtree();

    writer.write(&subtree, &Record("A".into())).await?;
    writer.write(&subtree, &Record("B".into())).await?;
    writer.write(&subtree, &Record("C".into())).await?;

    let (handle, mut rx) = watcher.subscribe(&subtree).await?;

    for expected in ["A", "B", "C"] {
        let got = tokio::time::timeout(Duration::from_millis(200), rx.recv())
            .await?
            .ok_or_else(|| anyhow::anyhow!("delivery channel closed before an item arrived"))?;
        assert_eq!(got, Record(expected.into()));
    }

    // Then blocks: nothing further arrives until something new is written.
    assert!(tokio::time::timeout(Duration::from_millis(100), rx.recv()).await.is_err());
    handle.cancel().await;
    Ok(())
}

/// Barrier with a cancelled context: a target that never arrives yields
/// `BarrierCancelled` once the caller gives up, without disturbing any
/// other running subscription.
#[tokio::test]
async fn barrier_with_cancelled_context() -> anyhow::Result<()> {
    init_tracing();
    let store = memory_store();
    let (writer, watcher) = watcher_writer(test_run_env("r-cancel-ctx", 1, 1), store);
    let subtree = records_subtree();

    // An unrelated, still-running subscription must be unaffected by the
    // cancelled barrier below.
    writer.write(&subtree, &Record("unrelated".into())).await?;
    let (sub_handle, mut rx) = watcher.subscribe(&subtree).await?;

    writer.signal_entry("done").await?;
    writer.signal_entry("done").await?;

    let cancel = CancellationToken::new();
    let barrier = watcher.barrier("done", 5, cancel.clone());
    tokio::time::sleep(Duration::from_millis(20)).await;
    cancel.cancel();

    let outcome = tokio::time::timeout(Duration::from_millis(200), barrier).await?;
    assert!(matches!(outcome, Err(SyncError::BarrierCancelled)));

    // The other subscription kept running the whole time.
    let got = tokio::time::timeout(Duration::from_millis(200), rx.recv())
        .await?
        .ok_or_else(|| anyhow::anyhow!("delivery channel closed before an item arrived"))?;
    assert_eq!(got, Record("unrelated".into()));
    sub_handle.cancel().await;
    Ok(())
}

/// Malformed payload tolerance: a garbage entry placed out-of-band is
/// skipped with a warning, and the one valid record after it is still
/// delivered exactly once.
#[tokio::test]
async fn malformed_payload_tolerance() -> anyhow::Result<()> {
    init_tracing();
    let store = memory_store();
    let key = coordsync::keys::subtree_log_key("r-malformed", "records");
    store.append(&key, Bytes::from_static(b"not valid json")).await?;

    let (writer, watcher) = watcher_writer(test_run_env("r-malformed", 1, 1), store);
    let subtree = records_subtree();
    writer.write(&subtree, &Record("P".into())).await?;

    let (handle, mut rx) = watcher.subscribe(&subtree).await?;
    let got = tokio::time::timeout(Duration::from_millis(200), rx.recv())
        .await?
        .ok_or_else(|| anyhow::anyhow!("delivery channel closed before an item arrived"))?;
    assert_eq!(got, Record("P".into()));

    // Nothing else arrives — the malformed entry was skipped, not
    // delivered as a second (garbled) value.
    assert!(tokio::time::timeout(Duration::from_millis(100), rx.recv()).await.is_err());
    handle.cancel().await;
    Ok(())
}

/// Kill unblocks read: cancelling a subscription with no new entries
/// pending returns promptly, closes the delivery channel, and surfaces no
/// error to the caller.
#[tokio::test]
async fn kill_unblocks_read() -> anyhow::Result<()> {
    init_tracing();
    let store = memory_store();
    let (_writer, watcher) = watcher_writer(test_run_env("r-kill", 1, 1), store);
    let subtree = records_subtree();

    let (handle, mut rx) = watcher.subscribe(&subtree).await?;
    tokio::time::sleep(Duration::from_millis(50)).await;

    let started = tokio::time::Instant::now();
    tokio::time::timeout(Duration::from_secs(1), handle.cancel()).await?;
    assert!(started.elapsed() < Duration::from_secs(1));

    assert!(rx.recv().await.is_none());
    Ok(())
}

/// Signal race: concurrent signallers on the same state receive distinct,
/// gap-free values, and a barrier on the total completes.
#[tokio::test]
async fn signal_race_yields_distinct_values() -> anyhow::Result<()> {
    init_tracing();
    let store = memory_store();
    let (writer, watcher) = watcher_writer(test_run_env("r-race", 1, 1), store);

    let mut handles = Vec::new();
    for _ in 0..100 {
        let writer = writer.clone();
        handles.push(tokio::spawn(async move { writer.signal_entry("go").await }));
    }

    let mut values: Vec<u64> = Vec::new();
    for h in handles {
        values.push(h.await??);
    }
    values.sort_unstable();
    let expected: Vec<u64> = (1..=100).collect();
    assert_eq!(values, expected);

    let result = tokio::time::timeout(Duration::from_millis(200), watcher.barrier("go", 100, CancellationToken::new()))
        .await?;
    assert!(result.is_ok());
    Ok(())
}
