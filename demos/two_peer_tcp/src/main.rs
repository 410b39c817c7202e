// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Two-peer TCP handoff: a two-instance run where the instance whose
//! `Write` on `peerIPs` returns seq 1 becomes the receiver and the one
//! returning seq 2 becomes the sender. Role is decided purely by which
//! `Write` call lands first, so no instance needs to know its role ahead
//! of time.
//!
//! A bare TCP listener has no fixed port, so the receiver publishes a
//! second entry on the same subtree once it has bound one, carrying `port`
//! where the first (role-determining) entry left it unset.

use std::net::{IpAddr, SocketAddr, UdpSocket};
use std::time::Duration;

use clap::Parser;
use coordsync::{watcher_writer, RunEnv, Subtree, Watcher, Writer};
use coordsync_redis::{RedisConfig, RedisStore};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::info;

const PAYLOAD_SIZE: usize = 10 * 1024 * 1024;
const READY_STATE: &str = "ready";

#[derive(Parser)]
#[command(name = "two-peer-tcp", about = "Two-instance TCP handoff demo instance.")]
struct Cli {
    #[command(flatten)]
    redis: RedisConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct Announce {
    ip: String,
    port: Option<u16>,
}

fn peer_ips_subtree() -> Subtree<Announce> {
    Subtree::new("peerIPs", |a: &Announce| a.ip.clone())
}

/// The address this instance would be reached at, discovered by asking the
/// OS which local address it would use to reach the outside world, rather
/// than walking every interface and matching a CIDR by hand.
fn local_ip() -> anyhow::Result<IpAddr> {
    let socket = UdpSocket::bind("0.0.0.0:0")?;
    socket.connect("8.8.8.8:80")?;
    Ok(socket.local_addr()?.ip())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    if let Err(e) = run().await {
        tracing::error!("fatal: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let run_env = RunEnv::from_env()?;

    let store = RedisStore::connect(&cli.redis).await?;
    let (writer, watcher) = watcher_writer(run_env, std::sync::Arc::new(store));

    let ip = local_ip()?;
    let subtree = peer_ips_subtree();

    let result = writer.write(&subtree, &Announce { ip: ip.to_string(), port: None }).await?;
    info!(seq = result.seq, %ip, "published peer IP");

    match result.seq {
        1 => receive(&writer, &watcher, &subtree, ip).await?,
        2 => send(&writer, &watcher, &subtree).await?,
        other => anyhow::bail!("unexpected seq {other}: only two instances are supported"),
    }

    watcher.close().await;
    writer.close();
    Ok(())
}

async fn receive(
    writer: &Writer,
    watcher: &Watcher,
    subtree: &Subtree<Announce>,
    ip: IpAddr,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind((ip, 0)).await?;
    let port = listener.local_addr()?.port();
    info!(port, "listening for sender");

    writer.write(subtree, &Announce { ip: ip.to_string(), port: Some(port) }).await?;
    writer.signal_entry(READY_STATE).await?;

    let (mut stream, peer) = listener.accept().await?;
    info!(%peer, "accepted connection");

    let mut buf = [0u8; 64 * 1024];
    let mut total = 0usize;
    loop {
        let n = stream.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        total += n;
    }

    info!(bytes_read = total, expected = PAYLOAD_SIZE, "connection closed");
    anyhow::ensure!(total == PAYLOAD_SIZE, "expected {PAYLOAD_SIZE} bytes, read {total}");
    Ok(())
}

async fn send(
    _writer: &Writer,
    watcher: &Watcher,
    subtree: &Subtree<Announce>,
) -> anyhow::Result<()> {
    let (handle, mut rx) = watcher.subscribe(subtree).await?;

    watcher.barrier(READY_STATE, 1, CancellationToken::new()).await?;
    info!("receiver is ready");

    let addr = loop {
        let announce = tokio::time::timeout(Duration::from_secs(30), rx.recv())
            .await?
            .ok_or_else(|| anyhow::anyhow!("peerIPs subscription closed before receiver's address arrived"))?;
        if let Some(port) = announce.port {
            break SocketAddr::new(announce.ip.parse()?, port);
        }
    };
    handle.cancel().await;

    info!(%addr, "dialing receiver");
    let mut stream = TcpStream::connect(addr).await?;

    let chunk = vec![0u8; 64 * 1024];
    let mut sent = 0usize;
    while sent < PAYLOAD_SIZE {
        let n = (PAYLOAD_SIZE - sent).min(chunk.len());
        stream.write_all(&chunk[..n]).await?;
        sent += n;
    }
    stream.shutdown().await?;

    info!(bytes_written = sent, "transfer complete");
    Ok(())
}
