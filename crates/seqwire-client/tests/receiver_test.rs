//! Receiver tests against a scripted server.
//!
//! The "server" here is a raw listener driven by each test, so delivery
//! order, corruption, and mid-stream closes are all deterministic.

use std::time::Duration;

use seqwire_client::{ClientError, Outcome, ReceiptStore, receiver};
use seqwire_proto::{Acknowledge, Checksum, Connect, Number, series_digest};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpListener,
    sync::watch,
    time::timeout,
};

fn no_shutdown() -> watch::Receiver<bool> {
    watch::channel(false).1
}

async fn bind() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    (listener, addr)
}

#[tokio::test]
async fn verifies_matching_digest() {
    let (listener, addr) = bind().await;

    let server = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let connect = Connect::decode(&mut stream).await.unwrap();
        assert_eq!(connect.n, 3);
        assert_eq!(connect.client_id, "happy");

        let series = [10u32, 20, 30];
        for (seq, value) in series.iter().enumerate() {
            let frame = Number { sequence: seq as u32, value: *value }.encode();
            stream.write_all(&frame).await.unwrap();
        }
        let chk = Checksum { sequence: 3, digest: series_digest(&series).to_vec() };
        stream.write_all(&chk.encode()).await.unwrap();

        // Collect acks until the client hangs up.
        let mut acked = Vec::new();
        while let Ok(ack) = Acknowledge::decode(&mut stream).await {
            acked.push(ack.sequence);
        }
        acked
    });

    let dir = tempfile::tempdir().unwrap();
    let outcome = timeout(
        Duration::from_secs(5),
        receiver::run(&addr, 3, "happy", dir.path(), no_shutdown()),
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(outcome, Outcome::Verified);

    let mut acked = server.await.unwrap();
    acked.sort_unstable();
    assert_eq!(acked, vec![0, 1, 2, 3]);

    // Progress was persisted.
    let store = ReceiptStore::open(dir.path(), "happy", 3).unwrap();
    assert_eq!(store.values(), &[10, 20, 30]);
    assert!(store.all_received());
}

#[tokio::test]
async fn rejects_corrupted_value() {
    let (listener, addr) = bind().await;

    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        Connect::decode(&mut stream).await.unwrap();

        // Digest covers [10, 20, 30] but index 1 is delivered as 21.
        let digest = series_digest(&[10, 20, 30]).to_vec();
        for (seq, value) in [10u32, 21, 30].iter().enumerate() {
            let frame = Number { sequence: seq as u32, value: *value }.encode();
            stream.write_all(&frame).await.unwrap();
        }
        stream.write_all(&Checksum { sequence: 3, digest }.encode()).await.unwrap();

        let mut buf = [0u8; 64];
        while stream.read(&mut buf).await.map(|read| read > 0).unwrap_or(false) {}
    });

    let dir = tempfile::tempdir().unwrap();
    let err = timeout(
        Duration::from_secs(5),
        receiver::run(&addr, 3, "corrupt", dir.path(), no_shutdown()),
    )
    .await
    .unwrap()
    .unwrap_err();
    assert!(matches!(err, ClientError::ChecksumMismatch { .. }), "got {err}");

    // The record is flushed even on verification failure.
    let store = ReceiptStore::open(dir.path(), "corrupt", 3).unwrap();
    assert_eq!(store.values(), &[10, 21, 30]);
}

#[tokio::test]
async fn reports_server_close_mid_series() {
    let (listener, addr) = bind().await;

    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        Connect::decode(&mut stream).await.unwrap();

        let frame = Number { sequence: 0, value: 10 }.encode();
        stream.write_all(&frame).await.unwrap();
        // Graceful FIN, then drain the client's ack so nothing resets.
        stream.shutdown().await.unwrap();
        let mut buf = [0u8; 64];
        while stream.read(&mut buf).await.map(|read| read > 0).unwrap_or(false) {}
    });

    let dir = tempfile::tempdir().unwrap();
    let err = timeout(
        Duration::from_secs(5),
        receiver::run(&addr, 3, "cut-off", dir.path(), no_shutdown()),
    )
    .await
    .unwrap()
    .unwrap_err();
    assert!(matches!(err, ClientError::ConnectionClosed), "got {err}");

    // Partial progress survives for the next run.
    let store = ReceiptStore::open(dir.path(), "cut-off", 3).unwrap();
    assert_eq!(store.values(), &[10, 0, 0]);
    assert!(!store.all_received());
}

#[tokio::test]
async fn shutdown_signal_stops_the_loop_and_flushes() {
    let (listener, addr) = bind().await;

    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        Connect::decode(&mut stream).await.unwrap();
        // Send nothing; just hold the connection until the client leaves.
        let mut buf = [0u8; 64];
        while stream.read(&mut buf).await.map(|read| read > 0).unwrap_or(false) {}
    });

    // Already-signalled shutdown: the loop must stop before its first read.
    let (_shutdown_tx, shutdown_rx) = watch::channel(true);

    let dir = tempfile::tempdir().unwrap();
    let outcome = timeout(
        Duration::from_secs(5),
        receiver::run(&addr, 3, "stopped", dir.path(), shutdown_rx),
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(outcome, Outcome::Interrupted);

    // Flushed unconditionally on the way out.
    assert!(dir.path().join("stopped.state").exists());
}
