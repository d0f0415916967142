//! The receive loop: connect handshake, frame dispatch, ack emission, digest
//! verification.
//!
//! Acks are emitted as soon as a frame is handled, but never from the decode
//! loop itself: they go through a bounded channel into one dedicated writer
//! task, so wire writes are totally ordered and a burst of frames cannot
//! spawn unbounded work.
//!
//! Shutdown is cooperative: the loop polls the signal once per iteration,
//! before each decode attempt. A read already in progress runs to completion
//! (or until the peer closes) first. The receipt store is flushed on every
//! exit path — success, mismatch, error, or shutdown.

use std::path::Path;

use seqwire_proto::{Acknowledge, Connect, Message, series_digest};
use tokio::{
    io::AsyncWriteExt,
    net::TcpStream,
    sync::{mpsc, watch},
};
use tracing::{debug, info, warn};

use crate::{error::ClientError, store::ReceiptStore};

/// Depth of the ack queue between the decode loop and the writer task.
const ACK_QUEUE_DEPTH: usize = 32;

/// How a successful run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Every slot received and the digest matched.
    Verified,
    /// The shutdown signal fired before the series completed. Progress is
    /// persisted; a rerun with the same identity resumes.
    Interrupted,
}

/// Connect to `addr`, receive the series for `client_id`, verify the digest.
///
/// The receipt record lives in `state_dir` and is flushed unconditionally
/// before this returns, whatever the path out.
pub async fn run(
    addr: &str,
    n: u32,
    client_id: &str,
    state_dir: &Path,
    shutdown: watch::Receiver<bool>,
) -> Result<Outcome, ClientError> {
    let stream = TcpStream::connect(addr).await.map_err(ClientError::Connect)?;
    let mut store = ReceiptStore::open(state_dir, client_id, n)?;

    let result = receive_series(stream, &mut store, n, client_id, shutdown).await;

    match store.flush() {
        Ok(()) => result,
        Err(flush_err) => match result {
            Ok(_) => Err(flush_err.into()),
            // The loop error is the more useful one; don't mask it.
            Err(err) => {
                warn!(error = %flush_err, "failed to flush receipt record");
                Err(err)
            },
        },
    }
}

enum End {
    Complete,
    Interrupted,
    Failed(ClientError),
}

async fn receive_series(
    stream: TcpStream,
    store: &mut ReceiptStore,
    n: u32,
    client_id: &str,
    shutdown: watch::Receiver<bool>,
) -> Result<Outcome, ClientError> {
    let (mut reader, mut writer) = stream.into_split();

    let connect = Connect { n, client_id: client_id.to_owned() };
    writer.write_all(&connect.encode()).await.map_err(ClientError::Write)?;

    // Single serialized ack writer; the bounded channel applies backpressure
    // instead of growing a task per frame.
    let (ack_tx, mut ack_rx) = mpsc::channel::<u32>(ACK_QUEUE_DEPTH);
    let ack_writer = tokio::spawn(async move {
        while let Some(sequence) = ack_rx.recv().await {
            let frame = Acknowledge { sequence }.encode();
            if let Err(err) = writer.write_all(&frame).await {
                // The decode side will observe the dead connection.
                debug!(error = %err, "ack write failed");
                return;
            }
        }
    });

    let mut expected_digest: Option<Vec<u8>> = None;

    let end = loop {
        if *shutdown.borrow() {
            info!("shutdown requested, stopping receive loop");
            break End::Interrupted;
        }

        if store.all_received() {
            break End::Complete;
        }

        // Mid-series only numbers and the checksum are valid; anything else,
        // including a vanished peer, reads as the server being gone.
        match Message::decode(&mut reader).await {
            Ok(Message::Number(num)) => {
                debug!(sequence = num.sequence, value = num.value, "number");
                store.record_value(num.sequence, num.value);
                if ack_tx.send(num.sequence).await.is_err() {
                    break End::Failed(ClientError::ConnectionClosed);
                }
            },
            Ok(Message::Checksum(chk)) => {
                debug!(sequence = chk.sequence, digest = %hex::encode(&chk.digest), "checksum");
                store.record_checksum(chk.sequence);
                let sequence = chk.sequence;
                expected_digest = Some(chk.digest);
                if ack_tx.send(sequence).await.is_err() {
                    break End::Failed(ClientError::ConnectionClosed);
                }
            },
            Ok(other) => {
                debug!(tag = %other.tag(), "unexpected frame kind");
                break End::Failed(ClientError::ConnectionClosed);
            },
            Err(err) => {
                debug!(error = %err, "decode failed");
                break End::Failed(ClientError::ConnectionClosed);
            },
        }
    };

    // Close our end of the connection before verifying: drop the read half,
    // let the writer drain any queued acks, then hang up.
    drop(reader);
    drop(ack_tx);
    let _ = ack_writer.await;

    match end {
        End::Interrupted => Ok(Outcome::Interrupted),
        End::Failed(err) => Err(err),
        End::Complete => verify(store, expected_digest.as_deref()),
    }
}

/// Recompute the digest from stored values and compare byte-for-byte.
fn verify(store: &ReceiptStore, expected: Option<&[u8]>) -> Result<Outcome, ClientError> {
    let computed = series_digest(store.values());

    match expected {
        Some(expected) if expected == computed.as_slice() => {
            info!(digest = %hex::encode(computed), "checksum match");
            Ok(Outcome::Verified)
        },
        Some(expected) => Err(ClientError::ChecksumMismatch {
            expected: hex::encode(expected),
            computed: hex::encode(computed),
        }),
        // Every flag was already set at startup but no checksum frame was
        // seen this run, so there is nothing to compare against.
        None => Err(ClientError::ChecksumMismatch {
            expected: "<none received>".to_owned(),
            computed: hex::encode(computed),
        }),
    }
}
