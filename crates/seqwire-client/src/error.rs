//! Client error types.

use std::{io, path::PathBuf};

use thiserror::Error;

/// Receiver failures.
///
/// `ChecksumMismatch` is terminal and user-visible: the process exits
/// non-zero and never retries on its own. A fresh run with the same identity
/// re-fetches whatever is still missing, but cannot repair values already
/// stored wrong.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Could not reach the server.
    #[error("connect to server: {0}")]
    Connect(#[source] io::Error),

    /// A frame write failed.
    #[error("send frame: {0}")]
    Write(#[source] io::Error),

    /// The server went away (or the stream desynchronized) mid-series.
    #[error("server closed the connection")]
    ConnectionClosed,

    /// Receipt record load or flush failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The locally recomputed digest does not match the one the server sent.
    #[error("checksum mismatch: expected {expected}, computed {computed}")]
    ChecksumMismatch {
        /// Hex digest carried by the server's checksum frame.
        expected: String,
        /// Hex digest recomputed from the stored values.
        computed: String,
    },
}

/// Receipt record persistence failures.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Could not read an existing state file.
    #[error("read state file {path}: {source}")]
    Read {
        /// Backing file.
        path: PathBuf,
        /// Underlying failure.
        #[source]
        source: io::Error,
    },

    /// An existing state file did not parse.
    #[error("parse state file {path}: {source}")]
    Parse {
        /// Backing file.
        path: PathBuf,
        /// Underlying failure.
        #[source]
        source: serde_json::Error,
    },

    /// Could not write the state file.
    #[error("write state file {path}: {source}")]
    Write {
        /// Backing file.
        path: PathBuf,
        /// Underlying failure.
        #[source]
        source: io::Error,
    },
}
