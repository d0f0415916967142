//! Server error types.
//!
//! Only listener-level failures surface here. Per-session failures are
//! contained: a lost or misbehaving connection terminates that session's
//! serving loop and nothing else.

use std::io;

use thiserror::Error;

/// Fatal registry failures.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Could not bind the listening socket.
    #[error("bind listener: {0}")]
    Bind(#[source] io::Error),

    /// The accept loop failed.
    #[error("accept connection: {0}")]
    Accept(#[source] io::Error),
}
