//! Decode errors for the seqwire wire format.

use std::io;

use thiserror::Error;

use crate::message::Tag;

/// Convenience alias for codec results.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors produced while decoding frames off the wire.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The 3-byte discriminator did not match the expected frame kind.
    #[error("expected {expected} frame, found tag {found:?}")]
    TagMismatch {
        /// Frame kind the caller asked to decode.
        expected: Tag,
        /// Raw discriminator bytes actually read.
        found: [u8; 3],
    },

    /// The 3-byte discriminator matched no known frame kind.
    #[error("unknown frame tag {0:?}")]
    UnknownTag([u8; 3]),

    /// The stream ended in the middle of a frame.
    #[error("incomplete frame: stream ended mid-frame")]
    Incomplete,

    /// A length prefix exceeded [`crate::MAX_FIELD_LEN`].
    #[error("field length {0} exceeds frame limit")]
    Oversize(u32),

    /// A client id field was not valid UTF-8.
    #[error("client id is not valid utf-8")]
    ClientId(#[source] std::string::FromUtf8Error),

    /// Transport-level read failure.
    #[error("read frame: {0}")]
    Io(#[source] io::Error),
}

impl ProtocolError {
    /// Classify an I/O failure from a frame read.
    ///
    /// `read_exact` reports a stream that ends short as `UnexpectedEof`;
    /// everything else is a genuine transport error.
    pub(crate) fn from_read(err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            Self::Incomplete
        } else {
            Self::Io(err)
        }
    }

    /// True if this error means the peer is gone rather than misbehaving.
    ///
    /// Both ends treat a vanished peer as a detach/resume event, not a
    /// protocol violation.
    pub fn is_disconnect(&self) -> bool {
        match self {
            Self::Incomplete => true,
            Self::Io(err) => matches!(
                err.kind(),
                io::ErrorKind::BrokenPipe
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
            ),
            _ => false,
        }
    }
}
