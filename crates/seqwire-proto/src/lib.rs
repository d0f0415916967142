//! Wire format for the seqwire protocol.
//!
//! Frames are tag-prefixed: a 3-byte ASCII discriminator followed by
//! fixed-width big-endian fields, with a u32 length prefix for the one
//! variable-length trailing field a frame may carry. Four frame kinds exist:
//!
//! | Kind          | Layout                                           |
//! |---------------|--------------------------------------------------|
//! | [`Connect`]     | `"CON"` · n(4) · len(client_id)(4) · client_id |
//! | [`Number`]      | `"NUM"` · sequence(4) · value(4)               |
//! | [`Acknowledge`] | `"ACK"` · sequence(4)                          |
//! | [`Checksum`]    | `"CHK"` · sequence(4) · len(digest)(4) · digest |
//!
//! Decoding is strict: a reader that knows which kind it expects calls that
//! kind's `decode` and gets a tag-mismatch error on anything else; a reader
//! that does not reads the discriminator once via [`Message::decode`] and is
//! dispatched to the matching body decoder. There is no probing or
//! re-buffering.
//!
//! Length-prefixed fields are capped at [`MAX_FIELD_LEN`] so a hostile peer
//! cannot make us allocate unbounded memory from a 4-byte prefix.
#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod digest;
pub mod errors;
pub mod message;

pub use digest::{DIGEST_LEN, series_digest};
pub use errors::{ProtocolError, Result};
pub use message::{Acknowledge, Checksum, Connect, MAX_FIELD_LEN, Message, Number, Tag};
