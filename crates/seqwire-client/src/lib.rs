//! Seqwire client: receives one series of u32 values, acknowledges each
//! frame, verifies the end-to-end digest, and persists progress so a rerun
//! with the same identity resumes instead of restarting.
//!
//! - [`store`] is the durable receipt record, one JSON file per client
//!   identity.
//! - [`receiver`] drives the connect handshake and the decode/ack loop.
#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod receiver;
pub mod store;

pub use error::{ClientError, StoreError};
pub use receiver::{Outcome, run};
pub use store::ReceiptStore;
