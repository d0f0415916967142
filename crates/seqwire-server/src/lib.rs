//! Seqwire server: delivers one fixed-length series of u32 values per client
//! with acknowledgment tracking, periodic resend sweeps, and resume across
//! reconnects.
//!
//! The crate splits along the seam between protocol logic and I/O:
//!
//! - [`session`] is a pure state machine over the per-client series, ack
//!   flags, and sweep cursor. It performs no I/O; each `tick` returns an
//!   action the serving loop executes.
//! - [`registry`] owns the listener, the map from client identity to session,
//!   and the per-connection serving tasks that drive the state machine.
#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod registry;
pub mod session;

pub use error::ServerError;
pub use registry::{Registry, RegistryConfig};
pub use session::{SessionState, TickStep};
