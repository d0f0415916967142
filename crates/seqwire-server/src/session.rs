//! Per-client session state machine.
//!
//! A session tracks one client's series, which indices that client has
//! acknowledged, and a sweep cursor. The machine is pure: [`SessionState::tick`]
//! returns a [`TickStep`] describing what the serving loop should do on this
//! scheduler tick, and [`SessionState::record_ack`] folds in acknowledgments
//! as the ack listener decodes them.
//!
//! # Sweeps
//!
//! The cursor walks indices `0..=n` (slot `n` is the checksum frame). An
//! acked index is skipped without sending; an unacked one is sent. Once the
//! cursor passes `n`, the machine rewinds it to the first unacked index and
//! starts a fresh sweep covering only what is still outstanding. When every
//! slot — the checksum slot included — is acked, the session is complete.
//!
//! Ack flags are monotone (false to true, never reset), so the scheduler and
//! the ack listener can race without coordination: the worst case is one
//! redundant send of an index acked mid-tick.

use seqwire_proto::{Checksum, Message, Number, series_digest};

/// What the serving loop should do on one scheduler tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickStep {
    /// Write this frame to the client.
    Send(Message),
    /// The cursor index was already acked; nothing to write this tick.
    Skip,
    /// Every slot is acked. Close the connection.
    Complete,
}

/// One client's delivery state, retained across reconnects.
#[derive(Debug, Clone)]
pub struct SessionState {
    series: Vec<u32>,
    /// `series.len() + 1` flags; the last one is the checksum slot.
    acks: Vec<bool>,
    cursor: usize,
}

impl SessionState {
    /// Create a fresh session for a newly generated series.
    pub fn new(series: Vec<u32>) -> Self {
        let slots = series.len() + 1;
        Self { series, acks: vec![false; slots], cursor: 0 }
    }

    /// The series this session delivers.
    pub fn series(&self) -> &[u32] {
        &self.series
    }

    /// Record an acknowledgment for one slot.
    ///
    /// Returns `true` if the flag was newly set. Out-of-range sequences are
    /// ignored — the wire can carry anything.
    pub fn record_ack(&mut self, sequence: u32) -> bool {
        match self.acks.get_mut(sequence as usize) {
            Some(slot) => {
                let fresh = !*slot;
                *slot = true;
                fresh
            },
            None => false,
        }
    }

    /// True once every slot, checksum included, is acked.
    pub fn is_complete(&self) -> bool {
        self.acks.iter().all(|&acked| acked)
    }

    fn first_unacked(&self) -> Option<usize> {
        self.acks.iter().position(|&acked| !acked)
    }

    /// Advance the sweep by one step.
    pub fn tick(&mut self) -> TickStep {
        if self.cursor > self.series.len() {
            // A full sweep finished; rewind to the first outstanding slot.
            match self.first_unacked() {
                None => return TickStep::Complete,
                Some(index) => self.cursor = index,
            }
        }

        let index = self.cursor;
        self.cursor += 1;

        if self.acks[index] {
            return TickStep::Skip;
        }

        if index == self.series.len() {
            TickStep::Send(Message::Checksum(Checksum {
                sequence: index as u32,
                digest: series_digest(&self.series).to_vec(),
            }))
        } else {
            TickStep::Send(Message::Number(Number {
                sequence: index as u32,
                value: self.series[index],
            }))
        }
    }
}
