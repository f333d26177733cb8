//! Sender-side window of outstanding segments
//!
//! [`OutstandingWindow`] holds the sequence numbers that have been sent but not
//! yet acknowledged, in send order. Entries are strictly increasing and the
//! front entry (the *base*) is the retransmission candidate.

use crate::sequence::SeqNumber;
use std::collections::VecDeque;
use thiserror::Error;

/// Window errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum WindowError {
    #[error("Window is full ({0} outstanding)")]
    Full(usize),

    #[error("Sequence number {seq} does not follow {last}")]
    NotIncreasing { seq: SeqNumber, last: SeqNumber },
}

/// Bounded, ordered set of unacknowledged sequence numbers
#[derive(Debug, Clone)]
pub struct OutstandingWindow {
    entries: VecDeque<SeqNumber>,
    capacity: usize,
}

impl OutstandingWindow {
    /// Create a window that admits at most `capacity` outstanding segments
    pub fn new(capacity: usize) -> Self {
        OutstandingWindow {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Record a freshly transmitted segment
    pub fn push(&mut self, seq: SeqNumber) -> Result<(), WindowError> {
        if self.is_full() {
            return Err(WindowError::Full(self.entries.len()));
        }
        if let Some(&last) = self.entries.back() {
            if seq <= last {
                return Err(WindowError::NotIncreasing { seq, last });
            }
        }
        self.entries.push_back(seq);
        Ok(())
    }

    /// Apply an acknowledgment for `ack`
    ///
    /// An ack confirms `ack` and every outstanding sequence number below it.
    /// Acks below the base, or for sequence numbers not in the window, change
    /// nothing. Returns the number of entries removed.
    pub fn acknowledge(&mut self, ack: SeqNumber) -> usize {
        match self.base() {
            Some(base) if ack >= base => {}
            _ => return 0,
        }

        match self.entries.binary_search(&ack) {
            Ok(0) => {
                self.entries.pop_front();
                1
            }
            Ok(idx) => {
                self.entries.drain(..=idx);
                idx + 1
            }
            Err(_) => 0,
        }
    }

    /// Oldest unacknowledged sequence number
    pub fn base(&self) -> Option<SeqNumber> {
        self.entries.front().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn contains(&self, seq: SeqNumber) -> bool {
        self.entries.binary_search(&seq).is_ok()
    }

    pub fn iter(&self) -> impl Iterator<Item = SeqNumber> + '_ {
        self.entries.iter().copied()
    }
}
