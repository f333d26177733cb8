//! Receiver-side record of delivered segments
//!
//! [`ReceivedSet`] answers "has sequence number `s` been received?" for the
//! sliding-window receiver. Everything below the cumulative point is received
//! by definition; above it, a circular buffer indexed by `seq mod capacity`
//! holds the out-of-order arrivals. Memory stays bounded by the window size no
//! matter how long the flow runs.

use crate::packet::Segment;
use crate::sequence::SeqNumber;
use std::collections::VecDeque;

/// Outcome of recording an arrival
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Insert {
    /// Newly recorded
    Stored,
    /// Already recorded earlier
    Duplicate,
    /// Too far ahead of the cumulative point to fit in the ring
    OutOfRange,
}

/// Circular set of received sequence numbers
pub struct ReceivedSet {
    /// Segments received above the cumulative point
    slots: Vec<Option<Segment>>,
    /// Ring size (power of 2, at least the window size)
    capacity: usize,
    /// Smallest sequence number not yet received
    cumulative: SeqNumber,
    /// Segments released in order by the prefix collapse, awaiting the application
    ready: VecDeque<Segment>,
}

impl ReceivedSet {
    /// Create a set able to hold `window_size` sequence numbers ahead of the
    /// cumulative point
    pub fn new(window_size: usize) -> Self {
        let capacity = window_size.max(1).next_power_of_two();
        ReceivedSet {
            slots: vec![None; capacity],
            capacity,
            cumulative: SeqNumber::ZERO,
            ready: VecDeque::new(),
        }
    }

    /// Smallest sequence number not yet received
    ///
    /// Every sequence number strictly below this value has been received.
    pub fn cumulative(&self) -> SeqNumber {
        self.cumulative
    }

    /// Highest sequence number of the contiguous received prefix
    pub fn highest_contiguous(&self) -> Option<SeqNumber> {
        self.cumulative.prev()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Check whether `seq` has been received
    pub fn contains(&self, seq: SeqNumber) -> bool {
        let ahead = self.cumulative.distance_to(seq);
        if ahead < 0 {
            true
        } else if ahead as usize >= self.capacity {
            false
        } else {
            self.slots[seq.slot(self.capacity)].is_some()
        }
    }

    /// Record the arrival of `segment`
    ///
    /// When the arrival fills the slot at the cumulative point, the
    /// cumulative point advances over every contiguous received entry and
    /// those segments become available from [`ReceivedSet::pop_ready`].
    pub fn insert(&mut self, segment: Segment) -> Insert {
        let seq = segment.seq_number();
        let ahead = self.cumulative.distance_to(seq);

        if ahead < 0 {
            return Insert::Duplicate;
        }
        if ahead as usize >= self.capacity {
            return Insert::OutOfRange;
        }

        let idx = seq.slot(self.capacity);
        if self.slots[idx].is_some() {
            return Insert::Duplicate;
        }
        self.slots[idx] = Some(segment);

        self.collapse_prefix();
        Insert::Stored
    }

    fn collapse_prefix(&mut self) {
        loop {
            let idx = self.cumulative.slot(self.capacity);
            match self.slots[idx].take() {
                Some(segment) => {
                    self.ready.push_back(segment);
                    self.cumulative.increment();
                }
                None => break,
            }
        }
    }

    /// Take the next in-order segment released by the prefix collapse
    pub fn pop_ready(&mut self) -> Option<Segment> {
        self.ready.pop_front()
    }
}
