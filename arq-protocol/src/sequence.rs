//! Sequence Number Handling
//!
//! Segments are numbered from 0 upward, one number per segment. The space is
//! treated as unbounded for the length of a run: there is no wraparound, so
//! ordering is plain integer ordering.

use std::fmt;
use std::ops::{Add, AddAssign, Sub};

/// Position of a segment in the stream
#[derive(Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd, Default)]
pub struct SeqNumber(u32);

impl SeqNumber {
    /// First sequence number of every flow
    pub const ZERO: SeqNumber = SeqNumber(0);

    /// Create a new sequence number
    #[inline]
    pub const fn new(value: u32) -> Self {
        SeqNumber(value)
    }

    /// Get the raw sequence number value
    #[inline]
    pub fn as_raw(self) -> u32 {
        self.0
    }

    /// Increment the sequence number by 1
    #[inline]
    pub fn increment(&mut self) {
        self.0 += 1;
    }

    /// Get the next sequence number
    #[inline]
    pub fn next(self) -> Self {
        SeqNumber(self.0 + 1)
    }

    /// Get the previous sequence number, or `None` at the start of the stream
    #[inline]
    pub fn prev(self) -> Option<Self> {
        self.0.checked_sub(1).map(SeqNumber)
    }

    /// Signed distance from this sequence number to `other`
    ///
    /// Positive values mean `other` is ahead of `self`.
    #[inline]
    pub fn distance_to(self, other: SeqNumber) -> i64 {
        i64::from(other.0) - i64::from(self.0)
    }

    /// Index into a ring of `capacity` slots (`capacity` must be a power of two)
    #[inline]
    pub fn slot(self, capacity: usize) -> usize {
        (self.0 as usize) & (capacity - 1)
    }
}

impl fmt::Debug for SeqNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SeqNumber({})", self.0)
    }
}

impl fmt::Display for SeqNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for SeqNumber {
    fn from(value: u32) -> Self {
        SeqNumber(value)
    }
}

impl From<SeqNumber> for u32 {
    fn from(seq: SeqNumber) -> u32 {
        seq.0
    }
}

impl Add<u32> for SeqNumber {
    type Output = SeqNumber;

    fn add(self, rhs: u32) -> SeqNumber {
        SeqNumber(self.0 + rhs)
    }
}

impl AddAssign<u32> for SeqNumber {
    fn add_assign(&mut self, rhs: u32) {
        self.0 += rhs;
    }
}

impl Sub for SeqNumber {
    type Output = i64;

    /// Signed distance between two sequence numbers
    fn sub(self, rhs: SeqNumber) -> i64 {
        rhs.distance_to(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_increment() {
        let mut seq = SeqNumber::new(100);
        seq.increment();
        assert_eq!(seq.as_raw(), 101);
        assert_eq!(seq.next().as_raw(), 102);
    }

    #[test]
    fn test_prev() {
        assert_eq!(SeqNumber::new(5).prev(), Some(SeqNumber::new(4)));
        assert_eq!(SeqNumber::ZERO.prev(), None);
    }

    #[test]
    fn test_distance() {
        let a = SeqNumber::new(100);
        let b = SeqNumber::new(200);
        assert_eq!(a.distance_to(b), 100);
        assert_eq!(b.distance_to(a), -100);
        assert_eq!(b - a, 100);
        assert_eq!(a - b, -100);
    }

    #[test]
    fn test_ordering_is_plain() {
        let a = SeqNumber::new(u32::MAX - 1);
        let b = SeqNumber::new(3);
        assert!(b < a);
        assert_eq!(a.max(b), a);
    }

    #[test]
    fn test_slot() {
        assert_eq!(SeqNumber::new(0).slot(8), 0);
        assert_eq!(SeqNumber::new(9).slot(8), 1);
        assert_eq!(SeqNumber::new(15).slot(8), 7);
    }

    #[test]
    fn test_add() {
        let mut seq = SeqNumber::new(10) + 5;
        assert_eq!(seq.as_raw(), 15);
        seq += 1;
        assert_eq!(seq, SeqNumber::new(16));
    }
}
