//! Per-run transfer statistics

use crate::sequence::SeqNumber;

/// Sender-side counters for one run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SenderStats {
    /// First transmissions
    pub segments_sent: u64,
    /// Timeout-driven retransmissions
    pub retransmits: u64,
    /// Acknowledgments that advanced the sender
    pub acks_accepted: u64,
    /// Stale, unknown or malformed acknowledgments
    pub acks_ignored: u64,
    /// Largest number of segments outstanding at once
    pub max_outstanding: usize,
    /// Highest sequence number confirmed so far
    pub acked_through: Option<SeqNumber>,
}

impl SenderStats {
    /// Total datagrams put on the wire
    pub fn datagrams_sent(&self) -> u64 {
        self.segments_sent + self.retransmits
    }

    /// Record a confirmation; the confirmed point never moves backwards
    pub(crate) fn confirm(&mut self, seq: SeqNumber) {
        self.acks_accepted += 1;
        self.acked_through = Some(self.acked_through.map_or(seq, |prev| prev.max(seq)));
    }
}

/// Receiver-side counters for one run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReceiverStats {
    /// Datagrams read from the channel
    pub datagrams_received: u64,
    /// Segments handed to the application, in order
    pub delivered: u64,
    /// Segments that had already been received
    pub duplicates: u64,
    /// Segments outside the admission window
    pub rejected: u64,
    /// Datagrams that did not parse as segments
    pub malformed: u64,
    /// Acknowledgments sent
    pub acks_sent: u64,
    /// Last acknowledgment value sent
    pub last_ack: Option<SeqNumber>,
}

impl ReceiverStats {
    pub(crate) fn ack_sent(&mut self, ack: SeqNumber) {
        self.acks_sent += 1;
        self.last_ack = Some(ack);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confirm_is_monotonic() {
        let mut stats = SenderStats::default();
        stats.confirm(SeqNumber::new(5));
        stats.confirm(SeqNumber::new(3));
        assert_eq!(stats.acked_through, Some(SeqNumber::new(5)));
        assert_eq!(stats.acks_accepted, 2);
    }

    #[test]
    fn test_datagrams_sent() {
        let stats = SenderStats {
            segments_sent: 10,
            retransmits: 3,
            ..Default::default()
        };
        assert_eq!(stats.datagrams_sent(), 13);
    }
}
