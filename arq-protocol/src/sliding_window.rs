//! Sliding-window ARQ
//!
//! The sender keeps up to `window_size` segments outstanding. Acknowledgments
//! are cumulative: an ack for `v` confirms `v` and every outstanding sequence
//! number below it, so acks may arrive late, twice, or out of order without
//! changing the outcome. When the window is full the sender waits for an ack
//! or the retransmission timeout, whichever comes first, and on timeout
//! resends the window base.
//!
//! The receiver admits segments less than `window_size` ahead of its
//! cumulative point, records them in a [`ReceivedSet`], and after every
//! admitted segment advertises the highest contiguous sequence number it
//! holds. Under [`AckPolicy::EarlyRetransmit`] that value is further clamped
//! to the segment just received.

use crate::channel::{await_datagram, DatagramChannel};
use crate::config::{AckPolicy, EngineConfig};
use crate::error::ArqError;
use crate::packet::{Ack, Segment, RECV_BUFFER_SIZE};
use crate::received::{Insert, ReceivedSet};
use crate::sequence::SeqNumber;
use crate::stats::{ReceiverStats, SenderStats};
use crate::timer::RetransmitTimer;
use crate::window::OutstandingWindow;

/// Sliding-window sender
pub struct SlidingWindowSender {
    config: EngineConfig,
    window: OutstandingWindow,
    timer: RetransmitTimer,
    next_seq: SeqNumber,
    stats: SenderStats,
}

impl SlidingWindowSender {
    pub fn new(config: EngineConfig) -> Result<Self, ArqError> {
        config.validate()?;
        Ok(SlidingWindowSender {
            window: OutstandingWindow::new(config.window_size),
            timer: RetransmitTimer::new(config.rto),
            next_seq: SeqNumber::ZERO,
            stats: SenderStats::default(),
            config,
        })
    }

    /// Transfer segments `0..segment_count`, returning the run's statistics
    ///
    /// Returns once every segment has been acknowledged.
    pub fn send<C: DatagramChannel>(&mut self, channel: &mut C) -> Result<SenderStats, ArqError> {
        tracing::info!(
            segments = self.config.segment_count,
            window = self.config.window_size,
            rto = ?self.config.rto,
            "client: sliding window test"
        );

        let mut buf = [0u8; RECV_BUFFER_SIZE];
        while !self.is_complete() {
            if self.has_unsent() && !self.window.is_full() {
                self.transmit_next(channel)?;
                self.drain_acks(channel, &mut buf)?;
                continue;
            }

            // Window full, or everything sent and awaiting acks
            self.timer.start();
            loop {
                if channel.wait_ready(self.timer.remaining())? {
                    if self.read_ack(channel, &mut buf)? > 0 {
                        break;
                    }
                } else {
                    self.retransmit_base(channel)?;
                    self.timer.start();
                }
            }
        }

        tracing::debug!(
            retransmits = self.stats.retransmits,
            max_outstanding = self.stats.max_outstanding,
            "all segments acknowledged"
        );
        Ok(self.stats.clone())
    }

    /// Apply an acknowledgment value to the window
    ///
    /// Returns the number of segments it confirmed; zero for stale, repeated
    /// or unknown values.
    pub fn on_ack(&mut self, ack: SeqNumber) -> usize {
        let confirmed = self.window.acknowledge(ack);
        if confirmed > 0 {
            self.stats.confirm(ack);
            tracing::trace!(%ack, confirmed, outstanding = self.window.len(), "ack consolidated");
        } else {
            self.stats.acks_ignored += 1;
            tracing::trace!(%ack, base = ?self.window.base(), "ack ignored");
        }
        confirmed
    }

    pub fn window(&self) -> &OutstandingWindow {
        &self.window
    }

    /// Next sequence number that has never been transmitted
    pub fn next_seq(&self) -> SeqNumber {
        self.next_seq
    }

    pub fn stats(&self) -> &SenderStats {
        &self.stats
    }

    /// Every segment has been sent and acknowledged
    pub fn is_complete(&self) -> bool {
        !self.has_unsent() && self.window.is_empty()
    }

    fn has_unsent(&self) -> bool {
        self.next_seq.as_raw() < self.config.segment_count
    }

    fn transmit_next<C: DatagramChannel>(&mut self, channel: &mut C) -> Result<(), ArqError> {
        let seq = self.next_seq;
        self.window.push(seq)?;
        channel.send(&Segment::patterned(seq).to_bytes())?;

        self.next_seq.increment();
        self.stats.segments_sent += 1;
        self.stats.max_outstanding = self.stats.max_outstanding.max(self.window.len());
        tracing::trace!(%seq, outstanding = self.window.len(), "segment sent");
        Ok(())
    }

    fn retransmit_base<C: DatagramChannel>(&mut self, channel: &mut C) -> Result<(), ArqError> {
        if let Some(base) = self.window.base() {
            channel.send(&Segment::patterned(base).to_bytes())?;
            self.stats.retransmits += 1;
            tracing::debug!(seq = %base, retransmits = self.stats.retransmits, "timeout, base resent");
        }
        Ok(())
    }

    /// Consume every ack already waiting, without blocking
    fn drain_acks<C: DatagramChannel>(&mut self, channel: &mut C, buf: &mut [u8]) -> Result<(), ArqError> {
        while channel.poll_ready()? {
            self.read_ack(channel, buf)?;
        }
        Ok(())
    }

    fn read_ack<C: DatagramChannel>(&mut self, channel: &mut C, buf: &mut [u8]) -> Result<usize, ArqError> {
        let n = channel.recv(buf)?;
        match Ack::from_bytes(&buf[..n]) {
            Ok(ack) => Ok(self.on_ack(ack.seq_number())),
            Err(e) => {
                self.stats.acks_ignored += 1;
                tracing::warn!("Dropping datagram: {}", e);
                Ok(0)
            }
        }
    }
}

/// What the receiver did with an arriving segment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Outside the admission window; no ack is sent
    Rejected,
    /// Recorded (or already held); `ack` is the value to advertise, if any
    /// contiguous prefix exists yet
    Accepted {
        ack: Option<SeqNumber>,
        duplicate: bool,
    },
}

/// Sliding-window receiver
pub struct SlidingWindowReceiver {
    config: EngineConfig,
    received: ReceivedSet,
    stats: ReceiverStats,
}

impl SlidingWindowReceiver {
    pub fn new(config: EngineConfig) -> Result<Self, ArqError> {
        config.validate()?;
        Ok(SlidingWindowReceiver {
            received: ReceivedSet::new(config.window_size),
            stats: ReceiverStats::default(),
            config,
        })
    }

    /// Receive segments `0..segment_count`, handing them to `deliver` in order
    pub fn receive<C, F>(&mut self, channel: &mut C, deliver: F) -> Result<ReceiverStats, ArqError>
    where
        C: DatagramChannel,
        F: FnMut(Segment),
    {
        self.receive_from(channel, None, deliver)
    }

    /// Like [`SlidingWindowReceiver::receive`], but process `first` before
    /// reading from the channel
    ///
    /// Used when the segment opening the run was already read off the
    /// channel, as [`answer_stragglers`](crate::linger::answer_stragglers)
    /// does.
    pub fn receive_from<C, F>(
        &mut self,
        channel: &mut C,
        first: Option<Segment>,
        mut deliver: F,
    ) -> Result<ReceiverStats, ArqError>
    where
        C: DatagramChannel,
        F: FnMut(Segment),
    {
        tracing::info!(
            segments = self.config.segment_count,
            window = self.config.window_size,
            policy = %self.config.ack_policy,
            "server: sliding window test"
        );

        if let Some(segment) = first {
            self.stats.datagrams_received += 1;
            self.accept(channel, segment, &mut deliver)?;
        }

        let mut buf = [0u8; RECV_BUFFER_SIZE];
        while !self.is_complete() {
            await_datagram(channel, self.config.idle_timeout)?;
            let n = channel.recv(&mut buf)?;
            self.stats.datagrams_received += 1;

            match Segment::from_bytes(&buf[..n]) {
                Ok(segment) => self.accept(channel, segment, &mut deliver)?,
                Err(e) => {
                    self.stats.malformed += 1;
                    tracing::warn!("Dropping datagram: {}", e);
                }
            }
        }

        Ok(self.stats.clone())
    }

    fn accept<C, F>(&mut self, channel: &mut C, segment: Segment, deliver: &mut F) -> Result<(), ArqError>
    where
        C: DatagramChannel,
        F: FnMut(Segment),
    {
        if let Admission::Accepted { ack: Some(ack), .. } = self.on_segment(segment) {
            channel.send(&Ack(ack).to_bytes())?;
            self.stats.ack_sent(ack);
        }

        while let Some(segment) = self.pop_ready() {
            deliver(segment);
        }
        Ok(())
    }

    /// Run the admission check and record `segment`
    ///
    /// A segment `s` is admitted when `s - cumulative < window_size`;
    /// anything already below the cumulative point is admitted as a
    /// duplicate so that it is acknowledged again.
    pub fn on_segment(&mut self, segment: Segment) -> Admission {
        let seq = segment.seq_number();
        let ahead = self.received.cumulative().distance_to(seq);

        if seq.as_raw() >= self.config.segment_count || ahead >= self.config.window_size as i64 {
            self.stats.rejected += 1;
            tracing::trace!(%seq, cumulative = %self.received.cumulative(), "segment outside window");
            return Admission::Rejected;
        }

        let duplicate = match self.received.insert(segment) {
            Insert::Stored => false,
            Insert::Duplicate => {
                self.stats.duplicates += 1;
                true
            }
            Insert::OutOfRange => {
                self.stats.rejected += 1;
                return Admission::Rejected;
            }
        };

        let ack = self.advertised_ack(seq);
        tracing::trace!(%seq, duplicate, ack = ?ack, "segment admitted");
        Admission::Accepted { ack, duplicate }
    }

    fn advertised_ack(&self, seq: SeqNumber) -> Option<SeqNumber> {
        let contiguous = self.received.highest_contiguous()?;
        Some(match self.config.ack_policy {
            AckPolicy::Cumulative => contiguous,
            AckPolicy::EarlyRetransmit => contiguous.min(seq),
        })
    }

    /// Take the next in-order segment ready for the application
    pub fn pop_ready(&mut self) -> Option<Segment> {
        let segment = self.received.pop_ready()?;
        self.stats.delivered += 1;
        Some(segment)
    }

    /// Smallest sequence number not yet received
    pub fn cumulative(&self) -> SeqNumber {
        self.received.cumulative()
    }

    /// Check whether `seq` has been received
    pub fn has_received(&self, seq: SeqNumber) -> bool {
        self.received.contains(seq)
    }

    /// Every segment of the run has been received
    pub fn is_complete(&self) -> bool {
        self.received.cumulative().as_raw() >= self.config.segment_count
    }

    pub fn stats(&self) -> &ReceiverStats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedChannel;
    use std::time::Duration;

    fn config(count: u32, window: usize) -> EngineConfig {
        EngineConfig::default()
            .with_segment_count(count)
            .with_window_size(window)
            .with_rto(Duration::from_millis(1))
    }

    fn seg(seq: u32) -> Segment {
        Segment::patterned(SeqNumber::new(seq))
    }

    #[test]
    fn test_sender_window_bound() {
        let mut channel = ScriptedChannel::default();
        let mut sender = SlidingWindowSender::new(config(10, 3)).unwrap();

        // Fill the window by hand; no acks are queued
        for _ in 0..3 {
            sender.transmit_next(&mut channel).unwrap();
        }
        assert!(sender.window().is_full());
        assert!(sender.transmit_next(&mut channel).is_err());
        assert_eq!(channel.sent_segments(), vec![0, 1, 2]);
    }

    #[test]
    fn test_sender_no_loss() {
        let mut channel = ScriptedChannel::acking(|_| true);
        let mut sender = SlidingWindowSender::new(config(10, 3)).unwrap();

        let stats = sender.send(&mut channel).unwrap();

        assert!(stats.max_outstanding <= 3);
        assert_eq!(stats.retransmits, 0);
        assert_eq!(stats.acked_through, Some(SeqNumber::new(9)));
        assert_eq!(channel.sent_segments(), (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_sender_cumulative_collapse() {
        let mut channel = ScriptedChannel::default();
        let mut sender = SlidingWindowSender::new(config(10, 8)).unwrap();
        for _ in 0..7 {
            sender.transmit_next(&mut channel).unwrap();
        }
        sender.on_ack(SeqNumber::new(0));
        sender.on_ack(SeqNumber::new(1));
        assert_eq!(sender.window().base(), Some(SeqNumber::new(2)));

        assert_eq!(sender.on_ack(SeqNumber::new(5)), 4);
        assert_eq!(sender.window().base(), Some(SeqNumber::new(6)));

        // Late and repeated acks change nothing
        assert_eq!(sender.on_ack(SeqNumber::new(3)), 0);
        assert_eq!(sender.on_ack(SeqNumber::new(5)), 0);
        assert_eq!(sender.stats().acks_ignored, 2);
    }

    #[test]
    fn test_sender_resends_base_on_timeout() {
        let mut dropped = false;
        let mut channel = ScriptedChannel::acking(move |seq| {
            if seq.as_raw() == 0 && !dropped {
                dropped = true;
                return false;
            }
            true
        });
        let mut sender = SlidingWindowSender::new(config(4, 2)).unwrap();

        let stats = sender.send(&mut channel).unwrap();

        // Ack for 1 confirms 0 as well, so nothing needs resending
        assert_eq!(stats.retransmits, 0);
        assert!(sender.is_complete());
    }

    #[test]
    fn test_sender_resends_when_every_ack_lost_once() {
        let mut seen = std::collections::HashSet::new();
        let mut channel = ScriptedChannel::acking(move |seq| !seen.insert(seq));
        let mut sender = SlidingWindowSender::new(config(3, 3)).unwrap();

        let stats = sender.send(&mut channel).unwrap();

        assert!(stats.retransmits >= 1);
        assert_eq!(stats.acked_through, Some(SeqNumber::new(2)));
    }

    #[test]
    fn test_receiver_admission() {
        let mut receiver = SlidingWindowReceiver::new(config(20, 3)).unwrap();

        assert_eq!(receiver.on_segment(seg(3)), Admission::Rejected);
        assert!(!receiver.has_received(SeqNumber::new(3)));

        assert_eq!(
            receiver.on_segment(seg(2)),
            Admission::Accepted {
                ack: None,
                duplicate: false
            }
        );
        assert_eq!(receiver.stats().rejected, 1);
    }

    #[test]
    fn test_receiver_early_retransmit_clamp() {
        let mut receiver = SlidingWindowReceiver::new(config(20, 4)).unwrap();

        for seq in [0, 1, 3] {
            receiver.on_segment(seg(seq));
        }
        assert_eq!(receiver.cumulative(), SeqNumber::new(2));

        // Gap at 2 is filled: contiguous prefix now ends at 3
        assert_eq!(
            receiver.on_segment(seg(2)),
            Admission::Accepted {
                ack: Some(SeqNumber::new(2)),
                duplicate: false
            }
        );

        // A late duplicate is acknowledged with its own number
        assert_eq!(
            receiver.on_segment(seg(1)),
            Admission::Accepted {
                ack: Some(SeqNumber::new(1)),
                duplicate: true
            }
        );
    }

    #[test]
    fn test_receiver_cumulative_policy() {
        let config = config(20, 4).with_ack_policy(AckPolicy::Cumulative);
        let mut receiver = SlidingWindowReceiver::new(config).unwrap();

        for seq in [0, 1, 3, 2] {
            receiver.on_segment(seg(seq));
        }
        assert_eq!(
            receiver.on_segment(seg(1)),
            Admission::Accepted {
                ack: Some(SeqNumber::new(3)),
                duplicate: true
            }
        );
    }

    #[test]
    fn test_receiver_rejects_beyond_run() {
        let mut receiver = SlidingWindowReceiver::new(config(2, 4)).unwrap();
        assert_eq!(receiver.on_segment(seg(2)), Admission::Rejected);
    }

    #[test]
    fn test_receiver_delivers_in_order() {
        let mut channel = ScriptedChannel::default();
        for seq in [1, 0, 3, 2, 2, 5, 4] {
            channel.push_segment(seq);
        }
        let mut receiver = SlidingWindowReceiver::new(config(6, 4)).unwrap();

        let mut delivered = Vec::new();
        let stats = receiver
            .receive(&mut channel, |s| delivered.push(s.seq_number().as_raw()))
            .unwrap();

        assert_eq!(delivered, vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(stats.duplicates, 1);
        // 1 arrives before any prefix exists, so it is not acknowledged
        assert_eq!(channel.sent_acks(), vec![0, 1, 2, 2, 3, 4]);
    }

    #[test]
    fn test_receiver_starts_with_handed_over_segment() {
        let mut channel = ScriptedChannel::default();
        for seq in [1, 2] {
            channel.push_segment(seq);
        }
        let mut receiver = SlidingWindowReceiver::new(config(3, 3)).unwrap();

        let mut delivered = Vec::new();
        let stats = receiver
            .receive_from(&mut channel, Some(seg(0)), |s| {
                delivered.push(s.seq_number().as_raw())
            })
            .unwrap();

        assert_eq!(delivered, vec![0, 1, 2]);
        assert_eq!(stats.datagrams_received, 3);
        assert_eq!(channel.sent_acks(), vec![0, 1, 2]);
    }
}
