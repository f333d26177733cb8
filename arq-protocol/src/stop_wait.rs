//! Stop-and-wait ARQ
//!
//! One segment in flight at a time. The sender transmits segment `i`, waits
//! for its acknowledgment, and retransmits it each time the retransmission
//! timeout passes without one. Segment `i + 1` is never sent before `i` is
//! acknowledged.
//!
//! The receiver delivers only the next expected segment. Later segments are
//! dropped silently. Earlier ones (retransmissions whose ack was lost) are
//! dropped too, but re-acknowledged so the sender can move on.

use crate::channel::{await_datagram, DatagramChannel};
use crate::config::EngineConfig;
use crate::error::ArqError;
use crate::packet::{Ack, Segment, RECV_BUFFER_SIZE};
use crate::sequence::SeqNumber;
use crate::stats::{ReceiverStats, SenderStats};
use crate::timer::RetransmitTimer;
use std::cmp::Ordering;

/// Stop-and-wait sender
pub struct StopWaitSender {
    config: EngineConfig,
    timer: RetransmitTimer,
    stats: SenderStats,
}

impl StopWaitSender {
    pub fn new(config: EngineConfig) -> Result<Self, ArqError> {
        config.validate()?;
        Ok(StopWaitSender {
            timer: RetransmitTimer::new(config.rto),
            config,
            stats: SenderStats::default(),
        })
    }

    /// Transfer segments `0..segment_count`, returning the run's statistics
    pub fn send<C: DatagramChannel>(&mut self, channel: &mut C) -> Result<SenderStats, ArqError> {
        tracing::info!(
            segments = self.config.segment_count,
            rto = ?self.config.rto,
            "client: stop-and-wait test"
        );

        let mut buf = [0u8; RECV_BUFFER_SIZE];
        for raw in 0..self.config.segment_count {
            let seq = SeqNumber::new(raw);
            let wire = Segment::patterned(seq).to_bytes();

            channel.send(&wire)?;
            self.stats.segments_sent += 1;
            self.stats.max_outstanding = 1;
            tracing::trace!(%seq, "segment sent");

            self.timer.start();
            loop {
                if !channel.wait_ready(self.timer.remaining())? {
                    channel.send(&wire)?;
                    self.stats.retransmits += 1;
                    tracing::debug!(%seq, retransmits = self.stats.retransmits, "timeout, segment resent");
                    self.timer.start();
                    continue;
                }

                let n = channel.recv(&mut buf)?;
                match Ack::from_bytes(&buf[..n]) {
                    Ok(ack) if ack.seq_number() == seq => {
                        self.stats.confirm(seq);
                        tracing::trace!(%seq, "ack received");
                        break;
                    }
                    Ok(ack) => {
                        self.stats.acks_ignored += 1;
                        tracing::trace!(ack = %ack.seq_number(), expected = %seq, "stale ack ignored");
                    }
                    Err(e) => {
                        self.stats.acks_ignored += 1;
                        tracing::warn!("Dropping datagram: {}", e);
                    }
                }
            }
        }

        Ok(self.stats.clone())
    }

    pub fn stats(&self) -> &SenderStats {
        &self.stats
    }
}

/// Stop-and-wait receiver
pub struct StopWaitReceiver {
    config: EngineConfig,
    stats: ReceiverStats,
}

impl StopWaitReceiver {
    pub fn new(config: EngineConfig) -> Result<Self, ArqError> {
        config.validate()?;
        Ok(StopWaitReceiver {
            config,
            stats: ReceiverStats::default(),
        })
    }

    /// Receive segments `0..segment_count` in order, handing each to `deliver`
    pub fn receive<C, F>(&mut self, channel: &mut C, mut deliver: F) -> Result<ReceiverStats, ArqError>
    where
        C: DatagramChannel,
        F: FnMut(Segment),
    {
        tracing::info!(
            segments = self.config.segment_count,
            "server: reliable test"
        );

        let end = SeqNumber::new(self.config.segment_count);
        let mut expected = SeqNumber::ZERO;
        let mut buf = [0u8; RECV_BUFFER_SIZE];

        while expected < end {
            await_datagram(channel, self.config.idle_timeout)?;
            let n = channel.recv(&mut buf)?;
            self.stats.datagrams_received += 1;

            let segment = match Segment::from_bytes(&buf[..n]) {
                Ok(segment) => segment,
                Err(e) => {
                    self.stats.malformed += 1;
                    tracing::warn!("Dropping datagram: {}", e);
                    continue;
                }
            };

            let seq = segment.seq_number();
            match seq.cmp(&expected) {
                Ordering::Equal => {
                    self.acknowledge(channel, seq)?;
                    self.stats.delivered += 1;
                    deliver(segment);
                    expected.increment();
                }
                Ordering::Less => {
                    self.stats.duplicates += 1;
                    tracing::trace!(%seq, %expected, "duplicate segment, re-acknowledging");
                    self.acknowledge(channel, seq)?;
                }
                Ordering::Greater => {
                    self.stats.rejected += 1;
                    tracing::trace!(%seq, %expected, "segment ahead of expected, dropped");
                }
            }
        }

        Ok(self.stats.clone())
    }

    fn acknowledge<C: DatagramChannel>(&mut self, channel: &mut C, seq: SeqNumber) -> Result<(), ArqError> {
        channel.send(&Ack(seq).to_bytes())?;
        self.stats.ack_sent(seq);
        Ok(())
    }

    pub fn stats(&self) -> &ReceiverStats {
        &self.stats
    }
}
