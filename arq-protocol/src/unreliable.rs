//! Best-effort transfer
//!
//! The baseline: every segment is sent exactly once and nothing is
//! acknowledged. Whatever the channel loses stays lost.

use crate::channel::DatagramChannel;
use crate::config::EngineConfig;
use crate::error::ArqError;
use crate::packet::{Segment, RECV_BUFFER_SIZE};
use crate::sequence::SeqNumber;
use crate::stats::{ReceiverStats, SenderStats};

/// Fire-and-forget sender
pub struct UnreliableSender {
    config: EngineConfig,
    stats: SenderStats,
}

impl UnreliableSender {
    pub fn new(config: EngineConfig) -> Result<Self, ArqError> {
        config.validate()?;
        Ok(UnreliableSender {
            config,
            stats: SenderStats::default(),
        })
    }

    /// Transmit segments `0..segment_count` once each
    pub fn send<C: DatagramChannel>(&mut self, channel: &mut C) -> Result<SenderStats, ArqError> {
        tracing::info!(
            segments = self.config.segment_count,
            "client: unreliable test"
        );

        for raw in 0..self.config.segment_count {
            let segment = Segment::patterned(SeqNumber::new(raw));
            channel.send(&segment.to_bytes())?;
            self.stats.segments_sent += 1;
            tracing::trace!(seq = raw, "segment sent");
        }

        Ok(self.stats.clone())
    }

    pub fn stats(&self) -> &SenderStats {
        &self.stats
    }
}

/// Receiver that takes whatever arrives, in arrival order
pub struct UnreliableReceiver {
    config: EngineConfig,
    stats: ReceiverStats,
}

impl UnreliableReceiver {
    pub fn new(config: EngineConfig) -> Result<Self, ArqError> {
        config.validate()?;
        Ok(UnreliableReceiver {
            config,
            stats: ReceiverStats::default(),
        })
    }

    /// Read up to `segment_count` datagrams
    ///
    /// Stops early, without error, once the channel stays quiet for the
    /// configured idle timeout. Without one, a lost segment means this blocks
    /// until the process is stopped.
    pub fn receive<C, F>(&mut self, channel: &mut C, mut deliver: F) -> Result<ReceiverStats, ArqError>
    where
        C: DatagramChannel,
        F: FnMut(Segment),
    {
        tracing::info!(
            segments = self.config.segment_count,
            "server: unreliable test"
        );

        let mut buf = [0u8; RECV_BUFFER_SIZE];
        while self.stats.datagrams_received < u64::from(self.config.segment_count) {
            if let Some(limit) = self.config.idle_timeout {
                if !channel.wait_ready(limit)? {
                    tracing::info!(
                        received = self.stats.datagrams_received,
                        "channel idle, ending unreliable receive"
                    );
                    break;
                }
            }

            let n = channel.recv(&mut buf)?;
            self.stats.datagrams_received += 1;

            match Segment::from_bytes(&buf[..n]) {
                Ok(segment) => {
                    tracing::trace!(seq = %segment.seq_number(), "segment received");
                    self.stats.delivered += 1;
                    deliver(segment);
                }
                Err(e) => {
                    self.stats.malformed += 1;
                    tracing::warn!("Dropping datagram: {}", e);
                }
            }
        }

        Ok(self.stats.clone())
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

    #[test]
    fn test_sender_sends_each_segment_once() {
        let mut channel = ScriptedChannel::default();
        let mut sender =
            UnreliableSender::new(EngineConfig::default().with_segment_count(4)).unwrap();

        let stats = sender.send(&mut channel).unwrap();

        assert_eq!(stats.segments_sent, 4);
        assert_eq!(stats.retransmits, 0);
        assert_eq!(channel.sent_segments(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_receiver_stops_when_idle() {
        let mut channel = ScriptedChannel::default();
        channel.push_segment(0);
        channel.push_segment(2);

        let config = EngineConfig::default()
            .with_segment_count(3)
            .with_idle_timeout(Some(Duration::from_millis(1)));
        let mut receiver = UnreliableReceiver::new(config).unwrap();

        let mut delivered = Vec::new();
        let stats = receiver
            .receive(&mut channel, |s| delivered.push(s.seq_number().as_raw()))
            .unwrap();

        assert_eq!(delivered, vec![0, 2]);
        assert_eq!(stats.delivered, 2);
        assert_eq!(stats.acks_sent, 0);
    }
}
