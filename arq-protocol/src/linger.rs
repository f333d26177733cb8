//! Responder shutdown
//!
//! The last acknowledgment of a run can be lost like any other, and once the
//! responder stops there is nobody left to answer the sender's retransmission.
//! After finishing, the responder repeats its final acknowledgment a fixed
//! number of times at a fixed interval. This is best effort only.
//!
//! Between back-to-back runs on the same channel the responder cannot go
//! quiet: the previous sender may still be retransmitting while waiting for a
//! final ack that was lost. [`answer_stragglers`] keeps answering it until the
//! next run shows up.

use crate::channel::{await_datagram, DatagramChannel};
use crate::config::{EngineConfig, LingerConfig};
use crate::error::ArqError;
use crate::packet::{Ack, Segment, RECV_BUFFER_SIZE};
use crate::sequence::SeqNumber;
use std::thread;

/// Repeat `final_ack` according to `config`, returning how many were sent
pub fn linger<C: DatagramChannel>(
    channel: &mut C,
    final_ack: SeqNumber,
    config: &LingerConfig,
) -> Result<u32, ArqError> {
    tracing::info!(
        ack = %final_ack,
        count = config.count,
        interval = ?config.interval,
        "server ending, repeating final ack"
    );

    let wire = Ack(final_ack).to_bytes();
    for _ in 0..config.count {
        thread::sleep(config.interval);
        channel.send(&wire)?;
    }
    Ok(config.count)
}

/// Answer retransmissions left over from the run described by `previous`
/// until a segment of the next run arrives, and return that segment
///
/// Once the previous receiver is complete its sender can only be resending
/// segments from the last window, `segment_count - window_size` and up. Each
/// of those is answered with the previous run's final ack. The first segment
/// below that range opens the next run.
pub fn answer_stragglers<C: DatagramChannel>(
    channel: &mut C,
    previous: &EngineConfig,
) -> Result<Segment, ArqError> {
    let stale_from = previous
        .segment_count
        .checked_sub(previous.window_size as u32)
        .filter(|&from| from > 0)
        .ok_or_else(|| {
            ArqError::InvalidConfig(format!(
                "{} segments cannot be told apart from the next run at window {}",
                previous.segment_count, previous.window_size
            ))
        })?;
    let final_ack = Ack(previous.final_seq()).to_bytes();

    let mut buf = [0u8; RECV_BUFFER_SIZE];
    let mut answered = 0u64;
    loop {
        await_datagram(channel, previous.idle_timeout)?;
        let n = channel.recv(&mut buf)?;
        let segment = match Segment::from_bytes(&buf[..n]) {
            Ok(segment) => segment,
            Err(e) => {
                tracing::debug!("Dropping datagram between runs: {}", e);
                continue;
            }
        };

        if segment.seq_number().as_raw() < stale_from {
            if answered > 0 {
                tracing::info!(answered, "previous run finished late");
            }
            return Ok(segment);
        }

        channel.send(&final_ack)?;
        answered += 1;
        tracing::debug!(seq = %segment.seq_number(), "straggler answered with final ack");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedChannel;
    use std::time::Duration;

    #[test]
    fn test_linger_repeats_final_ack() {
        let mut channel = ScriptedChannel::default();
        let config = LingerConfig {
            count: 3,
            interval: Duration::from_millis(1),
        };

        let sent = linger(&mut channel, SeqNumber::new(19_999), &config).unwrap();

        assert_eq!(sent, 3);
        assert_eq!(channel.sent_acks(), vec![19_999; 3]);
    }

    fn previous_run() -> EngineConfig {
        EngineConfig::default()
            .with_segment_count(10)
            .with_window_size(3)
            .with_idle_timeout(Some(Duration::from_millis(1)))
    }

    #[test]
    fn test_stragglers_answered_until_next_run() {
        let mut channel = ScriptedChannel::default();
        for seq in [9, 7, 9, 0, 1] {
            channel.push_segment(seq);
        }

        let first = answer_stragglers(&mut channel, &previous_run()).unwrap();

        assert_eq!(first.seq_number(), SeqNumber::new(0));
        assert_eq!(channel.sent_acks(), vec![9, 9, 9]);
    }

    #[test]
    fn test_straggler_wait_gives_up_when_idle() {
        let mut channel = ScriptedChannel::default();
        channel.push_segment(8);

        let err = answer_stragglers(&mut channel, &previous_run()).unwrap_err();

        assert!(matches!(err, ArqError::IdleTimeout(_)));
        assert_eq!(channel.sent_acks(), vec![9]);
    }

    #[test]
    fn test_stragglers_need_a_run_longer_than_its_window() {
        let mut channel = ScriptedChannel::default();
        let previous = previous_run().with_segment_count(3);

        let err = answer_stragglers(&mut channel, &previous).unwrap_err();
        assert!(matches!(err, ArqError::InvalidConfig(_)));
    }
}
