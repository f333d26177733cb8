//! Scripted channel for engine unit tests
//!
//! Time does not pass here: `wait_ready` answers immediately from the queue,
//! so an empty queue reads as an expired timeout.

use crate::channel::DatagramChannel;
use crate::packet::{Ack, Datagram, Segment};
use crate::sequence::SeqNumber;
use std::collections::VecDeque;
use std::io;
use std::time::Duration;

type Responder = Box<dyn FnMut(SeqNumber) -> bool>;

#[derive(Default)]
pub struct ScriptedChannel {
    inbound: VecDeque<Vec<u8>>,
    sent: Vec<Vec<u8>>,
    /// Called for every segment sent; `true` queues an ack for it
    responder: Option<Responder>,
}

impl ScriptedChannel {
    /// A channel that acknowledges each sent segment unless `deliver_ack` says otherwise
    pub fn acking(deliver_ack: impl FnMut(SeqNumber) -> bool + 'static) -> Self {
        ScriptedChannel {
            responder: Some(Box::new(deliver_ack)),
            ..Default::default()
        }
    }

    pub fn push_segment(&mut self, seq: u32) {
        let segment = Segment::patterned(SeqNumber::new(seq));
        self.inbound.push_back(segment.to_bytes().to_vec());
    }

    pub fn push_ack(&mut self, seq: u32) {
        self.inbound.push_back(Ack(SeqNumber::new(seq)).to_bytes().to_vec());
    }

    pub fn sent_segments(&self) -> Vec<u32> {
        self.sent
            .iter()
            .filter_map(|d| match Datagram::classify(d) {
                Ok(Datagram::Segment(s)) => Some(s.seq_number().as_raw()),
                _ => None,
            })
            .collect()
    }

    pub fn sent_acks(&self) -> Vec<u32> {
        self.sent
            .iter()
            .filter_map(|d| match Datagram::classify(d) {
                Ok(Datagram::Ack(a)) => Some(a.seq_number().as_raw()),
                _ => None,
            })
            .collect()
    }
}

impl DatagramChannel for ScriptedChannel {
    fn send(&mut self, buf: &[u8]) -> io::Result<()> {
        self.sent.push(buf.to_vec());
        if let (Some(responder), Ok(segment)) = (self.responder.as_mut(), Segment::from_bytes(buf)) {
            if responder(segment.seq_number()) {
                self.inbound
                    .push_back(Ack(segment.seq_number()).to_bytes().to_vec());
            }
        }
        Ok(())
    }

    fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let datagram = self
            .inbound
            .pop_front()
            .ok_or_else(|| io::Error::new(io::ErrorKind::WouldBlock, "script exhausted"))?;
        let n = datagram.len().min(buf.len());
        buf[..n].copy_from_slice(&datagram[..n]);
        Ok(n)
    }

    fn poll_ready(&mut self) -> io::Result<bool> {
        Ok(!self.inbound.is_empty())
    }

    fn wait_ready(&mut self, _timeout: Duration) -> io::Result<bool> {
        Ok(!self.inbound.is_empty())
    }
}
