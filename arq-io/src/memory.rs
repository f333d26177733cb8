//! In-memory fault-injecting channel pair
//!
//! [`pair`] returns two connected [`MemoryChannel`]s. Each datagram sent
//! through either end passes a seeded fault model before it is queued for
//! the other end:
//!
//! | Fault       | Effect                                                  |
//! |-------------|---------------------------------------------------------|
//! | Loss        | dropped with probability `loss_rate`                    |
//! | Scripted    | dropped if it is the n-th datagram sent by a given side |
//! | Duplication | delivered twice with probability `duplicate_rate`       |
//! | Reordering  | held back until after the sender's next datagram        |
//!
//! The same seed always produces the same fault pattern for the same
//! sequence of sends.

use arq_protocol::{Datagram, DatagramChannel};
use bytes::Bytes;
use crossbeam::channel::{unbounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::io::{self, ErrorKind};
use std::sync::Arc;
use std::time::Duration;

/// Which end of the pair a datagram came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    /// First channel returned by [`pair`] (the data sender)
    Initiator,
    /// Second channel returned by [`pair`] (the responder)
    Responder,
}

impl Side {
    fn index(self) -> usize {
        match self {
            Side::Initiator => 0,
            Side::Responder => 1,
        }
    }
}

/// Drop the `index`-th datagram (0-based) sent by `from`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScriptedDrop {
    pub from: Side,
    pub index: u64,
}

/// Fault model for a channel pair
///
/// Rates are probabilities and are clamped to `[0.0, 1.0]`.
#[derive(Debug, Clone, Default)]
pub struct FaultConfig {
    pub loss_rate: f64,
    pub duplicate_rate: f64,
    pub reorder_rate: f64,
    pub seed: u64,
    pub scripted_drops: Vec<ScriptedDrop>,
    /// Keep a copy of every datagram offered to the link
    pub record_trace: bool,
}

impl FaultConfig {
    /// A perfect link
    pub fn lossless() -> Self {
        Self::default()
    }

    /// Random loss in both directions
    pub fn lossy(loss_rate: f64, seed: u64) -> Self {
        FaultConfig {
            loss_rate,
            seed,
            ..Self::default()
        }
    }

    pub fn with_scripted_drop(mut self, from: Side, index: u64) -> Self {
        self.scripted_drops.push(ScriptedDrop { from, index });
        self
    }

    pub fn with_duplicates(mut self, rate: f64) -> Self {
        self.duplicate_rate = rate;
        self
    }

    pub fn with_reordering(mut self, rate: f64) -> Self {
        self.reorder_rate = rate;
        self
    }

    pub fn with_trace(mut self) -> Self {
        self.record_trace = true;
        self
    }
}

/// Counters for everything the link did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkStats {
    pub offered: u64,
    pub dropped: u64,
    pub duplicated: u64,
    pub reordered: u64,
}

/// One datagram offered to the link
#[derive(Debug, Clone)]
pub struct TraceEntry {
    pub from: Side,
    pub bytes: Bytes,
    pub dropped: bool,
}

impl TraceEntry {
    pub fn datagram(&self) -> Option<Datagram> {
        Datagram::classify(&self.bytes).ok()
    }
}

enum Fate {
    Drop,
    Deliver { copies: usize, hold: bool },
}

struct Link {
    rng: StdRng,
    config: FaultConfig,
    sent_by: [u64; 2],
    stats: LinkStats,
    trace: Vec<TraceEntry>,
}

impl Link {
    fn new(config: FaultConfig) -> Self {
        Link {
            rng: StdRng::seed_from_u64(config.seed),
            config,
            sent_by: [0; 2],
            stats: LinkStats::default(),
            trace: Vec::new(),
        }
    }

    fn roll(&mut self, rate: f64) -> bool {
        rate > 0.0 && self.rng.random_bool(rate.clamp(0.0, 1.0))
    }

    fn decide(&mut self, from: Side, bytes: &Bytes) -> Fate {
        let index = self.sent_by[from.index()];
        self.sent_by[from.index()] += 1;
        self.stats.offered += 1;

        let scripted = self
            .config
            .scripted_drops
            .iter()
            .any(|d| d.from == from && d.index == index);
        let loss_rate = self.config.loss_rate;
        let dropped = scripted || self.roll(loss_rate);

        if self.config.record_trace {
            self.trace.push(TraceEntry {
                from,
                bytes: bytes.clone(),
                dropped,
            });
        }

        if dropped {
            self.stats.dropped += 1;
            tracing::trace!(?from, index, scripted, "link dropped datagram");
            return Fate::Drop;
        }

        let duplicate_rate = self.config.duplicate_rate;
        let copies = if self.roll(duplicate_rate) {
            self.stats.duplicated += 1;
            2
        } else {
            1
        };

        let reorder_rate = self.config.reorder_rate;
        let hold = self.roll(reorder_rate);
        if hold {
            self.stats.reordered += 1;
        }

        Fate::Deliver { copies, hold }
    }
}

/// Observer for a link that outlives the channels moved into threads
#[derive(Clone)]
pub struct LinkHandle {
    link: Arc<Mutex<Link>>,
}

impl LinkHandle {
    pub fn stats(&self) -> LinkStats {
        self.link.lock().stats.clone()
    }

    pub fn trace(&self) -> Vec<TraceEntry> {
        self.link.lock().trace.clone()
    }

    /// Decoded datagrams sent by one side, including those the link dropped
    pub fn sent_by(&self, side: Side) -> Vec<Datagram> {
        self.link
            .lock()
            .trace
            .iter()
            .filter(|entry| entry.from == side)
            .filter_map(TraceEntry::datagram)
            .collect()
    }
}

/// One end of an in-memory datagram link
pub struct MemoryChannel {
    side: Side,
    tx: Sender<Bytes>,
    rx: Receiver<Bytes>,
    /// Datagram taken off the queue by a readiness check
    pending: Option<Bytes>,
    /// Datagram being reordered behind the next send
    held: Option<Bytes>,
    link: Arc<Mutex<Link>>,
}

/// Create a connected pair of channels sharing one fault model
pub fn pair(config: FaultConfig) -> (MemoryChannel, MemoryChannel) {
    let (to_responder, from_initiator) = unbounded();
    let (to_initiator, from_responder) = unbounded();
    let link = Arc::new(Mutex::new(Link::new(config)));

    let initiator = MemoryChannel {
        side: Side::Initiator,
        tx: to_responder,
        rx: from_responder,
        pending: None,
        held: None,
        link: Arc::clone(&link),
    };
    let responder = MemoryChannel {
        side: Side::Responder,
        tx: to_initiator,
        rx: from_initiator,
        pending: None,
        held: None,
        link,
    };
    (initiator, responder)
}

impl MemoryChannel {
    pub fn handle(&self) -> LinkHandle {
        LinkHandle {
            link: Arc::clone(&self.link),
        }
    }

    pub fn link_stats(&self) -> LinkStats {
        self.link.lock().stats.clone()
    }

    fn forward(&self, bytes: Bytes) {
        // A peer that has hung up is indistinguishable from loss
        let _ = self.tx.send(bytes);
    }

    fn closed() -> io::Error {
        io::Error::new(ErrorKind::BrokenPipe, "peer channel closed")
    }
}

impl DatagramChannel for MemoryChannel {
    fn send(&mut self, buf: &[u8]) -> io::Result<()> {
        let bytes = Bytes::copy_from_slice(buf);
        let fate = self.link.lock().decide(self.side, &bytes);

        match fate {
            Fate::Drop => {}
            Fate::Deliver { hold: true, .. } if self.held.is_none() => {
                self.held = Some(bytes);
            }
            Fate::Deliver { copies, .. } => {
                for _ in 0..copies {
                    self.forward(bytes.clone());
                }
                if let Some(held) = self.held.take() {
                    self.forward(held);
                }
            }
        }
        Ok(())
    }

    fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let bytes = match self.pending.take() {
            Some(bytes) => bytes,
            None => self.rx.recv().map_err(|_| Self::closed())?,
        };
        let n = bytes.len().min(buf.len());
        buf[..n].copy_from_slice(&bytes[..n]);
        Ok(n)
    }

    fn poll_ready(&mut self) -> io::Result<bool> {
        if self.pending.is_some() {
            return Ok(true);
        }
        match self.rx.try_recv() {
            Ok(bytes) => {
                self.pending = Some(bytes);
                Ok(true)
            }
            Err(TryRecvError::Empty) => Ok(false),
            Err(TryRecvError::Disconnected) => Err(Self::closed()),
        }
    }

    fn wait_ready(&mut self, timeout: Duration) -> io::Result<bool> {
        if self.pending.is_some() {
            return Ok(true);
        }
        match self.rx.recv_timeout(timeout) {
            Ok(bytes) => {
                self.pending = Some(bytes);
                Ok(true)
            }
            Err(RecvTimeoutError::Timeout) => Ok(false),
            Err(RecvTimeoutError::Disconnected) => Err(Self::closed()),
        }
    }
}
