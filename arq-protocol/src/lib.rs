//! ARQ Protocol Core Implementation
//!
//! This crate implements reliable, in-order delivery over an unreliable
//! datagram channel with three escalating strategies: best-effort transfer,
//! stop-and-wait ARQ, and sliding-window ARQ with cumulative acknowledgment
//! and an early-retransmit receiver policy. Transport I/O is abstracted
//! behind [`DatagramChannel`].

pub mod channel;
pub mod config;
pub mod error;
pub mod linger;
pub mod packet;
pub mod received;
pub mod sequence;
pub mod sliding_window;
pub mod stats;
pub mod stop_wait;
pub mod timer;
pub mod unreliable;
pub mod window;

#[cfg(test)]
mod testing;

pub use channel::DatagramChannel;
pub use config::{AckPolicy, EngineConfig, LingerConfig};
pub use error::ArqError;
pub use linger::{answer_stragglers, linger};
pub use packet::{Ack, Datagram, PacketError, Segment};
pub use received::{Insert, ReceivedSet};
pub use sequence::SeqNumber;
pub use sliding_window::{Admission, SlidingWindowReceiver, SlidingWindowSender};
pub use stats::{ReceiverStats, SenderStats};
pub use stop_wait::{StopWaitReceiver, StopWaitSender};
pub use timer::RetransmitTimer;
pub use unreliable::{UnreliableReceiver, UnreliableSender};
pub use window::{OutstandingWindow, WindowError};
