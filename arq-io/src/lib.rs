//! ARQ I/O
//!
//! Concrete [`arq_protocol::DatagramChannel`] implementations: a UDP socket
//! wrapper for real transfers and a fault-injecting in-memory pair for
//! deterministic tests.

pub mod memory;
pub mod socket;

pub use memory::{pair, FaultConfig, LinkHandle, LinkStats, MemoryChannel, ScriptedDrop, Side, TraceEntry};
pub use socket::{SocketError, UdpChannel};
