//! Datagram channel abstraction
//!
//! The engines only need four things from the transport: send a datagram to
//! the peer, block for the next datagram, check whether one is ready without
//! blocking, and wait for one up to a deadline. [`DatagramChannel`] captures
//! that; `arq-io` provides the UDP and in-memory implementations.

use std::io;
use std::time::Duration;

/// Unreliable, unordered, message-oriented channel to a single peer
pub trait DatagramChannel {
    /// Send one datagram to the peer
    ///
    /// Delivery is not guaranteed; a successful return only means the
    /// datagram was handed to the transport.
    fn send(&mut self, buf: &[u8]) -> io::Result<()>;

    /// Block until a datagram arrives and copy it into `buf`
    ///
    /// Returns the datagram length. Datagrams longer than `buf` are truncated.
    fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Check whether a datagram is ready, without blocking
    fn poll_ready(&mut self) -> io::Result<bool>;

    /// Wait up to `timeout` for a datagram to become ready
    ///
    /// Returns `false` if the timeout elapsed first.
    fn wait_ready(&mut self, timeout: Duration) -> io::Result<bool>;
}

impl<C: DatagramChannel + ?Sized> DatagramChannel for &mut C {
    fn send(&mut self, buf: &[u8]) -> io::Result<()> {
        (**self).send(buf)
    }

    fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        (**self).recv(buf)
    }

    fn poll_ready(&mut self) -> io::Result<bool> {
        (**self).poll_ready()
    }

    fn wait_ready(&mut self, timeout: Duration) -> io::Result<bool> {
        (**self).wait_ready(timeout)
    }
}

/// Block until a datagram is ready, honouring an optional idle limit
pub(crate) fn await_datagram<C: DatagramChannel + ?Sized>(
    channel: &mut C,
    idle_timeout: Option<Duration>,
) -> Result<(), crate::ArqError> {
    match idle_timeout {
        Some(limit) if !channel.wait_ready(limit)? => Err(crate::ArqError::IdleTimeout(limit)),
        _ => Ok(()),
    }
}
