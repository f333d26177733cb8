//! UDP channel
//!
//! [`UdpChannel`] is a [`DatagramChannel`] over a single UDP socket. The
//! initiator names its peer with [`UdpChannel::set_dest_address`]; the
//! responder has no destination and replies to whoever sent the last
//! datagram it received.

use arq_protocol::packet::RECV_BUFFER_SIZE;
use arq_protocol::DatagramChannel;
use socket2::{Domain, Protocol, SockRef, Socket, Type};
use std::io::{self, ErrorKind};
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Socket configuration errors
#[derive(Error, Debug)]
pub enum SocketError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Cannot find the destination IP name: {0}")]
    Unresolved(String),
}

/// Datagram channel over UDP
pub struct UdpChannel {
    inner: UdpSocket,
    /// Configured destination (initiator)
    dest: Option<SocketAddr>,
    /// Source of the most recent datagram (responder replies go here)
    peer: Option<SocketAddr>,
}

impl UdpChannel {
    /// Create a channel bound to the given local address
    pub fn bind(addr: SocketAddr) -> Result<Self, SocketError> {
        let domain = if addr.is_ipv4() {
            Domain::IPV4
        } else {
            Domain::IPV6
        };

        let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_reuse_address(true)?;
        socket.bind(&addr.into())?;

        let inner: UdpSocket = socket.into();
        tracing::debug!("UDP channel bound to {}", inner.local_addr()?);

        Ok(UdpChannel {
            inner,
            dest: None,
            peer: None,
        })
    }

    /// Resolve `host` and send all future datagrams to it on `port`
    ///
    /// Prefers an address of the same family as the local socket.
    pub fn set_dest_address(&mut self, host: &str, port: u16) -> Result<SocketAddr, SocketError> {
        let local_v4 = self.local_addr()?.is_ipv4();
        let candidates: Vec<SocketAddr> = (host, port)
            .to_socket_addrs()
            .map_err(|_| SocketError::Unresolved(host.to_string()))?
            .collect();

        let dest = candidates
            .iter()
            .find(|a| a.is_ipv4() == local_v4)
            .or_else(|| candidates.first())
            .copied()
            .ok_or_else(|| SocketError::Unresolved(host.to_string()))?;

        tracing::debug!("Destination {} resolved to {}", host, dest);
        self.dest = Some(dest);
        Ok(dest)
    }

    /// Set the send buffer size
    pub fn set_send_buffer_size(&self, size: usize) -> Result<(), SocketError> {
        SockRef::from(&self.inner).set_send_buffer_size(size)?;
        Ok(())
    }

    /// Set the receive buffer size
    pub fn set_recv_buffer_size(&self, size: usize) -> Result<(), SocketError> {
        SockRef::from(&self.inner).set_recv_buffer_size(size)?;
        Ok(())
    }

    /// Get the local address this channel is bound to
    pub fn local_addr(&self) -> Result<SocketAddr, SocketError> {
        Ok(self.inner.local_addr()?)
    }

    /// Where the next datagram will be sent
    pub fn target(&self) -> Option<SocketAddr> {
        self.dest.or(self.peer)
    }

    /// Peek without consuming
    fn peek(&self) -> io::Result<Peek> {
        let mut probe = [0u8; RECV_BUFFER_SIZE];
        match self.inner.peek_from(&mut probe) {
            Ok(_) => Ok(Peek::Ready),
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => Ok(Peek::Empty),
            Err(e) if matches!(e.kind(), ErrorKind::ConnectionReset | ErrorKind::ConnectionRefused) => {
                tracing::debug!("Ignoring transient socket error: {}", e);
                Ok(Peek::Interrupted)
            }
            Err(e) => Err(e),
        }
    }
}

/// Outcome of a single peek
enum Peek {
    Ready,
    Empty,
    /// An ICMP error was reported in place of a datagram
    Interrupted,
}

impl DatagramChannel for UdpChannel {
    fn send(&mut self, buf: &[u8]) -> io::Result<()> {
        let target = self
            .target()
            .ok_or_else(|| io::Error::new(ErrorKind::NotConnected, "no destination or peer yet"))?;
        self.inner.send_to(buf, target)?;
        Ok(())
    }

    fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.set_read_timeout(None)?;
        let (n, from) = self.inner.recv_from(buf)?;
        if self.dest.is_none() {
            self.peer = Some(from);
        }
        Ok(n)
    }

    fn poll_ready(&mut self) -> io::Result<bool> {
        self.inner.set_nonblocking(true)?;
        let peeked = self.peek();
        self.inner.set_nonblocking(false)?;
        Ok(matches!(peeked?, Peek::Ready))
    }

    fn wait_ready(&mut self, timeout: Duration) -> io::Result<bool> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return self.poll_ready();
            }
            self.inner.set_read_timeout(Some(remaining))?;
            match self.peek()? {
                Peek::Ready => return Ok(true),
                Peek::Empty => return Ok(false),
                // An ICMP error is not a datagram; keep waiting out the deadline
                Peek::Interrupted => continue,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loopback() -> UdpChannel {
        UdpChannel::bind("127.0.0.1:0".parse().unwrap()).unwrap()
    }

    #[test]
    fn test_channel_creation() {
        let channel = loopback();
        let addr = channel.local_addr().unwrap();
        assert!(addr.port() > 0);
        assert_eq!(channel.target(), None);
    }

    #[test]
    fn test_buffer_sizes() {
        let channel = loopback();
        channel.set_send_buffer_size(262144).unwrap();
        channel.set_recv_buffer_size(262144).unwrap();
    }

    #[test]
    fn test_send_without_destination_fails() {
        let mut channel = loopback();
        let err = channel.send(b"x").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotConnected);
    }

    #[test]
    fn test_unresolvable_destination() {
        let mut channel = loopback();
        let err = channel
            .set_dest_address("no-such-host.invalid", 9)
            .unwrap_err();
        assert!(matches!(err, SocketError::Unresolved(_)));
    }

    #[test]
    fn test_send_and_reply_to_peer() {
        let mut responder = loopback();
        let mut initiator = loopback();
        let port = responder.local_addr().unwrap().port();
        initiator.set_dest_address("127.0.0.1", port).unwrap();

        initiator.send(b"Hello, ARQ!").unwrap();

        assert!(responder.wait_ready(Duration::from_secs(1)).unwrap());
        let mut buf = [0u8; 64];
        let n = responder.recv(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"Hello, ARQ!");

        // The responder learned the initiator's address from the datagram
        assert_eq!(responder.target(), Some(initiator.local_addr().unwrap()));
        responder.send(b"ack").unwrap();

        assert!(initiator.wait_ready(Duration::from_secs(1)).unwrap());
        let n = initiator.recv(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"ack");
    }

    #[test]
    fn test_wait_ignores_unreachable_peer() {
        // Nothing listens on the closed port, so the host may answer with an
        // ICMP port unreachable
        let closed = loopback();
        let port = closed.local_addr().unwrap().port();
        drop(closed);

        let mut channel = loopback();
        channel.set_dest_address("127.0.0.1", port).unwrap();
        channel.send(b"anyone there?").unwrap();

        let start = Instant::now();
        assert!(!channel.wait_ready(Duration::from_millis(30)).unwrap());
        assert!(start.elapsed() >= Duration::from_millis(25));
    }

    #[test]
    fn test_poll_and_wait_when_idle() {
        let mut channel = loopback();
        assert!(!channel.poll_ready().unwrap());

        let start = Instant::now();
        assert!(!channel.wait_ready(Duration::from_millis(20)).unwrap());
        assert!(start.elapsed() >= Duration::from_millis(15));
    }
}
