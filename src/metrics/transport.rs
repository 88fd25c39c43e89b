use std::io;
use std::net::{SocketAddr, UdpSocket};

use crate::error::ConfigError;

/// Anything that can take one datagram.
///
/// Returns how many bytes were accepted; the buffer treats anything short of
/// the full payload as a failed flush.
pub trait Transport: Send {
    fn send(&self, payload: &[u8]) -> io::Result<usize>;

    /// Human readable destination for log lines.
    fn destination(&self) -> String;
}

/// Unconnected, non-blocking UDP socket aimed at one collector.
#[derive(Debug)]
pub struct UdpTransport {
    socket: UdpSocket,
    target: SocketAddr,
}

impl UdpTransport {
    pub fn open(target: SocketAddr) -> Result<Self, ConfigError> {
        // Bind to any available port on the matching family
        let local = if target.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
        let socket = UdpSocket::bind(local).map_err(ConfigError::Socket)?;

        // A full socket buffer drops the datagram instead of stalling the caller
        socket.set_nonblocking(true).map_err(ConfigError::Socket)?;

        Ok(Self { socket, target })
    }

    pub fn target(&self) -> SocketAddr {
        self.target
    }
}

impl Transport for UdpTransport {
    fn send(&self, payload: &[u8]) -> io::Result<usize> {
        self.socket.send_to(payload, self.target)
    }

    fn destination(&self) -> String {
        self.target.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn sends_one_datagram_to_target() {
        let collector = UdpSocket::bind("127.0.0.1:0").unwrap();
        collector
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();

        let transport = UdpTransport::open(collector.local_addr().unwrap()).unwrap();
        assert_eq!(transport.send(b"a:1|c").unwrap(), 5);

        let mut buf = [0u8; 64];
        let n = collector.recv(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"a:1|c");
        assert_eq!(transport.destination(), collector.local_addr().unwrap().to_string());
    }
}
