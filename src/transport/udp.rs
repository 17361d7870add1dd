//! UDP transport.

use super::Transport;
use crate::error::{Error, Result};
use crate::util::bind_udp_socket;
use std::net::SocketAddr;
use tokio::net::UdpSocket;

/// Unconnected UDP socket shared by the receive loop and senders.
///
/// IPv6 binds are dual-stack, so `[::]:162` also receives IPv4 traps.
#[derive(Debug)]
pub struct UdpTransport {
    socket: UdpSocket,
    local_addr: SocketAddr,
}

impl UdpTransport {
    /// Bind with default socket options.
    pub async fn bind(addr: SocketAddr) -> Result<Self> {
        Self::bind_with_buffer(addr, None).await
    }

    /// Bind, requesting a kernel receive buffer of `recv_buffer_size` bytes.
    pub async fn bind_with_buffer(addr: SocketAddr, recv_buffer_size: Option<usize>) -> Result<Self> {
        let socket = bind_udp_socket(addr, recv_buffer_size).map_err(|e| Error::Io {
            target: Some(addr),
            source: e,
        })?;
        let local_addr = socket.local_addr().map_err(|e| Error::Io {
            target: Some(addr),
            source: e,
        })?;
        tracing::debug!(
            target: "snmp_dispatch::transport",
            {
                snmp.local_addr = %local_addr,
            },
            "UDP transport bound"
        );
        Ok(Self { socket, local_addr })
    }
}

impl Transport for UdpTransport {
    async fn recv_from(&self, buf: &mut [u8]) -> Result<(usize, SocketAddr)> {
        self.socket
            .recv_from(buf)
            .await
            .map_err(|e| Error::Io { target: None, source: e })
    }

    async fn send_to(&self, data: &[u8], target: SocketAddr) -> Result<()> {
        tracing::trace!(
            target: "snmp_dispatch::transport",
            {
                snmp.target = %target,
                snmp.bytes = data.len(),
            },
            "UDP send"
        );
        self.socket
            .send_to(data, target)
            .await
            .map_err(|e| Error::Io {
                target: Some(target),
                source: e,
            })?;
        Ok(())
    }

    fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn loopback_send_and_receive() {
        let a = UdpTransport::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let b = UdpTransport::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        assert_ne!(a.local_addr().port(), 0);

        a.send_to(b"hello", b.local_addr()).await.unwrap();
        let mut buf = [0u8; 64];
        let (len, from) = b.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..len], b"hello");
        assert_eq!(from, a.local_addr());
    }

    #[tokio::test]
    async fn bind_conflict_reports_target() {
        let a = UdpTransport::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        // SO_REUSEADDR does not allow two UDP binds on Linux without
        // SO_REUSEPORT, so the second bind may or may not fail depending on
        // platform; only check the error shape when it does.
        if let Err(err) = UdpTransport::bind(a.local_addr()).await {
            assert_eq!(err.target(), Some(a.local_addr()));
        }
    }
}
