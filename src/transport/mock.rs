//! In-memory transport for tests.

use super::Transport;
use crate::error::Result;
use bytes::Bytes;
use std::net::SocketAddr;
use tokio::sync::{Mutex, mpsc};

/// In-memory transport.
///
/// Datagrams injected through the paired [`MockPeer`] are returned from
/// [`recv_from`](Transport::recv_from); everything the dispatcher sends is
/// captured and can be read back from the peer.
#[derive(Debug)]
pub struct MockTransport {
    local_addr: SocketAddr,
    inbound: Mutex<mpsc::UnboundedReceiver<(Bytes, SocketAddr)>>,
    outbound: mpsc::UnboundedSender<(Bytes, SocketAddr)>,
}

/// Test side of a [`MockTransport`].
#[derive(Debug)]
pub struct MockPeer {
    inbound: mpsc::UnboundedSender<(Bytes, SocketAddr)>,
    outbound: mpsc::UnboundedReceiver<(Bytes, SocketAddr)>,
}

impl MockTransport {
    pub fn new(local_addr: SocketAddr) -> (Self, MockPeer) {
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        (
            Self {
                local_addr,
                inbound: Mutex::new(in_rx),
                outbound: out_tx,
            },
            MockPeer {
                inbound: in_tx,
                outbound: out_rx,
            },
        )
    }
}

impl MockPeer {
    /// Deliver a datagram to the transport as if it came from `source`.
    pub fn inject(&self, data: impl Into<Bytes>, source: SocketAddr) {
        let _ = self.inbound.send((data.into(), source));
    }

    /// Next datagram the transport sent, waiting for it.
    pub async fn next_sent(&mut self) -> Option<(Bytes, SocketAddr)> {
        self.outbound.recv().await
    }

    /// Next sent datagram if one is already queued.
    pub fn try_next_sent(&mut self) -> Option<(Bytes, SocketAddr)> {
        self.outbound.try_recv().ok()
    }
}

impl Transport for MockTransport {
    async fn recv_from(&self, buf: &mut [u8]) -> Result<(usize, SocketAddr)> {
        let next = self.inbound.lock().await.recv().await;
        match next {
            Some((data, source)) => {
                let len = data.len().min(buf.len());
                buf[..len].copy_from_slice(&data[..len]);
                Ok((len, source))
            }
            // Peer dropped: behave like an idle socket.
            None => std::future::pending().await,
        }
    }

    async fn send_to(&self, data: &[u8], target: SocketAddr) -> Result<()> {
        let _ = self.outbound.send((Bytes::copy_from_slice(data), target));
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
    async fn inject_and_capture() {
        let local: SocketAddr = "127.0.0.1:162".parse().unwrap();
        let remote: SocketAddr = "10.0.0.1:1024".parse().unwrap();
        let (transport, mut peer) = MockTransport::new(local);

        peer.inject(&b"abc"[..], remote);
        let mut buf = [0u8; 8];
        let (len, from) = transport.recv_from(&mut buf).await.unwrap();
        assert_eq!((&buf[..len], from), (&b"abc"[..], remote));

        transport.send_to(b"reply", remote).await.unwrap();
        let (data, to) = peer.next_sent().await.unwrap();
        assert_eq!((data.as_ref(), to), (&b"reply"[..], remote));
        assert!(peer.try_next_sent().is_none());
    }
}
