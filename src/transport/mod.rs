//! Transport layer abstraction.
//!
//! The dispatcher both listens (traps, informs, requests) and sends
//! (responses, reports, its own requests) on one endpoint, so a transport
//! is an unconnected datagram socket.

mod udp;

#[cfg(any(test, feature = "testing"))]
mod mock;

pub use udp::*;

#[cfg(any(test, feature = "testing"))]
pub use mock::*;

use crate::error::Result;
use std::future::Future;
use std::net::SocketAddr;

/// Maximum payload of a UDP datagram over IPv4.
pub const MAX_UDP_PAYLOAD: usize = 65507;

/// Datagram endpoint used by the [`Dispatcher`](crate::Dispatcher).
///
/// Implementations must be usable from many tasks at once: the receive
/// loop calls [`recv_from`](Self::recv_from) while request tasks call
/// [`send_to`](Self::send_to).
pub trait Transport: Send + Sync + 'static {
    /// Receive one datagram into `buf`.
    fn recv_from(&self, buf: &mut [u8])
    -> impl Future<Output = Result<(usize, SocketAddr)>> + Send;

    /// Send one datagram to `target`.
    fn send_to(&self, data: &[u8], target: SocketAddr) -> impl Future<Output = Result<()>> + Send;

    /// Local bind address.
    fn local_addr(&self) -> SocketAddr;
}
