//! Builder for [`Dispatcher`].

use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio_util::sync::CancellationToken;

use super::Dispatcher;
use crate::error::{Error, Result};
use crate::handler::CommandResponder;
use crate::mp::MessageProcessor;
use crate::target::{DEFAULT_RETRIES, DEFAULT_TIMEOUT};
use crate::transport::{MAX_UDP_PAYLOAD, Transport, UdpTransport};
use crate::v3::{DEFAULT_MSG_MAX_SIZE, EngineCache, LocalEngine, UserTable, UsmUser};

/// Enterprise number used for generated engine IDs (SNMP4J's, for
/// interoperability with receivers that filter on it).
const DEFAULT_ENTERPRISE: u32 = 4976;

/// Builder for [`Dispatcher`].
///
/// # Example
///
/// ```rust,no_run
/// use snmp_dispatch::Dispatcher;
/// use snmp_dispatch::v3::{AuthProtocol, PrivProtocol, UsmUser};
///
/// # async fn example() -> snmp_dispatch::Result<()> {
/// let dispatcher = Dispatcher::builder()
///     .bind("127.0.0.1:161")
///     .community(b"security")
///     .user(
///         UsmUser::builder("security")
///             .auth(AuthProtocol::Sha512, "password12#$")
///             .privacy(PrivProtocol::Aes256, "password12#$%")
///             .build(),
///     )
///     .engine_boots(0)
///     .build()
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct DispatcherBuilder {
    bind_addr: String,
    communities: Vec<Bytes>,
    users: Arc<UserTable>,
    engine_id: Option<Bytes>,
    enterprise: u32,
    engine_boots: u32,
    engine_cache: Option<Arc<EngineCache>>,
    recv_buffer_size: Option<usize>,
    max_message_size: usize,
    timeout: Duration,
    retries: u32,
    cancel: Option<CancellationToken>,
    responder: Option<Arc<dyn CommandResponder>>,
}

impl DispatcherBuilder {
    pub fn new() -> Self {
        Self {
            bind_addr: "0.0.0.0:162".into(),
            communities: Vec::new(),
            users: Arc::new(UserTable::new()),
            engine_id: None,
            enterprise: DEFAULT_ENTERPRISE,
            engine_boots: 0,
            engine_cache: None,
            recv_buffer_size: None,
            max_message_size: MAX_UDP_PAYLOAD,
            timeout: DEFAULT_TIMEOUT,
            retries: DEFAULT_RETRIES,
            cancel: None,
            responder: None,
        }
    }

    /// Local address to listen on (default `0.0.0.0:162`).
    pub fn bind(mut self, addr: impl Into<String>) -> Self {
        self.bind_addr = addr.into();
        self
    }

    /// Accept this community for v1/v2c messages.
    ///
    /// May be called more than once. With no community configured, every
    /// community is accepted.
    pub fn community(mut self, community: &[u8]) -> Self {
        self.communities.push(Bytes::copy_from_slice(community));
        self
    }

    /// Add a USM user.
    pub fn user(self, user: UsmUser) -> Self {
        self.users.add(user);
        self
    }

    /// Use an existing user table, shared with other dispatchers.
    ///
    /// Replaces any users added earlier with [`user`](Self::user).
    pub fn users(mut self, users: Arc<UserTable>) -> Self {
        self.users = users;
        self
    }

    /// Local snmpEngineID. Generated from [`enterprise`](Self::enterprise)
    /// and random bytes when not set.
    pub fn engine_id(mut self, engine_id: impl Into<Bytes>) -> Self {
        self.engine_id = Some(engine_id.into());
        self
    }

    /// Private enterprise number for the generated engine ID (default 4976).
    pub fn enterprise(mut self, enterprise: u32) -> Self {
        self.enterprise = enterprise;
        self
    }

    /// Local snmpEngineBoots (default 0).
    ///
    /// Persisting and incrementing this across restarts is the caller's job.
    pub fn engine_boots(mut self, boots: u32) -> Self {
        self.engine_boots = boots;
        self
    }

    /// Share discovered remote engines with other dispatchers.
    pub fn engine_cache(mut self, cache: Arc<EngineCache>) -> Self {
        self.engine_cache = Some(cache);
        self
    }

    /// Requested `SO_RCVBUF` for the UDP socket.
    pub fn recv_buffer_size(mut self, size: usize) -> Self {
        self.recv_buffer_size = Some(size);
        self
    }

    /// Largest datagram received or advertised as msgMaxSize (default 65507).
    pub fn max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = size.clamp(484, MAX_UDP_PAYLOAD);
        self
    }

    /// Timeout for targets created with [`Dispatcher::community_target`] and
    /// [`Dispatcher::user_target`] (default 2000 ms).
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Retries for targets created by the dispatcher (default 3).
    pub fn retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Token that stops [`Dispatcher::run`] when cancelled.
    pub fn cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Callback for inbound requests and notifications.
    pub fn responder(mut self, responder: impl CommandResponder) -> Self {
        self.responder = Some(Arc::new(responder));
        self
    }

    /// Bind the UDP socket and build the dispatcher.
    pub async fn build(self) -> Result<Dispatcher<UdpTransport>> {
        let addr = resolve_bind_addr(&self.bind_addr)?;
        let transport = UdpTransport::bind_with_buffer(addr, self.recv_buffer_size).await?;
        Ok(self.build_with_transport(transport))
    }

    /// Build the dispatcher over an already-open transport.
    ///
    /// The bind address and receive buffer size are ignored.
    pub fn build_with_transport<T: Transport>(self, transport: T) -> Dispatcher<T> {
        let engine_id = self
            .engine_id
            .unwrap_or_else(|| LocalEngine::generate_engine_id(self.enterprise));
        let msg_max_size = i32::try_from(self.max_message_size).unwrap_or(DEFAULT_MSG_MAX_SIZE);
        let local = LocalEngine::new(engine_id, self.engine_boots).with_msg_max_size(msg_max_size);
        let engines = self.engine_cache.unwrap_or_default();
        let mp = MessageProcessor::new(local, self.users, engines).with_communities(self.communities);

        tracing::debug!(
            target: "snmp_dispatch::dispatcher",
            {
                snmp.local_addr = %transport.local_addr(),
                snmp.engine_id = %crate::util::hex::encode(mp.local_engine().engine_id()),
                snmp.engine_boots = self.engine_boots,
                snmp.users = mp.users().len(),
            },
            "dispatcher configured"
        );

        Dispatcher::from_parts(super::Inner {
            transport,
            mp,
            responder: self.responder,
            pending: Default::default(),
            next_id: std::sync::atomic::AtomicI32::new(super::initial_id()),
            cancel: self.cancel.unwrap_or_default(),
            max_message_size: self.max_message_size,
            timeout: self.timeout,
            retries: self.retries,
        })
    }
}

impl Default for DispatcherBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn resolve_bind_addr(addr: &str) -> Result<SocketAddr> {
    addr.to_socket_addrs()
        .map_err(|e| Error::Io {
            target: None,
            source: e,
        })?
        .next()
        .ok_or_else(|| Error::config(format!("could not resolve bind address {addr}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_literal_addresses() {
        assert_eq!(
            resolve_bind_addr("127.0.0.1:161").unwrap(),
            "127.0.0.1:161".parse::<SocketAddr>().unwrap()
        );
        assert!(resolve_bind_addr("[::1]:0").unwrap().is_ipv6());
        assert!(resolve_bind_addr("not an address").is_err());
    }

    #[test]
    fn message_size_is_clamped() {
        let builder = DispatcherBuilder::new().max_message_size(100);
        assert_eq!(builder.max_message_size, 484);
        let builder = DispatcherBuilder::new().max_message_size(1 << 20);
        assert_eq!(builder.max_message_size, MAX_UDP_PAYLOAD);
    }

    #[tokio::test]
    async fn binds_ephemeral_port() {
        let dispatcher = DispatcherBuilder::new().bind("127.0.0.1:0").build().await.unwrap();
        assert_ne!(dispatcher.local_addr().port(), 0);
        assert_eq!(dispatcher.local_engine_id()[..4], [0x80, 0x00, 0x13, 0x70]);
    }
}
