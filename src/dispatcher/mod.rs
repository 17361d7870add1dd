//! Message dispatcher (RFC 3412 section 4).
//!
//! One [`Dispatcher`] owns one transport and plays both roles:
//!
//! - Inbound: every datagram goes through the [`MessageProcessor`]. Responses
//!   and Reports complete the pending request they answer; everything else is
//!   handed to the [`CommandResponder`].
//! - Outbound: [`send_request`](Dispatcher::send_request) registers a pending
//!   entry keyed by request ID (v1/v2c) or msgID (v3), sends, and waits with
//!   per-attempt timeouts. [`send_trap`](Dispatcher::send_trap) is fire and
//!   forget.
//!
//! Responses are only delivered while [`run`](Dispatcher::run) is active, so
//! a dispatcher that sends requests must also be running.
//!
//! # Example
//!
//! ```rust,no_run
//! use snmp_dispatch::{Dispatcher, Pdu, oid};
//! use snmp_dispatch::message::SecurityLevel;
//! use snmp_dispatch::v3::{AuthProtocol, PrivProtocol, UsmUser};
//!
//! # async fn example() -> snmp_dispatch::Result<()> {
//! let dispatcher = Dispatcher::builder()
//!     .bind("0.0.0.0:0")
//!     .user(
//!         UsmUser::builder("security")
//!             .auth(AuthProtocol::Sha512, "password12#$")
//!             .privacy(PrivProtocol::Aes256, "password12#$%")
//!             .build(),
//!     )
//!     .build()
//!     .await?;
//!
//! let runner = dispatcher.clone();
//! tokio::spawn(async move { runner.run().await });
//!
//! let target = dispatcher.user_target("192.0.2.1:161".parse().unwrap(), "security", SecurityLevel::AuthPriv);
//! let response = dispatcher
//!     .send_request(target, Pdu::get_request(0, &[oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)]))
//!     .await?;
//! for vb in &response.varbinds {
//!     println!("{vb}");
//! }
//! dispatcher.shutdown();
//! # Ok(())
//! # }
//! ```

mod builder;

pub use builder::DispatcherBuilder;

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{EncodeErrorKind, Error, ErrorStatus, Result, UsmErrorKind};
use crate::handler::{CommandResponder, ResponderEvent, Response};
use crate::message::{SecurityLevel, SecurityModel, V3Message};
use crate::mp::{CounterSnapshot, IncomingMessage, MessageProcessor, Rejected};
use crate::pdu::{AnyPdu, Pdu, PduType};
use crate::target::{CommunityTarget, Target, UserTarget};
use crate::transport::{Transport, UdpTransport};
use crate::v3::{EngineCache, UserTable, report_kind};
use crate::version::Version;

/// SNMP message dispatcher.
///
/// Cheap to clone; clones share the transport, pending table and counters.
pub struct Dispatcher<T: Transport = UdpTransport> {
    inner: Arc<Inner<T>>,
}

impl<T: Transport> Clone for Dispatcher<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

pub(crate) struct Inner<T> {
    pub transport: T,
    pub mp: MessageProcessor,
    pub responder: Option<Arc<dyn CommandResponder>>,
    pub pending: Mutex<HashMap<i32, PendingRequest>>,
    pub next_id: AtomicI32,
    pub cancel: CancellationToken,
    pub max_message_size: usize,
    pub timeout: Duration,
    pub retries: u32,
}

pub(crate) struct PendingRequest {
    target: SocketAddr,
    expected: Expected,
    sender: oneshot::Sender<IncomingMessage>,
}

/// Security parameters an answer must carry to complete a request
/// (RFC 3412 7.2.12).
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Expected {
    version: Version,
    security_model: SecurityModel,
    security_level: SecurityLevel,
    security_name: Bytes,
}

impl Expected {
    fn for_target(target: &Target) -> Self {
        match target {
            Target::Community(t) => Self {
                version: t.version,
                security_model: match t.version {
                    Version::V1 => SecurityModel::V1,
                    _ => SecurityModel::V2c,
                },
                security_level: SecurityLevel::NoAuthNoPriv,
                security_name: t.community.clone(),
            },
            Target::User(t) => Self {
                version: Version::V3,
                security_model: SecurityModel::Usm,
                security_level: t.security_level,
                security_name: t.security_name.clone(),
            },
        }
    }

    /// An empty-user noAuth probe.
    fn discovery() -> Self {
        Self {
            version: Version::V3,
            security_model: SecurityModel::Usm,
            security_level: SecurityLevel::NoAuthNoPriv,
            security_name: Bytes::new(),
        }
    }

    /// Responses must match exactly. Reports may come back at a lower
    /// level, since the peer may not be able to authenticate them.
    fn accepts(&self, msg: &IncomingMessage) -> bool {
        if msg.version != self.version || msg.security_model != self.security_model {
            return false;
        }
        match msg.pdu_type() {
            PduType::Report => msg.security_level <= self.security_level,
            _ => msg.security_level == self.security_level && msg.security_name == self.security_name,
        }
    }
}

/// Removes the pending entry when the waiting request finishes or is dropped.
struct PendingGuard<'a> {
    pending: &'a Mutex<HashMap<i32, PendingRequest>>,
    id: i32,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.id);
    }
}

/// Time-seeded so a quick restart does not reuse the previous run's IDs.
pub(crate) fn initial_id() -> i32 {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as i32)
        .unwrap_or(1);
    (nanos & i32::MAX).max(1)
}

impl Dispatcher<UdpTransport> {
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::new()
    }
}

impl<T: Transport> Dispatcher<T> {
    pub(crate) fn from_parts(inner: Inner<T>) -> Self {
        Self {
            inner: Arc::new(inner),
        }
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.inner.transport.local_addr()
    }

    pub fn local_engine_id(&self) -> &Bytes {
        self.inner.mp.local_engine().engine_id()
    }

    pub fn engine_boots(&self) -> u32 {
        self.inner.mp.local_engine().engine_boots()
    }

    /// Seconds since this dispatcher was built.
    pub fn engine_time(&self) -> u32 {
        self.inner.mp.local_engine().engine_time()
    }

    pub fn users(&self) -> &Arc<UserTable> {
        self.inner.mp.users()
    }

    pub fn engines(&self) -> &Arc<EngineCache> {
        self.inner.mp.engines()
    }

    pub fn counters(&self) -> CounterSnapshot {
        self.inner.mp.counters().snapshot()
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.inner.cancel
    }

    /// Stop [`run`](Self::run) and fail outstanding requests with
    /// [`Error::Cancelled`].
    pub fn shutdown(&self) {
        self.inner.cancel.cancel();
    }

    /// Community target with this dispatcher's default timeout and retries.
    pub fn community_target(&self, address: SocketAddr, community: impl Into<Bytes>) -> CommunityTarget {
        CommunityTarget::new(address, community)
            .timeout(self.inner.timeout)
            .retries(self.inner.retries)
    }

    /// USM target with this dispatcher's default timeout and retries.
    pub fn user_target(
        &self,
        address: SocketAddr,
        security_name: impl Into<Bytes>,
        security_level: SecurityLevel,
    ) -> UserTarget {
        UserTarget::new(address, security_name, security_level)
            .timeout(self.inner.timeout)
            .retries(self.inner.retries)
    }

    /// Receive and dispatch datagrams until the cancellation token fires.
    ///
    /// Each datagram is processed on its own task. Processing errors are
    /// logged and counted; they never stop the loop.
    pub async fn run(&self) -> Result<()> {
        let mut buf = vec![0u8; self.inner.max_message_size];
        tracing::info!(
            target: "snmp_dispatch::dispatcher",
            {
                snmp.local_addr = %self.local_addr(),
            },
            "dispatcher listening"
        );

        loop {
            let received = tokio::select! {
                _ = self.inner.cancel.cancelled() => break,
                result = self.inner.transport.recv_from(&mut buf) => result,
            };
            let (len, source) = match received {
                Ok(r) => r,
                Err(e) => {
                    tracing::warn!(
                        target: "snmp_dispatch::dispatcher",
                        error = %e,
                        "receive failed"
                    );
                    continue;
                }
            };
            tracing::trace!(
                target: "snmp_dispatch::dispatcher",
                {
                    snmp.source = %source,
                    snmp.bytes = len,
                },
                "received datagram"
            );

            let data = Bytes::copy_from_slice(&buf[..len]);
            let this = self.clone();
            tokio::spawn(async move { this.handle_datagram(data, source).await });
        }

        // Dropping the senders wakes every waiter with Cancelled.
        let drained = {
            let mut pending = self.inner.pending.lock().unwrap_or_else(|e| e.into_inner());
            let count = pending.len();
            pending.clear();
            count
        };
        tracing::info!(
            target: "snmp_dispatch::dispatcher",
            {
                snmp.local_addr = %self.local_addr(),
                pending = drained,
            },
            "dispatcher stopped"
        );
        Ok(())
    }

    async fn handle_datagram(&self, data: Bytes, source: SocketAddr) {
        let msg = match self.inner.mp.prepare_data_elements(data, source) {
            Ok(msg) => msg,
            Err(Rejected { error, report }) => {
                tracing::debug!(
                    target: "snmp_dispatch::dispatcher",
                    {
                        snmp.source = %source,
                        error = %error,
                    },
                    "dropped inbound message"
                );
                if let Some(report) = report {
                    self.send_raw(&report, source).await;
                }
                return;
            }
        };

        match msg.pdu_type() {
            PduType::Response | PduType::Report => self.complete_pending(msg),
            PduType::InformRequest => {
                if let Some(pdu) = msg.pdu.as_pdu() {
                    self.reply(&msg, pdu.to_response()).await;
                }
                self.notify(&msg).await;
            }
            PduType::TrapV1 | PduType::TrapV2 => self.notify(&msg).await,
            PduType::GetRequest | PduType::GetNextRequest | PduType::GetBulkRequest | PduType::SetRequest => {
                self.respond(&msg).await
            }
        }
    }

    fn complete_pending(&self, msg: IncomingMessage) {
        let id = msg.correlation_id();
        let entry = {
            let mut pending = self.inner.pending.lock().unwrap_or_else(|e| e.into_inner());
            match pending.remove(&id) {
                // Leave the request waiting for the real answer.
                Some(p) if !p.expected.accepts(&msg) => {
                    let expected = p.expected.clone();
                    pending.insert(id, p);
                    Err(expected)
                }
                other => Ok(other),
            }
        };
        match entry {
            Err(expected) => {
                self.inner.mp.counters().invalid_msg();
                tracing::debug!(
                    target: "snmp_dispatch::dispatcher",
                    {
                        snmp.request_id = id,
                        snmp.source = %msg.source,
                        snmp.version = %msg.version,
                        snmp.security_level = ?msg.security_level,
                        expected.version = %expected.version,
                        expected.security_level = ?expected.security_level,
                    },
                    "response does not match request security"
                );
            }
            Ok(Some(pending)) => {
                if pending.target != msg.source {
                    tracing::warn!(
                        target: "snmp_dispatch::dispatcher",
                        {
                            snmp.request_id = id,
                            snmp.target = %pending.target,
                            snmp.source = %msg.source,
                        },
                        "response source address mismatch"
                    );
                }
                // Receiver may have timed out in the meantime.
                let _ = pending.sender.send(msg);
            }
            Ok(None) => {
                self.inner.mp.counters().unknown_pdu_handler();
                tracing::debug!(
                    target: "snmp_dispatch::dispatcher",
                    {
                        snmp.request_id = id,
                        snmp.source = %msg.source,
                    },
                    "response for unknown request"
                );
            }
        }
    }

    /// Deliver a notification to the responder. Its return value is ignored.
    async fn notify(&self, msg: &IncomingMessage) {
        let Some(responder) = &self.inner.responder else {
            self.inner.mp.counters().unknown_pdu_handler();
            tracing::debug!(
                target: "snmp_dispatch::dispatcher",
                {
                    snmp.source = %msg.source,
                    snmp.pdu_type = %msg.pdu_type(),
                },
                "no responder for notification"
            );
            return;
        };
        let event = ResponderEvent::from_message(msg);
        if responder.process_pdu(&event).await != Response::None {
            tracing::trace!(
                target: "snmp_dispatch::dispatcher",
                {
                    snmp.source = %msg.source,
                },
                "ignoring response to notification"
            );
        }
    }

    async fn respond(&self, msg: &IncomingMessage) {
        let Some(responder) = &self.inner.responder else {
            self.inner.mp.counters().unknown_pdu_handler();
            tracing::debug!(
                target: "snmp_dispatch::dispatcher",
                {
                    snmp.source = %msg.source,
                    snmp.pdu_type = %msg.pdu_type(),
                },
                "no responder for request"
            );
            return;
        };
        let Some(request) = msg.pdu.as_pdu() else {
            return;
        };
        let event = ResponderEvent::from_message(msg);
        let pdu = match responder.process_pdu(&event).await {
            Response::None => return,
            Response::VarBinds(varbinds) => Pdu::new(PduType::Response, request.request_id, varbinds),
            Response::Error { status, index } => request.to_error_response(status, index),
        };
        self.reply(msg, pdu).await;
    }

    /// Send a Response, falling back to an empty tooBig if it does not fit.
    async fn reply(&self, request: &IncomingMessage, pdu: Pdu) {
        let request_id = pdu.request_id;
        let data = match self.inner.mp.prepare_response_message(request, pdu) {
            Ok(data) => data,
            Err(Error::MessageTooLarge { size, max }) => {
                tracing::debug!(
                    target: "snmp_dispatch::dispatcher",
                    {
                        snmp.source = %request.source,
                        snmp.request_id = request_id,
                        size,
                        max,
                    },
                    "response too large, sending tooBig"
                );
                let mut too_big = Pdu::new(PduType::Response, request_id, Vec::new());
                too_big.error_status = ErrorStatus::TooBig.as_i32();
                match self.inner.mp.prepare_response_message(request, too_big) {
                    Ok(data) => data,
                    Err(e) => {
                        self.inner.mp.counters().silent_drop();
                        tracing::debug!(
                            target: "snmp_dispatch::dispatcher",
                            {
                                snmp.source = %request.source,
                                error = %e,
                            },
                            "tooBig does not fit either, dropping"
                        );
                        return;
                    }
                }
            }
            Err(e) => {
                tracing::warn!(
                    target: "snmp_dispatch::dispatcher",
                    {
                        snmp.source = %request.source,
                        snmp.request_id = request_id,
                        error = %e,
                    },
                    "could not encode response"
                );
                return;
            }
        };
        self.send_raw(&data, request.source).await;
    }

    async fn send_raw(&self, data: &[u8], target: SocketAddr) {
        if let Err(e) = self.inner.transport.send_to(data, target).await {
            tracing::warn!(
                target: "snmp_dispatch::dispatcher",
                {
                    snmp.target = %target,
                    error = %e,
                },
                "send failed"
            );
        }
    }

    /// Send a confirmed PDU and wait for its Response.
    ///
    /// The PDU's request ID is replaced with a fresh one. For USM targets the
    /// remote engine is discovered first if unknown; a `notInTimeWindows`
    /// report triggers one resend with the resynchronized clock and an
    /// `unknownEngineIDs` report triggers one rediscovery.
    ///
    /// Error-status in the returned PDU is left for the caller to inspect.
    pub async fn send_request(&self, target: impl Into<Target>, pdu: Pdu) -> Result<Pdu> {
        let target = target.into();
        if !pdu.pdu_type.is_confirmed() {
            return Err(Error::encode(EncodeErrorKind::PduNotAllowed));
        }
        match &target {
            Target::Community(_) => into_pdu(self.exchange(&target, pdu).await?),
            Target::User(_) => self.send_usm_request(&target, pdu).await,
        }
    }

    async fn send_usm_request(&self, target: &Target, pdu: Pdu) -> Result<Pdu> {
        let address = target.address();
        if self.engines().get_by_addr(address).is_none() {
            self.discover(target).await?;
        }

        let mut resynced = false;
        let mut rediscovered = false;
        loop {
            let response = self.exchange(target, pdu.clone()).await?;
            if response.pdu_type() != PduType::Report {
                return into_pdu(response);
            }
            let Some(kind) = response.pdu.as_pdu().and_then(report_kind) else {
                // Not a usmStats report; let the caller look at it.
                return into_pdu(response);
            };
            tracing::debug!(
                target: "snmp_dispatch::dispatcher",
                {
                    snmp.target = %address,
                    snmp.usm_error = %kind,
                },
                "request answered with report"
            );
            match kind {
                UsmErrorKind::NotInTimeWindow if !resynced => resynced = true,
                UsmErrorKind::UnknownEngineId if !rediscovered => {
                    rediscovered = true;
                    self.engines().forget_addr(address);
                    self.discover(target).await?;
                }
                kind => return Err(Error::usm(Some(address), kind)),
            }
        }
    }

    /// Learn the remote authoritative engine with an empty-engine-ID probe
    /// (RFC 3414 section 4). Only the Report answering the probe binds an
    /// engine to the target address.
    async fn discover(&self, target: &Target) -> Result<()> {
        let address = target.address();
        let (id, rx) = self.register(address, Expected::discovery());
        let _guard = PendingGuard {
            pending: &self.inner.pending,
            id,
        };
        let probe = V3Message::discovery_request(id, id, self.inner.mp.local_engine().msg_max_size()).encode();
        tracing::debug!(
            target: "snmp_dispatch::dispatcher",
            {
                snmp.target = %address,
                snmp.msg_id = id,
            },
            "discovering engine"
        );

        let report = self
            .await_response(address, id, &probe, rx, target.timeout(), target.retries())
            .await?;

        let discovered = match report.pdu_type() {
            PduType::Report => report.authoritative_engine(),
            _ => None,
        };
        match discovered {
            Some(state) => {
                self.engines().learn(address, state.clone());
                tracing::debug!(
                    target: "snmp_dispatch::dispatcher",
                    {
                        snmp.target = %address,
                        snmp.engine_id = %crate::util::hex::encode(&state.engine_id),
                        snmp.engine_boots = state.engine_boots,
                    },
                    "engine discovered"
                );
                Ok(())
            }
            None => Err(Error::usm(Some(address), UsmErrorKind::UnknownEngineId)),
        }
    }

    /// One request with retransmissions. The pending entry lives until the
    /// call returns.
    async fn exchange(&self, target: &Target, mut pdu: Pdu) -> Result<IncomingMessage> {
        let address = target.address();
        let (id, rx) = self.register(address, Expected::for_target(target));
        let _guard = PendingGuard {
            pending: &self.inner.pending,
            id,
        };
        pdu.request_id = id;
        let data = self
            .inner
            .mp
            .prepare_outgoing_message(target, pdu.into(), id)
            .map_err(|e| e.with_target(address))?;
        self.await_response(address, id, &data, rx, target.timeout(), target.retries())
            .await
    }

    async fn await_response(
        &self,
        address: SocketAddr,
        id: i32,
        data: &[u8],
        mut rx: oneshot::Receiver<IncomingMessage>,
        timeout: Duration,
        retries: u32,
    ) -> Result<IncomingMessage> {
        let start = Instant::now();
        for attempt in 0..=retries {
            if attempt > 0 {
                tracing::debug!(
                    target: "snmp_dispatch::dispatcher",
                    {
                        snmp.target = %address,
                        snmp.request_id = id,
                        attempt,
                    },
                    "retransmitting"
                );
            }
            self.inner.transport.send_to(data, address).await?;

            tokio::select! {
                _ = self.inner.cancel.cancelled() => return Err(Error::Cancelled),
                result = tokio::time::timeout(timeout, &mut rx) => match result {
                    Ok(Ok(msg)) => return Ok(msg),
                    // Sender dropped: the receive loop shut down.
                    Ok(Err(_)) => return Err(Error::Cancelled),
                    Err(_) => {}
                },
            }
        }

        let elapsed = start.elapsed();
        tracing::debug!(
            target: "snmp_dispatch::dispatcher",
            {
                snmp.target = %address,
                snmp.request_id = id,
                ?elapsed,
                retries,
            },
            "request timed out"
        );
        Err(Error::Timeout {
            target: Some(address),
            elapsed,
            request_id: id,
            retries,
        })
    }

    /// Send an unconfirmed notification (TrapV1 or TrapV2).
    ///
    /// SNMPv2 trap request IDs are assigned from the dispatcher's counter.
    pub async fn send_trap(&self, target: impl Into<Target>, pdu: impl Into<AnyPdu>) -> Result<()> {
        let target = target.into();
        let mut pdu = pdu.into();
        if pdu.pdu_type().is_confirmed() || pdu.pdu_type().is_response() {
            return Err(Error::encode(EncodeErrorKind::PduNotAllowed));
        }
        let id = self.alloc_id(&self.inner.pending.lock().unwrap_or_else(|e| e.into_inner()));
        if let AnyPdu::Generic(p) = &mut pdu {
            p.request_id = id;
        }
        let data = self
            .inner
            .mp
            .prepare_outgoing_message(&target, pdu, id)
            .map_err(|e| e.with_target(target.address()))?;
        tracing::debug!(
            target: "snmp_dispatch::dispatcher",
            {
                snmp.target = %target.address(),
                snmp.request_id = id,
            },
            "sending notification"
        );
        self.inner.transport.send_to(&data, target.address()).await
    }

    fn register(&self, target: SocketAddr, expected: Expected) -> (i32, oneshot::Receiver<IncomingMessage>) {
        let (sender, rx) = oneshot::channel();
        let mut pending = self.inner.pending.lock().unwrap_or_else(|e| e.into_inner());
        let id = self.alloc_id(&pending);
        pending.insert(
            id,
            PendingRequest {
                target,
                expected,
                sender,
            },
        );
        (id, rx)
    }

    /// Next positive ID not currently pending.
    fn alloc_id(&self, pending: &HashMap<i32, PendingRequest>) -> i32 {
        loop {
            let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed) & i32::MAX;
            if id != 0 && !pending.contains_key(&id) {
                return id;
            }
        }
    }
}

fn into_pdu(msg: IncomingMessage) -> Result<Pdu> {
    match msg.pdu {
        AnyPdu::Generic(pdu) => Ok(pdu),
        AnyPdu::TrapV1(_) => Err(Error::encode(EncodeErrorKind::PduNotAllowed)),
    }
}

impl<T: Transport> std::fmt::Debug for Dispatcher<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("local_addr", &self.local_addr())
            .field("engine_id", &crate::util::hex::encode(self.local_engine_id()))
            .field("responder", &self.inner.responder.is_some())
            .finish_non_exhaustive()
    }
}
