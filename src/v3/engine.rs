//! SNMP engine identity and time keeping (RFC 3414 sections 2.2, 2.3, 3.2.7, 4).
//!
//! [`LocalEngine`] is this process when it is authoritative (it receives
//! confirmed requests). [`EngineCache`] holds what we have learned about
//! remote authoritative engines, keyed by engine ID, plus a map from
//! transport address to engine ID for outbound requests.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::RwLock;
use std::time::Instant;

use bytes::Bytes;

use super::usm::UsmSecurityParams;
use crate::error::{DecodeErrorKind, Error, Result, UsmErrorKind};
use crate::pdu::{Pdu, PduType};
use crate::value::Value;
use crate::varbind::VarBind;

/// Allowed clock skew in seconds (RFC 3414 2.2.3).
pub const TIME_WINDOW: u32 = 150;

/// Upper bound of snmpEngineBoots and snmpEngineTime.
pub const MAX_ENGINE_TIME: u32 = 2_147_483_647;

/// Largest UDP payload over IPv4.
pub const DEFAULT_MSG_MAX_SIZE: i32 = 65507;

/// usmStats counters reported back in Report PDUs.
pub mod report_oids {
    use crate::error::UsmErrorKind;
    use crate::oid::Oid;

    pub fn unsupported_sec_levels() -> Oid {
        crate::oid!(1, 3, 6, 1, 6, 3, 15, 1, 1, 1, 0)
    }

    pub fn not_in_time_windows() -> Oid {
        crate::oid!(1, 3, 6, 1, 6, 3, 15, 1, 1, 2, 0)
    }

    pub fn unknown_user_names() -> Oid {
        crate::oid!(1, 3, 6, 1, 6, 3, 15, 1, 1, 3, 0)
    }

    pub fn unknown_engine_ids() -> Oid {
        crate::oid!(1, 3, 6, 1, 6, 3, 15, 1, 1, 4, 0)
    }

    pub fn wrong_digests() -> Oid {
        crate::oid!(1, 3, 6, 1, 6, 3, 15, 1, 1, 5, 0)
    }

    pub fn decryption_errors() -> Oid {
        crate::oid!(1, 3, 6, 1, 6, 3, 15, 1, 1, 6, 0)
    }

    pub fn for_kind(kind: UsmErrorKind) -> Oid {
        match kind {
            UsmErrorKind::UnsupportedSecurityLevel => unsupported_sec_levels(),
            UsmErrorKind::NotInTimeWindow => not_in_time_windows(),
            UsmErrorKind::UnknownUserName => unknown_user_names(),
            UsmErrorKind::UnknownEngineId => unknown_engine_ids(),
            UsmErrorKind::WrongDigest => wrong_digests(),
            UsmErrorKind::DecryptionError => decryption_errors(),
        }
    }
}

/// Classify a Report PDU by the usmStats counter in its first varbind.
pub fn report_kind(pdu: &Pdu) -> Option<UsmErrorKind> {
    let oid = &pdu.varbinds.first()?.oid;
    [
        UsmErrorKind::UnsupportedSecurityLevel,
        UsmErrorKind::NotInTimeWindow,
        UsmErrorKind::UnknownUserName,
        UsmErrorKind::UnknownEngineId,
        UsmErrorKind::WrongDigest,
        UsmErrorKind::DecryptionError,
    ]
    .into_iter()
    .find(|kind| {
        let counter = report_oids::for_kind(*kind);
        // Some agents omit the trailing .0 instance.
        oid == &counter || counter.parent().is_some_and(|p| *oid == p)
    })
}

/// Cached view of a remote authoritative engine.
#[derive(Debug, Clone)]
pub struct EngineState {
    pub engine_id: Bytes,
    pub engine_boots: u32,
    pub engine_time: u32,
    /// When `engine_time` was learned.
    pub synced_at: Instant,
    /// Highest time seen for the current boots (RFC 3414 latestReceivedEngineTime).
    pub latest_received_time: u32,
    pub msg_max_size: i32,
}

impl EngineState {
    pub fn new(engine_id: impl Into<Bytes>, engine_boots: u32, engine_time: u32) -> Self {
        Self {
            engine_id: engine_id.into(),
            engine_boots,
            engine_time,
            synced_at: Instant::now(),
            latest_received_time: engine_time,
            msg_max_size: DEFAULT_MSG_MAX_SIZE,
        }
    }

    /// Engine identity carried in a message's security parameters, as
    /// learned from a discovery Report or an unsolicited notification.
    pub fn from_params(params: &UsmSecurityParams) -> Result<Self> {
        if params.engine_id.is_empty() {
            return Err(Error::decode(0, DecodeErrorKind::EmptyEngineId));
        }
        Ok(Self::new(
            params.engine_id.clone(),
            params.engine_boots,
            params.engine_time,
        ))
    }

    /// Current time of the remote engine, extrapolated from the last sync.
    pub fn estimated_time(&self) -> u32 {
        let elapsed = self.synced_at.elapsed().as_secs();
        (self.engine_time as u64 + elapsed).min(MAX_ENGINE_TIME as u64) as u32
    }

    /// Apply RFC 3414 3.2.7b: adopt a newer boots, or a later time for the
    /// same boots. Returns true when the cache changed.
    pub fn update_time(&mut self, boots: u32, time: u32) -> bool {
        if boots > self.engine_boots || (boots == self.engine_boots && time > self.latest_received_time) {
            self.engine_boots = boots;
            self.engine_time = time;
            self.latest_received_time = time;
            self.synced_at = Instant::now();
            true
        } else {
            false
        }
    }

    /// Timeliness check for messages from this (remote, authoritative)
    /// engine, as seen by a non-authoritative receiver.
    pub fn is_in_time_window(&self, boots: u32, time: u32) -> bool {
        if self.engine_boots >= MAX_ENGINE_TIME || boots < self.engine_boots {
            return false;
        }
        if boots > self.engine_boots {
            return true;
        }
        time.saturating_add(TIME_WINDOW) >= self.estimated_time()
    }
}

#[derive(Debug, Default)]
struct CacheInner {
    by_engine_id: HashMap<Bytes, EngineState>,
    by_addr: HashMap<SocketAddr, Bytes>,
}

/// Shared cache of discovered remote engines.
#[derive(Debug, Default)]
pub struct EngineCache {
    inner: RwLock<CacheInner>,
}

impl EngineCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, CacheInner> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, CacheInner> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }

    pub fn get(&self, engine_id: &[u8]) -> Option<EngineState> {
        self.read().by_engine_id.get(engine_id).cloned()
    }

    pub fn get_by_addr(&self, addr: SocketAddr) -> Option<EngineState> {
        let inner = self.read();
        let id = inner.by_addr.get(&addr)?;
        inner.by_engine_id.get(id).cloned()
    }

    /// Record an engine, optionally bound to the address it answered from.
    pub fn insert(&self, addr: Option<SocketAddr>, state: EngineState) {
        let mut inner = self.write();
        if let Some(addr) = addr {
            inner.by_addr.insert(addr, state.engine_id.clone());
        }
        tracing::debug!(
            target: "snmp_dispatch::usm",
            {
                snmp.engine_id = %crate::util::hex::encode(&state.engine_id),
                snmp.engine_boots = state.engine_boots,
                snmp.engine_time = state.engine_time,
            },
            "engine cached"
        );
        inner.by_engine_id.insert(state.engine_id.clone(), state);
    }

    /// Record an engine seen for the first time. Known engines keep their
    /// time state; only the address binding is refreshed.
    pub fn learn(&self, addr: SocketAddr, state: EngineState) {
        let mut inner = self.write();
        inner.by_addr.insert(addr, state.engine_id.clone());
        if !inner.by_engine_id.contains_key(&state.engine_id) {
            tracing::debug!(
                target: "snmp_dispatch::usm",
                {
                    snmp.source = %addr,
                    snmp.engine_id = %crate::util::hex::encode(&state.engine_id),
                },
                "learned remote engine"
            );
            inner.by_engine_id.insert(state.engine_id.clone(), state);
        }
    }

    /// Feed authenticated time values back into the cache.
    pub fn update_time(&self, engine_id: &[u8], boots: u32, time: u32) -> bool {
        self.write()
            .by_engine_id
            .get_mut(engine_id)
            .is_some_and(|state| state.update_time(boots, time))
    }

    /// Forget the engine bound to `addr` so the next request rediscovers it.
    pub fn forget_addr(&self, addr: SocketAddr) {
        let mut inner = self.write();
        if let Some(id) = inner.by_addr.remove(&addr) {
            inner.by_engine_id.remove(&id);
        }
    }

    pub fn len(&self) -> usize {
        self.read().by_engine_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// This engine, when acting as the authoritative side.
#[derive(Debug, Clone)]
pub struct LocalEngine {
    engine_id: Bytes,
    engine_boots: u32,
    started: Instant,
    msg_max_size: i32,
}

impl LocalEngine {
    pub fn new(engine_id: impl Into<Bytes>, engine_boots: u32) -> Self {
        Self {
            engine_id: engine_id.into(),
            engine_boots,
            started: Instant::now(),
            msg_max_size: DEFAULT_MSG_MAX_SIZE,
        }
    }

    /// RFC 3411 format engine ID: enterprise number with the high bit set,
    /// format octet 5 (administratively assigned), then 8 random octets.
    pub fn generate_engine_id(enterprise: u32) -> Bytes {
        let mut id = Vec::with_capacity(13);
        id.extend_from_slice(&(enterprise | 0x8000_0000).to_be_bytes());
        id.push(0x05);
        let mut random = [0u8; 8];
        if getrandom::fill(&mut random).is_err() {
            let nanos = std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_nanos() as u64)
                .unwrap_or_default();
            random = nanos.to_be_bytes();
        }
        id.extend_from_slice(&random);
        Bytes::from(id)
    }

    pub fn with_msg_max_size(mut self, size: i32) -> Self {
        self.msg_max_size = size;
        self
    }

    pub fn engine_id(&self) -> &Bytes {
        &self.engine_id
    }

    pub fn engine_boots(&self) -> u32 {
        self.engine_boots
    }

    /// Seconds since this engine started, capped at [`MAX_ENGINE_TIME`].
    pub fn engine_time(&self) -> u32 {
        self.started.elapsed().as_secs().min(MAX_ENGINE_TIME as u64) as u32
    }

    pub fn msg_max_size(&self) -> i32 {
        self.msg_max_size
    }

    pub fn is_local(&self, engine_id: &[u8]) -> bool {
        self.engine_id.as_ref() == engine_id
    }

    /// RFC 3414 3.2.7a: timeliness of a message for which we are
    /// authoritative.
    pub fn is_in_time_window(&self, boots: u32, time: u32) -> bool {
        if self.engine_boots >= MAX_ENGINE_TIME || boots != self.engine_boots {
            return false;
        }
        time.abs_diff(self.engine_time()) <= TIME_WINDOW
    }
}

/// Report PDU carrying the current value of one usmStats counter.
pub fn report_pdu(kind: UsmErrorKind, request_id: i32, count: u32) -> Pdu {
    Pdu::new(
        PduType::Report,
        request_id,
        vec![VarBind::new(report_oids::for_kind(kind), Value::Counter32(count))],
    )
}
