//! Message processing models (RFC 3412 section 7).
//!
//! [`MessageProcessor`] turns datagrams into [`IncomingMessage`]s and PDUs
//! into datagrams. It owns no socket: the dispatcher feeds it bytes and
//! sends whatever it returns.
//!
//! - SNMPv1/v2c: community check against the configured set.
//! - SNMPv3: USM inbound checks, in RFC 3414 3.2 order, with Report
//!   generation for reportable messages.

mod counters;
mod usm;

pub use counters::{CounterSnapshot, Counters};

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;

use crate::error::{DecodeErrorKind, EncodeErrorKind, Error, Result};
use crate::message::{CommunityMessage, Message, ScopedPdu, SecurityLevel, SecurityModel};
use crate::pdu::{AnyPdu, Pdu, PduType};
use crate::target::Target;
use crate::transport::MAX_UDP_PAYLOAD;
use crate::v3::{EngineCache, EngineState, LocalEngine, SaltCounter, UserKeys, UserTable, UsmSecurityParams};
use crate::version::Version;

/// A message that passed version, community or USM processing.
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    pub source: SocketAddr,
    pub version: Version,
    pub security_model: SecurityModel,
    /// Community string or USM user name.
    pub security_name: Bytes,
    pub security_level: SecurityLevel,
    pub context_engine_id: Bytes,
    pub context_name: Bytes,
    pub pdu: AnyPdu,
    pub(crate) v3: Option<V3State>,
}

/// v3 header state needed to answer or correlate the message.
#[derive(Debug, Clone)]
pub(crate) struct V3State {
    pub msg_id: i32,
    pub msg_max_size: i32,
    pub params: UsmSecurityParams,
    pub keys: Option<Arc<UserKeys>>,
}

impl IncomingMessage {
    pub fn pdu_type(&self) -> PduType {
        self.pdu.pdu_type()
    }

    pub fn request_id(&self) -> i32 {
        self.pdu.request_id()
    }

    pub fn msg_id(&self) -> Option<i32> {
        self.v3.as_ref().map(|s| s.msg_id)
    }

    /// Key of the pending request this message answers: msgID for v3,
    /// request ID otherwise.
    pub fn correlation_id(&self) -> i32 {
        self.msg_id().unwrap_or_else(|| self.request_id())
    }

    /// Authoritative engine ID from the USM header.
    pub fn security_engine_id(&self) -> Option<&Bytes> {
        self.v3.as_ref().map(|s| &s.params.engine_id)
    }

    /// The sender's engine ID, boots and time, if it is a v3 message
    /// with a non-empty engine ID.
    pub(crate) fn authoritative_engine(&self) -> Option<EngineState> {
        self.v3
            .as_ref()
            .and_then(|s| EngineState::from_params(&s.params).ok())
    }

    /// Largest reply the sender accepts.
    pub fn max_response_size(&self) -> usize {
        self.v3
            .as_ref()
            .map(|s| s.msg_max_size.max(0) as usize)
            .unwrap_or(MAX_UDP_PAYLOAD)
            .min(MAX_UDP_PAYLOAD)
    }
}

/// A datagram that failed processing.
///
/// `report` is set when the failure must be answered with a Report PDU.
#[derive(Debug)]
pub struct Rejected {
    pub error: Error,
    pub report: Option<Bytes>,
}

impl From<Error> for Rejected {
    fn from(error: Error) -> Self {
        Self {
            error,
            report: None,
        }
    }
}

/// Version dispatch plus the community and USM processing models.
#[derive(Debug)]
pub struct MessageProcessor {
    communities: Vec<Bytes>,
    users: Arc<UserTable>,
    local: LocalEngine,
    engines: Arc<EngineCache>,
    salt: SaltCounter,
    counters: Arc<Counters>,
}

impl MessageProcessor {
    pub fn new(local: LocalEngine, users: Arc<UserTable>, engines: Arc<EngineCache>) -> Self {
        Self {
            communities: Vec::new(),
            users,
            local,
            engines,
            salt: SaltCounter::new(),
            counters: Arc::new(Counters::new()),
        }
    }

    /// Accept only these communities. An empty list accepts any.
    pub fn with_communities(mut self, communities: Vec<Bytes>) -> Self {
        self.communities = communities;
        self
    }

    pub fn local_engine(&self) -> &LocalEngine {
        &self.local
    }

    pub fn users(&self) -> &Arc<UserTable> {
        &self.users
    }

    pub fn engines(&self) -> &Arc<EngineCache> {
        &self.engines
    }

    pub fn counters(&self) -> &Arc<Counters> {
        &self.counters
    }

    /// Decode and authenticate one datagram.
    pub fn prepare_data_elements(
        &self,
        data: Bytes,
        source: SocketAddr,
    ) -> std::result::Result<IncomingMessage, Rejected> {
        self.counters.in_pkts();
        let message = match Message::decode(data.clone()) {
            Ok(m) => m,
            Err(e) => {
                self.count_decode_error(&e);
                return Err(e.into());
            }
        };
        match message {
            Message::Community(msg) => self.process_community(msg, source).map_err(Rejected::from),
            Message::V3(msg) => self.process_v3(msg, &data, source),
        }
    }

    fn count_decode_error(&self, error: &Error) {
        match error {
            Error::Decode {
                kind: DecodeErrorKind::UnknownVersion(_),
                ..
            } => self.counters.bad_version(),
            Error::Decode {
                kind: DecodeErrorKind::UnknownSecurityModel(_),
                ..
            } => self.counters.unknown_security_model(),
            Error::Decode {
                kind:
                    DecodeErrorKind::InvalidMsgFlags
                    | DecodeErrorKind::MsgMaxSizeTooSmall { .. }
                    | DecodeErrorKind::InvalidMsgId { .. },
                ..
            } => self.counters.invalid_msg(),
            _ => self.counters.asn_parse_error(),
        };
    }

    fn process_community(&self, msg: CommunityMessage, source: SocketAddr) -> Result<IncomingMessage> {
        if !self.communities.is_empty() && !self.communities.contains(&msg.community) {
            self.counters.bad_community();
            return Err(Error::InvalidCommunity {
                target: Some(source),
            });
        }
        let security_model = match msg.version {
            Version::V1 => SecurityModel::V1,
            _ => SecurityModel::V2c,
        };
        Ok(IncomingMessage {
            source,
            version: msg.version,
            security_model,
            security_name: msg.community,
            security_level: SecurityLevel::NoAuthNoPriv,
            context_engine_id: Bytes::new(),
            context_name: Bytes::new(),
            pdu: msg.pdu,
            v3: None,
        })
    }

    /// Encode a request or notification for `target`.
    ///
    /// For USM targets, confirmed PDUs are keyed to the remote engine, which
    /// must already be in the engine cache; unconfirmed notifications are
    /// keyed to the local engine.
    pub fn prepare_outgoing_message(&self, target: &Target, pdu: AnyPdu, msg_id: i32) -> Result<Bytes> {
        match target {
            Target::Community(t) => Ok(CommunityMessage::new(t.version, t.community.clone(), pdu)?.encode()),
            Target::User(t) => {
                let AnyPdu::Generic(pdu) = pdu else {
                    return Err(Error::encode(EncodeErrorKind::PduNotAllowed));
                };
                let (engine_id, boots, time) = if pdu.pdu_type.is_confirmed() {
                    let state = self
                        .engines
                        .get_by_addr(t.address)
                        .ok_or(Error::encode(EncodeErrorKind::EngineNotDiscovered))?;
                    (state.engine_id.clone(), state.engine_boots, state.estimated_time())
                } else {
                    (
                        self.local.engine_id().clone(),
                        self.local.engine_boots(),
                        self.local.engine_time(),
                    )
                };
                let keys = self.users.keys(&t.security_name, &engine_id);
                if t.security_level.requires_auth() && keys.is_none() {
                    return Err(Error::UnknownUser {
                        name: String::from_utf8_lossy(&t.security_name).into(),
                    });
                }
                let reportable = pdu.pdu_type.is_confirmed();
                let scoped = ScopedPdu::new(engine_id.clone(), t.context_name.clone(), pdu);
                self.encode_v3(
                    usm::OutgoingV3 {
                        msg_id,
                        msg_max_size: self.local.msg_max_size(),
                        level: t.security_level,
                        reportable,
                        engine_id: &engine_id,
                        boots,
                        time,
                        user_name: &t.security_name,
                        keys: keys.as_deref(),
                    },
                    &scoped,
                )
            }
        }
    }

    /// Encode a Response to `request` with the same security parameters.
    pub fn prepare_response_message(&self, request: &IncomingMessage, pdu: Pdu) -> Result<Bytes> {
        let encoded = match &request.v3 {
            None => CommunityMessage::new(request.version, request.security_name.clone(), pdu)?.encode(),
            Some(state) => {
                let scoped = ScopedPdu::new(
                    request.context_engine_id.clone(),
                    request.context_name.clone(),
                    pdu,
                );
                self.encode_v3(
                    usm::OutgoingV3 {
                        msg_id: state.msg_id,
                        msg_max_size: self.local.msg_max_size(),
                        level: request.security_level,
                        reportable: false,
                        engine_id: self.local.engine_id(),
                        boots: self.local.engine_boots(),
                        time: self.local.engine_time(),
                        user_name: &request.security_name,
                        keys: state.keys.as_deref(),
                    },
                    &scoped,
                )?
            }
        };
        let max = request.max_response_size();
        if encoded.len() > max {
            return Err(Error::MessageTooLarge {
                size: encoded.len(),
                max,
            });
        }
        Ok(encoded)
    }
}
