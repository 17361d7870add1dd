//! Event passed to command responders.

use std::net::SocketAddr;

use bytes::Bytes;

use crate::error::ErrorStatus;
use crate::message::{SecurityLevel, SecurityModel};
use crate::mp::IncomingMessage;
use crate::pdu::{AnyPdu, PduType, TrapV1Pdu};
use crate::varbind::VarBind;
use crate::version::Version;

/// An authenticated, decoded PDU delivered to a [`CommandResponder`](super::CommandResponder).
#[derive(Debug, Clone)]
pub struct ResponderEvent {
    /// Source address of the message.
    pub source: SocketAddr,
    pub version: Version,
    pub security_model: SecurityModel,
    /// Community string (v1/v2c) or USM user name (v3).
    pub security_name: Bytes,
    /// NoAuthNoPriv for v1/v2c.
    pub security_level: SecurityLevel,
    /// Empty for v1/v2c.
    pub context_engine_id: Bytes,
    /// Empty for v1/v2c.
    pub context_name: Bytes,
    pub pdu_type: PduType,
    /// 0 for SNMPv1 traps.
    pub request_id: i32,
    pub varbinds: Vec<VarBind>,
    /// The original PDU for SNMPv1 traps.
    pub trap_v1: Option<TrapV1Pdu>,
}

impl ResponderEvent {
    pub(crate) fn from_message(msg: &IncomingMessage) -> Self {
        let trap_v1 = match &msg.pdu {
            AnyPdu::TrapV1(t) => Some(t.clone()),
            AnyPdu::Generic(_) => None,
        };
        Self {
            source: msg.source,
            version: msg.version,
            security_model: msg.security_model,
            security_name: msg.security_name.clone(),
            security_level: msg.security_level,
            context_engine_id: msg.context_engine_id.clone(),
            context_name: msg.context_name.clone(),
            pdu_type: msg.pdu_type(),
            request_id: msg.request_id(),
            varbinds: msg.pdu.varbinds().to_vec(),
            trap_v1,
        }
    }

    /// Whether the sender waits for a Response.
    pub fn is_confirmed(&self) -> bool {
        self.pdu_type.is_confirmed()
    }
}

/// What the dispatcher should send back for a confirmed request.
///
/// Ignored for notifications; informs are acknowledged before the
/// responder runs.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Response {
    /// Send nothing.
    #[default]
    None,
    /// Response with noError and these varbinds.
    VarBinds(Vec<VarBind>),
    /// Response with an error status; the request's varbinds are echoed.
    Error { status: ErrorStatus, index: i32 },
}

impl Response {
    pub fn error(status: ErrorStatus, index: i32) -> Self {
        Self::Error { status, index }
    }
}
