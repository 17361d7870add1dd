//! USM inbound checks and outbound message construction (RFC 3414 3.1, 3.2).

use std::net::SocketAddr;

use bytes::Bytes;

use super::{IncomingMessage, MessageProcessor, Rejected, V3State};
use crate::error::{CryptoErrorKind, EncodeErrorKind, Error, Result, UsmErrorKind};
use crate::message::{
    MsgFlags, MsgGlobalData, ScopedPdu, SecurityLevel, SecurityModel, V3Message, V3MessageData,
};
use crate::pdu::{AnyPdu, PduType};
use crate::v3::auth::{authenticate_message, verify_message};
use crate::v3::{EngineState, UserKeys, UsmSecurityParams, report_pdu};
use crate::version::Version;

/// Everything needed to wrap a ScopedPDU in a v3 envelope.
pub(super) struct OutgoingV3<'a> {
    pub msg_id: i32,
    pub msg_max_size: i32,
    pub level: SecurityLevel,
    pub reportable: bool,
    pub engine_id: &'a [u8],
    pub boots: u32,
    pub time: u32,
    pub user_name: &'a [u8],
    pub keys: Option<&'a UserKeys>,
}

/// Header fields of the message being rejected, for the Report.
struct ReportContext<'a> {
    source: SocketAddr,
    msg_id: i32,
    msg_max_size: i32,
    reportable: bool,
    request_id: i32,
    user_name: &'a [u8],
}

impl MessageProcessor {
    pub(super) fn process_v3(
        &self,
        msg: V3Message,
        raw: &[u8],
        source: SocketAddr,
    ) -> std::result::Result<IncomingMessage, Rejected> {
        let params = match UsmSecurityParams::decode(msg.security_params.clone()) {
            Ok(p) => p,
            Err(e) => {
                self.counters.asn_parse_error();
                return Err(e.into());
            }
        };
        let level = msg.security_level();
        let mut ctx = ReportContext {
            source,
            msg_id: msg.msg_id(),
            msg_max_size: msg.global_data.msg_max_size,
            reportable: msg.global_data.msg_flags.reportable,
            request_id: msg.pdu().map(|p| p.request_id).unwrap_or(0),
            user_name: &params.username,
        };

        // Discovery probe.
        if params.engine_id.is_empty() {
            return Err(self.usm_failure(UsmErrorKind::UnknownEngineId, &ctx, None));
        }
        let local = self.local.is_local(&params.engine_id);
        let plaintext_report = matches!(
            &msg.data,
            V3MessageData::Plaintext(scoped) if scoped.pdu.pdu_type == PduType::Report
        );

        // Reports answering our own discovery probes carry no user.
        let anonymous = !local && params.username.is_empty() && level == SecurityLevel::NoAuthNoPriv;
        let user = if anonymous && plaintext_report {
            None
        } else {
            match self.users.get(&params.username, &params.engine_id) {
                Some(user) => Some(user),
                None => return Err(self.usm_failure(UsmErrorKind::UnknownUserName, &ctx, None)),
            }
        };

        // Below the user's configured level only Reports get through; a
        // peer reporting an error may not be able to authenticate it.
        if let Some(user) = &user
            && (level > user.security_level()
                || (level < user.security_level() && !plaintext_report))
        {
            return Err(self.usm_failure(UsmErrorKind::UnsupportedSecurityLevel, &ctx, None));
        }

        // Keys are cached only after they have verified a digest.
        let keys = match &user {
            Some(user) if level.requires_auth() => {
                Some(self.users.candidate_keys(user, &params.engine_id))
            }
            _ => None,
        };

        // Keys usable for an authenticated Report back to the sender.
        let report_keys = keys.as_deref().filter(|_| local);

        if level.requires_auth() {
            let authentic = keys
                .as_ref()
                .and_then(|k| k.auth.as_ref())
                .is_some_and(|key| {
                    params.auth_params.len() == key.mac_len()
                        && UsmSecurityParams::find_auth_params_offset(raw)
                            .is_some_and(|(offset, len)| verify_message(key, raw, offset, len))
                });
            if !authentic {
                return Err(self.usm_failure(UsmErrorKind::WrongDigest, &ctx, None));
            }
            if let Some(keys) = &keys {
                self.users.remember(keys);
            }

            let timely = if local {
                self.local
                    .is_in_time_window(params.engine_boots, params.engine_time)
            } else {
                self.check_remote_time(&params, source)
            };
            if !timely {
                return Err(self.usm_failure(UsmErrorKind::NotInTimeWindow, &ctx, report_keys));
            }
        }

        let scoped = match msg.data {
            V3MessageData::Plaintext(scoped) => scoped,
            V3MessageData::Encrypted(ciphertext) => {
                let decrypted = keys
                    .as_ref()
                    .and_then(|k| k.privacy.as_ref())
                    .ok_or(Error::decrypt(Some(source), CryptoErrorKind::NoPrivKey))
                    .and_then(|key| {
                        key.decrypt(
                            &ciphertext,
                            params.engine_boots,
                            params.engine_time,
                            &params.priv_params,
                        )
                    })
                    .and_then(ScopedPdu::decode_decrypted);
                match decrypted {
                    Ok(scoped) => scoped,
                    Err(e) => {
                        tracing::debug!(
                            target: "snmp_dispatch::usm",
                            {
                                snmp.source = %source,
                                error = %e,
                            },
                            "decryption failed"
                        );
                        return Err(self.usm_failure(UsmErrorKind::DecryptionError, &ctx, report_keys));
                    }
                }
            }
        };
        ctx.request_id = scoped.pdu.request_id;

        // Confirmed PDUs must be keyed to us (receiver is authoritative).
        if !local && scoped.pdu.pdu_type.is_confirmed() {
            return Err(self.usm_failure(UsmErrorKind::UnknownEngineId, &ctx, None));
        }

        Ok(IncomingMessage {
            source,
            version: Version::V3,
            security_model: SecurityModel::Usm,
            security_name: params.username.clone(),
            security_level: level,
            context_engine_id: scoped.context_engine_id,
            context_name: scoped.context_name,
            pdu: AnyPdu::Generic(scoped.pdu),
            v3: Some(V3State {
                msg_id: msg.global_data.msg_id,
                msg_max_size: msg.global_data.msg_max_size,
                params,
                keys,
            }),
        })
    }

    /// RFC 3414 3.2.7b for a remote authoritative engine: adopt newer
    /// values, otherwise require the message to be within the window.
    fn check_remote_time(&self, params: &UsmSecurityParams, source: SocketAddr) -> bool {
        match self.engines.get(&params.engine_id) {
            Some(state) => {
                self.engines
                    .update_time(&params.engine_id, params.engine_boots, params.engine_time)
                    || state.is_in_time_window(params.engine_boots, params.engine_time)
            }
            None => {
                if let Ok(state) = EngineState::from_params(params) {
                    self.engines.learn(source, state);
                }
                true
            }
        }
    }

    /// Count a USM failure and build the Report if the sender asked for one.
    fn usm_failure(&self, kind: UsmErrorKind, ctx: &ReportContext<'_>, keys: Option<&UserKeys>) -> Rejected {
        let count = self.counters.usm(kind);
        tracing::debug!(
            target: "snmp_dispatch::usm",
            {
                snmp.source = %ctx.source,
                snmp.msg_id = ctx.msg_id,
                snmp.usm_error = %kind,
                reportable = ctx.reportable,
            },
            "USM check failed"
        );

        let report = if ctx.reportable {
            let level = match keys {
                Some(k) if k.auth.is_some() => SecurityLevel::AuthNoPriv,
                _ => SecurityLevel::NoAuthNoPriv,
            };
            let scoped = ScopedPdu::new(
                self.local.engine_id().clone(),
                Bytes::new(),
                report_pdu(kind, ctx.request_id, count),
            );
            let built = self.encode_v3(
                OutgoingV3 {
                    msg_id: ctx.msg_id,
                    msg_max_size: ctx.msg_max_size.min(self.local.msg_max_size()),
                    level,
                    reportable: false,
                    engine_id: self.local.engine_id(),
                    boots: self.local.engine_boots(),
                    time: self.local.engine_time(),
                    user_name: ctx.user_name,
                    keys,
                },
                &scoped,
            );
            match built {
                Ok(report) => Some(report),
                Err(e) => {
                    tracing::warn!(
                        target: "snmp_dispatch::usm",
                        {
                            snmp.source = %ctx.source,
                            error = %e,
                        },
                        "could not build report"
                    );
                    None
                }
            }
        } else {
            None
        };

        Rejected {
            error: Error::usm(Some(ctx.source), kind),
            report,
        }
    }

    /// Build a v3 message: encrypt the ScopedPDU, then sign the whole
    /// message in place (RFC 3414 3.1).
    pub(super) fn encode_v3(&self, out: OutgoingV3<'_>, scoped: &ScopedPdu) -> Result<Bytes> {
        let auth_key = if out.level.requires_auth() {
            Some(
                out.keys
                    .and_then(|k| k.auth.as_ref())
                    .ok_or(Error::encode(EncodeErrorKind::MissingAuthKey))?,
            )
        } else {
            None
        };

        let mut params = UsmSecurityParams::new(
            Bytes::copy_from_slice(out.engine_id),
            out.boots,
            out.time,
            Bytes::copy_from_slice(out.user_name),
        );
        if let Some(key) = auth_key {
            params = params.with_auth_placeholder(key.mac_len());
        }

        let global = MsgGlobalData::new(
            out.msg_id,
            out.msg_max_size,
            MsgFlags::new(out.level, out.reportable),
        );

        let message = if out.level.requires_priv() {
            let priv_key = out
                .keys
                .and_then(|k| k.privacy.as_ref())
                .ok_or(Error::encode(EncodeErrorKind::NoPrivKey))?;
            let (ciphertext, salt) =
                priv_key.encrypt(&scoped.encode_to_bytes(), out.boots, out.time, &self.salt)?;
            params = params.with_priv_params(salt);
            V3Message::new_encrypted(global, params.encode(), ciphertext)
        } else {
            V3Message::new(global, params.encode(), scoped.clone())
        };

        let encoded = message.encode();
        let Some(key) = auth_key else {
            return Ok(encoded);
        };
        let mut buf = encoded.to_vec();
        let (offset, len) = UsmSecurityParams::find_auth_params_offset(&buf)
            .ok_or(Error::encode(EncodeErrorKind::MissingAuthParams))?;
        authenticate_message(key, &mut buf, offset, len);
        Ok(Bytes::from(buf))
    }
}
