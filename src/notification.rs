//! Notification varbind helpers (RFC 3416 4.2.6).
//!
//! SNMPv2 traps and informs must start with `sysUpTime.0` followed by
//! `snmpTrapOID.0`.

use crate::error::{DecodeErrorKind, Error, Result};
use crate::oid::Oid;
use crate::pdu::{AnyPdu, Pdu, PduType};
use crate::value::Value;
use crate::varbind::VarBind;

pub mod oids {
    use crate::oid::Oid;

    /// sysUpTime.0
    pub fn sys_uptime() -> Oid {
        crate::oid!(1, 3, 6, 1, 2, 1, 1, 3, 0)
    }

    /// snmpTrapOID.0
    pub fn snmp_trap_oid() -> Oid {
        crate::oid!(1, 3, 6, 1, 6, 3, 1, 1, 4, 1, 0)
    }

    /// snmpTrapEnterprise.0
    pub fn snmp_trap_enterprise() -> Oid {
        crate::oid!(1, 3, 6, 1, 6, 3, 1, 1, 4, 3, 0)
    }

    /// Standard traps root (coldStart = .1 ... egpNeighborLoss = .6)
    pub fn snmp_traps() -> Oid {
        crate::oid!(1, 3, 6, 1, 6, 3, 1, 1, 5)
    }
}

/// Build the varbind list for a v2 trap or inform.
pub fn notification_varbinds(uptime: u32, trap_oid: Oid, payload: Vec<VarBind>) -> Vec<VarBind> {
    let mut varbinds = Vec::with_capacity(payload.len() + 2);
    varbinds.push(VarBind::new(oids::sys_uptime(), Value::TimeTicks(uptime)));
    varbinds.push(VarBind::new(
        oids::snmp_trap_oid(),
        Value::ObjectIdentifier(trap_oid),
    ));
    varbinds.extend(payload);
    varbinds
}

pub fn trap_v2(request_id: i32, uptime: u32, trap_oid: Oid, payload: Vec<VarBind>) -> Pdu {
    Pdu::new(
        PduType::TrapV2,
        request_id,
        notification_varbinds(uptime, trap_oid, payload),
    )
}

pub fn inform(request_id: i32, uptime: u32, trap_oid: Oid, payload: Vec<VarBind>) -> Pdu {
    Pdu::new(
        PduType::InformRequest,
        request_id,
        notification_varbinds(uptime, trap_oid, payload),
    )
}

/// `snmpTrapOID.0` of a received notification.
///
/// For SNMPv1 traps the OID is derived from generic/specific trap values.
pub fn trap_oid(pdu: &AnyPdu) -> Result<Oid> {
    match pdu {
        AnyPdu::TrapV1(t) => Ok(t.v2_trap_oid()),
        AnyPdu::Generic(p) => {
            let target = oids::snmp_trap_oid();
            p.varbinds
                .iter()
                .take(2)
                .find(|vb| vb.oid == target)
                .and_then(|vb| vb.value.as_oid().cloned())
                .ok_or_else(|| Error::decode(0, DecodeErrorKind::MissingTrapOid))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oid;

    #[test]
    fn header_varbinds_come_first() {
        let pdu = trap_v2(
            1,
            500,
            oid!(1, 3, 6, 1, 6, 3, 1, 1, 5, 3),
            vec![VarBind::new(oid!(1, 3, 6, 1, 2, 1, 2, 2, 1, 1, 2), 2)],
        );
        assert_eq!(pdu.varbinds.len(), 3);
        assert_eq!(pdu.varbinds[0].oid, oids::sys_uptime());
        assert_eq!(pdu.varbinds[1].oid, oids::snmp_trap_oid());
        assert_eq!(
            trap_oid(&AnyPdu::Generic(pdu)).unwrap(),
            oid!(1, 3, 6, 1, 6, 3, 1, 1, 5, 3)
        );
    }

    #[test]
    fn missing_trap_oid_is_error() {
        let pdu = Pdu::new(PduType::TrapV2, 1, vec![]);
        assert!(trap_oid(&AnyPdu::Generic(pdu)).is_err());
    }
}
