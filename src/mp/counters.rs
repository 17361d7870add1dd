//! SNMP-MIB and SNMP-USM-STATS-MIB counters.

use std::sync::atomic::{AtomicU32, Ordering};

use crate::error::UsmErrorKind;

/// Live counters, shared by the dispatcher and its processing models.
///
/// All counters are Counter32 and wrap on overflow.
#[derive(Debug, Default)]
pub struct Counters {
    in_pkts: AtomicU32,
    in_bad_versions: AtomicU32,
    in_bad_community_names: AtomicU32,
    in_asn_parse_errs: AtomicU32,
    unknown_security_models: AtomicU32,
    invalid_msgs: AtomicU32,
    unknown_pdu_handlers: AtomicU32,
    silent_drops: AtomicU32,
    unsupported_sec_levels: AtomicU32,
    not_in_time_windows: AtomicU32,
    unknown_user_names: AtomicU32,
    unknown_engine_ids: AtomicU32,
    wrong_digests: AtomicU32,
    decryption_errors: AtomicU32,
}

/// Point-in-time copy of [`Counters`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterSnapshot {
    pub snmp_in_pkts: u32,
    pub snmp_in_bad_versions: u32,
    pub snmp_in_bad_community_names: u32,
    pub snmp_in_asn_parse_errs: u32,
    pub snmp_unknown_security_models: u32,
    pub snmp_invalid_msgs: u32,
    pub snmp_unknown_pdu_handlers: u32,
    pub snmp_silent_drops: u32,
    pub usm_stats_unsupported_sec_levels: u32,
    pub usm_stats_not_in_time_windows: u32,
    pub usm_stats_unknown_user_names: u32,
    pub usm_stats_unknown_engine_ids: u32,
    pub usm_stats_wrong_digests: u32,
    pub usm_stats_decryption_errors: u32,
}

#[inline]
fn bump(counter: &AtomicU32) -> u32 {
    counter.fetch_add(1, Ordering::Relaxed).wrapping_add(1)
}

impl Counters {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn in_pkts(&self) -> u32 {
        bump(&self.in_pkts)
    }

    pub(crate) fn bad_version(&self) -> u32 {
        bump(&self.in_bad_versions)
    }

    pub(crate) fn bad_community(&self) -> u32 {
        bump(&self.in_bad_community_names)
    }

    pub(crate) fn asn_parse_error(&self) -> u32 {
        bump(&self.in_asn_parse_errs)
    }

    pub(crate) fn unknown_security_model(&self) -> u32 {
        bump(&self.unknown_security_models)
    }

    pub(crate) fn invalid_msg(&self) -> u32 {
        bump(&self.invalid_msgs)
    }

    pub(crate) fn unknown_pdu_handler(&self) -> u32 {
        bump(&self.unknown_pdu_handlers)
    }

    pub(crate) fn silent_drop(&self) -> u32 {
        bump(&self.silent_drops)
    }

    /// Increment the usmStats counter for `kind`, returning the new value
    /// for the Report varbind.
    pub(crate) fn usm(&self, kind: UsmErrorKind) -> u32 {
        bump(match kind {
            UsmErrorKind::UnsupportedSecurityLevel => &self.unsupported_sec_levels,
            UsmErrorKind::NotInTimeWindow => &self.not_in_time_windows,
            UsmErrorKind::UnknownUserName => &self.unknown_user_names,
            UsmErrorKind::UnknownEngineId => &self.unknown_engine_ids,
            UsmErrorKind::WrongDigest => &self.wrong_digests,
            UsmErrorKind::DecryptionError => &self.decryption_errors,
        })
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        let get = |c: &AtomicU32| c.load(Ordering::Relaxed);
        CounterSnapshot {
            snmp_in_pkts: get(&self.in_pkts),
            snmp_in_bad_versions: get(&self.in_bad_versions),
            snmp_in_bad_community_names: get(&self.in_bad_community_names),
            snmp_in_asn_parse_errs: get(&self.in_asn_parse_errs),
            snmp_unknown_security_models: get(&self.unknown_security_models),
            snmp_invalid_msgs: get(&self.invalid_msgs),
            snmp_unknown_pdu_handlers: get(&self.unknown_pdu_handlers),
            snmp_silent_drops: get(&self.silent_drops),
            usm_stats_unsupported_sec_levels: get(&self.unsupported_sec_levels),
            usm_stats_not_in_time_windows: get(&self.not_in_time_windows),
            usm_stats_unknown_user_names: get(&self.unknown_user_names),
            usm_stats_unknown_engine_ids: get(&self.unknown_engine_ids),
            usm_stats_wrong_digests: get(&self.wrong_digests),
            usm_stats_decryption_errors: get(&self.decryption_errors),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usm_counters_return_new_value() {
        let c = Counters::new();
        assert_eq!(c.usm(UsmErrorKind::WrongDigest), 1);
        assert_eq!(c.usm(UsmErrorKind::WrongDigest), 2);
        c.in_pkts();
        let snap = c.snapshot();
        assert_eq!(snap.usm_stats_wrong_digests, 2);
        assert_eq!(snap.snmp_in_pkts, 1);
        assert_eq!(snap.usm_stats_decryption_errors, 0);
    }

    #[test]
    fn counters_wrap() {
        let c = Counters::new();
        c.silent_drops.store(u32::MAX, Ordering::Relaxed);
        assert_eq!(c.silent_drop(), 0);
    }
}
