//! Object identifiers.

use crate::error::{DecodeErrorKind, Error, OidErrorKind, Result};
use smallvec::SmallVec;
use std::fmt;
use std::str::FromStr;

/// Maximum number of arcs (RFC 2578 section 3.5).
pub const MAX_OID_LEN: usize = 128;

/// An object identifier, stored as its numeric arcs.
///
/// Sixteen arcs are kept inline; that covers nearly every OID seen in
/// practice without a heap allocation.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Oid {
    arcs: SmallVec<[u32; 16]>,
}

impl Oid {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(arcs: impl IntoIterator<Item = u32>) -> Self {
        Self {
            arcs: arcs.into_iter().collect(),
        }
    }

    pub fn from_slice(arcs: &[u32]) -> Self {
        Self {
            arcs: SmallVec::from_slice(arcs),
        }
    }

    /// Parse dotted notation. A leading dot is accepted (`.1.3.6.1`).
    pub fn parse(s: &str) -> Result<Self> {
        let trimmed = s.trim().trim_start_matches('.');
        if trimmed.is_empty() {
            return Err(Error::invalid_oid_with_input(OidErrorKind::Empty, s));
        }
        let mut arcs = SmallVec::new();
        for part in trimmed.split('.') {
            let arc = part
                .parse::<u32>()
                .map_err(|_| Error::invalid_oid_with_input(OidErrorKind::InvalidArc, s))?;
            arcs.push(arc);
        }
        if arcs.len() > MAX_OID_LEN {
            return Err(Error::invalid_oid_with_input(
                OidErrorKind::TooManyArcs {
                    count: arcs.len(),
                    max: MAX_OID_LEN,
                },
                s,
            ));
        }
        Ok(Self { arcs })
    }

    pub fn arcs(&self) -> &[u32] {
        &self.arcs
    }

    pub fn len(&self) -> usize {
        self.arcs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arcs.is_empty()
    }

    pub fn starts_with(&self, prefix: &Oid) -> bool {
        self.arcs.starts_with(&prefix.arcs)
    }

    pub fn parent(&self) -> Option<Oid> {
        let (_, head) = self.arcs.split_last()?;
        Some(Self::from_slice(head))
    }

    pub fn child(&self, arc: u32) -> Oid {
        let mut arcs = self.arcs.clone();
        arcs.push(arc);
        Self { arcs }
    }

    /// Append several arcs, e.g. a table index.
    pub fn extend(&self, suffix: &[u32]) -> Oid {
        let mut arcs = self.arcs.clone();
        arcs.extend_from_slice(suffix);
        Self { arcs }
    }

    /// Check X.660 arc constraints on the first two arcs.
    pub fn validate(&self) -> Result<()> {
        match self.arcs.as_slice() {
            [] => Ok(()),
            [first, ..] if *first > 2 => Err(Error::invalid_oid(OidErrorKind::InvalidFirstArc(
                *first,
            ))),
            [first, second, ..] if *first < 2 && *second >= 40 => {
                Err(Error::invalid_oid(OidErrorKind::InvalidSecondArc {
                    first: *first,
                    second: *second,
                }))
            }
            _ => Ok(()),
        }
    }

    /// BER content octets of this OID.
    ///
    /// The first two arcs share one subidentifier (`40 * a0 + a1`).
    pub fn to_ber_smallvec(&self) -> SmallVec<[u8; 64]> {
        let mut out = SmallVec::new();
        let (first, rest): (u64, &[u32]) = match self.arcs.as_slice() {
            [] => return out,
            [a0] => (*a0 as u64 * 40, &[]),
            [a0, a1, rest @ ..] => (*a0 as u64 * 40 + *a1 as u64, rest),
        };
        push_subidentifier(&mut out, first);
        for &arc in rest {
            push_subidentifier(&mut out, arc as u64);
        }
        out
    }

    pub fn to_ber(&self) -> Vec<u8> {
        self.to_ber_smallvec().to_vec()
    }

    /// Decode BER content octets.
    ///
    /// Offsets in errors are relative to `data`.
    pub fn from_ber(data: &[u8]) -> Result<Self> {
        let mut arcs: SmallVec<[u32; 16]> = SmallVec::new();
        let mut pos = 0;
        while pos < data.len() {
            let start = pos;
            let mut value: u64 = 0;
            loop {
                let Some(&byte) = data.get(pos) else {
                    return Err(Error::decode(start, DecodeErrorKind::InvalidOidEncoding));
                };
                pos += 1;
                value = (value << 7) | (byte & 0x7F) as u64;
                if value > u32::MAX as u64 + 80 {
                    return Err(Error::decode(start, DecodeErrorKind::IntegerOverflow));
                }
                if byte & 0x80 == 0 {
                    break;
                }
            }

            if arcs.is_empty() {
                let (a0, a1) = match value {
                    0..40 => (0, value),
                    40..80 => (1, value - 40),
                    _ => (2, value - 80),
                };
                let a1 = u32::try_from(a1)
                    .map_err(|_| Error::decode(start, DecodeErrorKind::IntegerOverflow))?;
                arcs.push(a0);
                arcs.push(a1);
            } else {
                let arc = u32::try_from(value)
                    .map_err(|_| Error::decode(start, DecodeErrorKind::IntegerOverflow))?;
                arcs.push(arc);
            }

            if arcs.len() > MAX_OID_LEN {
                return Err(Error::decode(
                    start,
                    DecodeErrorKind::OidTooLong {
                        count: arcs.len(),
                        max: MAX_OID_LEN,
                    },
                ));
            }
        }
        Ok(Self { arcs })
    }
}

fn push_subidentifier(out: &mut SmallVec<[u8; 64]>, value: u64) {
    let mut groups = [0u8; 10];
    let mut n = 0;
    let mut v = value;
    loop {
        groups[n] = (v & 0x7F) as u8;
        n += 1;
        v >>= 7;
        if v == 0 {
            break;
        }
    }
    for i in (0..n).rev() {
        let cont = if i == 0 { 0 } else { 0x80 };
        out.push(groups[i] | cont);
    }
}

impl fmt::Debug for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Oid({})", self)
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut arcs = self.arcs.iter();
        if let Some(first) = arcs.next() {
            write!(f, "{}", first)?;
            for arc in arcs {
                write!(f, ".{}", arc)?;
            }
        }
        Ok(())
    }
}

impl FromStr for Oid {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl From<&[u32]> for Oid {
    fn from(arcs: &[u32]) -> Self {
        Self::from_slice(arcs)
    }
}

impl<const N: usize> From<[u32; N]> for Oid {
    fn from(arcs: [u32; N]) -> Self {
        Self::from_slice(&arcs)
    }
}

/// Build an [`Oid`] from literal arcs.
///
/// ```
/// let oid = snmp_dispatch::oid!(1, 3, 6, 1, 2, 1, 1, 3, 0);
/// assert_eq!(oid.to_string(), "1.3.6.1.2.1.1.3.0");
/// ```
#[macro_export]
macro_rules! oid {
    ($($arc:expr),* $(,)?) => {
        $crate::oid::Oid::from_slice(&[$($arc),*])
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn parse_and_display() {
        let oid = Oid::parse(".1.3.6.1.2.1.1.1.0").unwrap();
        assert_eq!(oid.arcs(), &[1, 3, 6, 1, 2, 1, 1, 1, 0]);
        assert_eq!(oid.to_string(), "1.3.6.1.2.1.1.1.0");
        assert!(Oid::parse("").is_err());
        assert!(Oid::parse("1.3.x").is_err());
        assert!(Oid::parse("1..3").is_err());
    }

    #[test]
    fn ber_known_encoding() {
        // sysDescr.0
        let oid = oid!(1, 3, 6, 1, 2, 1, 1, 1, 0);
        assert_eq!(oid.to_ber(), vec![0x2B, 6, 1, 2, 1, 1, 1, 0]);
        // multi-byte arc
        let oid = oid!(1, 3, 6, 1, 4, 1, 2680);
        assert_eq!(oid.to_ber(), vec![0x2B, 6, 1, 4, 1, 0x94, 0x78]);
        assert_eq!(Oid::from_ber(&[0x2B, 6, 1, 4, 1, 0x94, 0x78]).unwrap(), oid);
    }

    #[test]
    fn ber_first_arc_two() {
        let oid = oid!(2, 999, 3);
        let ber = oid.to_ber();
        assert_eq!(Oid::from_ber(&ber).unwrap(), oid);
    }

    #[test]
    fn ber_rejects_truncated_subidentifier() {
        assert!(Oid::from_ber(&[0x2B, 0x86]).is_err());
    }

    #[test]
    fn ber_rejects_too_many_arcs() {
        let data = vec![0x01; MAX_OID_LEN + 1];
        assert!(matches!(
            Oid::from_ber(&data),
            Err(Error::Decode {
                kind: DecodeErrorKind::OidTooLong { .. },
                ..
            })
        ));
    }

    #[test]
    fn validate_arcs() {
        assert!(oid!(1, 3, 6).validate().is_ok());
        assert!(oid!(3, 1).validate().is_err());
        assert!(oid!(1, 40).validate().is_err());
        assert!(oid!(2, 100).validate().is_ok());
    }

    #[test]
    fn prefix_helpers() {
        let base = oid!(1, 3, 6, 1);
        let leaf = base.extend(&[2, 1]);
        assert!(leaf.starts_with(&base));
        assert_eq!(leaf.parent().unwrap(), base.child(2));
        assert!(Oid::empty().parent().is_none());
    }

    #[test]
    fn ordering_is_lexicographic() {
        assert!(oid!(1, 3, 6, 1, 2) < oid!(1, 3, 6, 1, 10));
        assert!(oid!(1, 3, 6) < oid!(1, 3, 6, 0));
    }

    proptest! {
        #[test]
        fn ber_decode_inverts_encode(
            a0 in 0u32..=2,
            a1 in 0u32..40,
            rest in proptest::collection::vec(any::<u32>(), 0..20),
        ) {
            let mut arcs = vec![a0, a1];
            arcs.extend(rest);
            let oid = Oid::from_slice(&arcs);
            prop_assert_eq!(Oid::from_ber(&oid.to_ber()).unwrap(), oid);
        }
    }
}
