//! Remote endpoints for outgoing requests and notifications.

use std::net::SocketAddr;
use std::time::Duration;

use bytes::Bytes;

use crate::message::SecurityLevel;
use crate::version::Version;

/// Default per-attempt timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(2000);

/// Default number of retransmissions after the first attempt.
pub const DEFAULT_RETRIES: u32 = 3;

/// SNMPv1/v2c endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CommunityTarget {
    pub address: SocketAddr,
    pub version: Version,
    pub community: Bytes,
    pub timeout: Duration,
    pub retries: u32,
}

impl CommunityTarget {
    /// SNMPv2c target with default timeout and retries.
    pub fn new(address: SocketAddr, community: impl Into<Bytes>) -> Self {
        Self {
            address,
            version: Version::V2c,
            community: community.into(),
            timeout: DEFAULT_TIMEOUT,
            retries: DEFAULT_RETRIES,
        }
    }

    pub fn version(mut self, version: Version) -> Self {
        self.version = version;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }
}

/// SNMPv3 USM endpoint. The user must be present in the dispatcher's
/// [`UserTable`](crate::v3::UserTable).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct UserTarget {
    pub address: SocketAddr,
    pub security_name: Bytes,
    pub security_level: SecurityLevel,
    pub context_name: Bytes,
    pub timeout: Duration,
    pub retries: u32,
}

impl UserTarget {
    pub fn new(address: SocketAddr, security_name: impl Into<Bytes>, security_level: SecurityLevel) -> Self {
        Self {
            address,
            security_name: security_name.into(),
            security_level,
            context_name: Bytes::new(),
            timeout: DEFAULT_TIMEOUT,
            retries: DEFAULT_RETRIES,
        }
    }

    pub fn context_name(mut self, name: impl Into<Bytes>) -> Self {
        self.context_name = name.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }
}

/// Either kind of target.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Target {
    Community(CommunityTarget),
    User(UserTarget),
}

impl Target {
    pub fn address(&self) -> SocketAddr {
        match self {
            Self::Community(t) => t.address,
            Self::User(t) => t.address,
        }
    }

    pub fn version(&self) -> Version {
        match self {
            Self::Community(t) => t.version,
            Self::User(_) => Version::V3,
        }
    }

    pub fn timeout(&self) -> Duration {
        match self {
            Self::Community(t) => t.timeout,
            Self::User(t) => t.timeout,
        }
    }

    pub fn retries(&self) -> u32 {
        match self {
            Self::Community(t) => t.retries,
            Self::User(t) => t.retries,
        }
    }
}

impl From<CommunityTarget> for Target {
    fn from(t: CommunityTarget) -> Self {
        Self::Community(t)
    }
}

impl From<UserTarget> for Target {
    fn from(t: UserTarget) -> Self {
        Self::User(t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let addr: SocketAddr = "127.0.0.1:161".parse().unwrap();
        let t: Target = CommunityTarget::new(addr, &b"security"[..]).into();
        assert_eq!(t.version(), Version::V2c);
        assert_eq!(t.retries(), 3);
        assert_eq!(t.timeout(), Duration::from_millis(2000));

        let u: Target = UserTarget::new(addr, &b"security"[..], SecurityLevel::AuthPriv)
            .retries(1)
            .into();
        assert_eq!(u.version(), Version::V3);
        assert_eq!(u.retries(), 1);
        assert_eq!(u.address(), addr);
    }
}
