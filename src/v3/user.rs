//! USM user table (RFC 3414 section 2.1, usmUserTable).
//!
//! Users are built once with a typestate builder: privacy can only be added
//! after authentication, so an invalid priv-without-auth user cannot be
//! expressed.
//!
//! ```
//! use snmp_dispatch::v3::{AuthProtocol, PrivProtocol, UsmUser};
//!
//! let user = UsmUser::builder("security")
//!     .auth(AuthProtocol::Sha512, "password12#$")
//!     .privacy(PrivProtocol::Aes256, "password12#$%")
//!     .build();
//! assert_eq!(user.security_level(), snmp_dispatch::message::SecurityLevel::AuthPriv);
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use bytes::Bytes;

use super::auth::{LocalizedKey, MasterKey};
use super::privacy::PrivKey;
use super::{AuthProtocol, PrivProtocol};
use crate::message::SecurityLevel;

/// A provisioned USM user with its non-localized keys.
#[derive(Debug, Clone)]
pub struct UsmUser {
    name: Bytes,
    engine_id: Option<Bytes>,
    auth: Option<MasterKey>,
    privacy: Option<(PrivProtocol, MasterKey)>,
}

impl UsmUser {
    pub fn builder(name: impl Into<Bytes>) -> UsmUserBuilder {
        UsmUserBuilder {
            name: name.into(),
            engine_id: None,
        }
    }

    pub fn name(&self) -> &Bytes {
        &self.name
    }

    /// Engine this entry is restricted to, if any.
    pub fn engine_id(&self) -> Option<&Bytes> {
        self.engine_id.as_ref()
    }

    pub fn auth_protocol(&self) -> Option<AuthProtocol> {
        self.auth.as_ref().map(MasterKey::protocol)
    }

    pub fn priv_protocol(&self) -> Option<PrivProtocol> {
        self.privacy.as_ref().map(|(p, _)| *p)
    }

    /// Highest level this user can operate at.
    pub fn security_level(&self) -> SecurityLevel {
        match (&self.auth, &self.privacy) {
            (Some(_), Some(_)) => SecurityLevel::AuthPriv,
            (Some(_), None) => SecurityLevel::AuthNoPriv,
            _ => SecurityLevel::NoAuthNoPriv,
        }
    }

    /// Localize this user's keys to `engine_id`.
    pub fn localize(self: &Arc<Self>, engine_id: &[u8]) -> UserKeys {
        let auth = self.auth.as_ref().map(|m| m.localize(engine_id));
        let privacy = self
            .privacy
            .as_ref()
            .map(|(proto, master)| PrivKey::from_master_key(master, *proto, engine_id));
        UserKeys {
            user: Arc::clone(self),
            engine_id: Bytes::copy_from_slice(engine_id),
            auth,
            privacy,
        }
    }
}

/// Builder for a noAuthNoPriv user; call [`auth`](Self::auth) to add
/// authentication.
#[derive(Debug)]
pub struct UsmUserBuilder {
    name: Bytes,
    engine_id: Option<Bytes>,
}

impl UsmUserBuilder {
    /// Restrict the entry to one authoritative engine.
    pub fn engine_id(mut self, engine_id: impl Into<Bytes>) -> Self {
        self.engine_id = Some(engine_id.into());
        self
    }

    pub fn auth(self, protocol: AuthProtocol, password: impl AsRef<[u8]>) -> UsmAuthUserBuilder {
        UsmAuthUserBuilder {
            name: self.name,
            engine_id: self.engine_id,
            auth: MasterKey::from_password(protocol, password.as_ref()),
        }
    }

    pub fn build(self) -> UsmUser {
        UsmUser {
            name: self.name,
            engine_id: self.engine_id,
            auth: None,
            privacy: None,
        }
    }
}

/// Builder for an authNoPriv user.
#[derive(Debug)]
pub struct UsmAuthUserBuilder {
    name: Bytes,
    engine_id: Option<Bytes>,
    auth: MasterKey,
}

impl UsmAuthUserBuilder {
    pub fn engine_id(mut self, engine_id: impl Into<Bytes>) -> Self {
        self.engine_id = Some(engine_id.into());
        self
    }

    /// Add privacy. The privacy master key is derived with the
    /// authentication hash.
    pub fn privacy(self, protocol: PrivProtocol, password: impl AsRef<[u8]>) -> UsmPrivUserBuilder {
        let master = MasterKey::from_password(self.auth.protocol(), password.as_ref());
        UsmPrivUserBuilder {
            name: self.name,
            engine_id: self.engine_id,
            auth: self.auth,
            privacy: (protocol, master),
        }
    }

    pub fn build(self) -> UsmUser {
        UsmUser {
            name: self.name,
            engine_id: self.engine_id,
            auth: Some(self.auth),
            privacy: None,
        }
    }
}

/// Builder for an authPriv user.
#[derive(Debug)]
pub struct UsmPrivUserBuilder {
    name: Bytes,
    engine_id: Option<Bytes>,
    auth: MasterKey,
    privacy: (PrivProtocol, MasterKey),
}

impl UsmPrivUserBuilder {
    pub fn engine_id(mut self, engine_id: impl Into<Bytes>) -> Self {
        self.engine_id = Some(engine_id.into());
        self
    }

    pub fn build(self) -> UsmUser {
        UsmUser {
            name: self.name,
            engine_id: self.engine_id,
            auth: Some(self.auth),
            privacy: Some(self.privacy),
        }
    }
}

/// Keys of one user localized to one engine.
#[derive(Debug)]
pub struct UserKeys {
    pub user: Arc<UsmUser>,
    pub engine_id: Bytes,
    pub auth: Option<LocalizedKey>,
    pub privacy: Option<PrivKey>,
}

impl UserKeys {
    /// Whether these keys can process a message at `level`.
    pub fn supports(&self, level: SecurityLevel) -> bool {
        match level {
            SecurityLevel::NoAuthNoPriv => true,
            SecurityLevel::AuthNoPriv => self.auth.is_some(),
            SecurityLevel::AuthPriv => self.auth.is_some() && self.privacy.is_some(),
        }
    }
}

type KeyCacheKey = (Bytes, Bytes);

/// Users known to this dispatcher, with a cache of localized keys.
#[derive(Debug, Default)]
pub struct UserTable {
    users: RwLock<HashMap<Bytes, Vec<Arc<UsmUser>>>>,
    localized: Mutex<HashMap<KeyCacheKey, Arc<UserKeys>>>,
}

impl UserTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a user. An existing entry with the same name and engine
    /// restriction is replaced.
    pub fn add(&self, user: UsmUser) {
        let name = user.name.clone();
        {
            let mut users = self.users.write().unwrap_or_else(|e| e.into_inner());
            let entries = users.entry(name.clone()).or_default();
            entries.retain(|u| u.engine_id != user.engine_id);
            entries.push(Arc::new(user));
        }
        self.localized
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .retain(|(n, _), _| *n != name);
    }

    pub fn remove(&self, name: &[u8]) -> bool {
        let removed = self
            .users
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(name)
            .is_some();
        self.localized
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .retain(|(n, _), _| n.as_ref() != name);
        removed
    }

    /// Find the entry for `name` usable with `engine_id`, preferring one
    /// restricted to that engine.
    pub fn get(&self, name: &[u8], engine_id: &[u8]) -> Option<Arc<UsmUser>> {
        let users = self.users.read().unwrap_or_else(|e| e.into_inner());
        let entries = users.get(name)?;
        entries
            .iter()
            .find(|u| u.engine_id.as_deref() == Some(engine_id))
            .or_else(|| entries.iter().find(|u| u.engine_id.is_none()))
            .cloned()
    }

    pub fn contains(&self, name: &[u8]) -> bool {
        self.users
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.users.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Localized keys for (`name`, `engine_id`), derived on first use.
    pub fn keys(&self, name: &[u8], engine_id: &[u8]) -> Option<Arc<UserKeys>> {
        let user = self.get(name, engine_id)?;
        let keys = self.candidate_keys(&user, engine_id);
        self.remember(&keys);
        Some(keys)
    }

    /// Keys for `user` at `engine_id`, from the cache if present.
    /// A miss localizes without caching; call [`remember`](Self::remember)
    /// once the keys have authenticated something.
    pub(crate) fn candidate_keys(&self, user: &Arc<UsmUser>, engine_id: &[u8]) -> Arc<UserKeys> {
        let cached = self
            .localized
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&(user.name.clone(), Bytes::copy_from_slice(engine_id)))
            .filter(|keys| Arc::ptr_eq(&keys.user, user))
            .cloned();
        // Localization runs outside the lock.
        cached.unwrap_or_else(|| Arc::new(user.localize(engine_id)))
    }

    pub(crate) fn remember(&self, keys: &Arc<UserKeys>) {
        self.localized
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry((keys.user.name.clone(), keys.engine_id.clone()))
            .or_insert_with(|| Arc::clone(keys));
    }

    pub(crate) fn cached_key_count(&self) -> usize {
        self.localized.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}
