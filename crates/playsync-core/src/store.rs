use playsync_models::{IdentityKey, IdentityPolicy, MediaSession};
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Last known state of every item seen on one source, keyed by identity.
///
/// Every operation takes the lock for exactly one read or write. Entries are
/// never evicted; the map only grows with the number of distinct items played.
#[derive(Debug, Default)]
pub struct SessionStore {
    policy: IdentityPolicy,
    sessions: RwLock<HashMap<IdentityKey, MediaSession>>,
}

impl SessionStore {
    pub fn new(policy: IdentityPolicy) -> Self {
        Self {
            policy,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn policy(&self) -> IdentityPolicy {
        self.policy
    }

    pub fn key_for(&self, session: &MediaSession) -> IdentityKey {
        IdentityKey::for_session(session, self.policy)
    }

    // A panic while holding the lock cannot leave a half-written entry
    // behind, so a poisoned lock is still safe to use.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<IdentityKey, MediaSession>> {
        self.sessions.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<IdentityKey, MediaSession>> {
        self.sessions.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn get(&self, key: &IdentityKey) -> Option<MediaSession> {
        self.read().get(key).cloned()
    }

    /// Insert or replace the entry for the session's identity.
    pub fn set(&self, session: MediaSession) {
        let key = self.key_for(&session);
        self.write().insert(key, session);
    }

    pub fn set_many(&self, sessions: impl IntoIterator<Item = MediaSession>) {
        let entries: Vec<_> = sessions.into_iter().map(|s| (self.key_for(&s), s)).collect();
        self.write().extend(entries);
    }

    /// Snapshot of every stored session, in no particular order.
    pub fn get_all(&self) -> Vec<MediaSession> {
        self.read().values().cloned().collect()
    }

    pub fn delete(&self, key: &IdentityKey) -> Option<MediaSession> {
        self.write().remove(key)
    }

    pub fn clear(&self) {
        self.write().clear();
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}
