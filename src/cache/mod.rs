//! Caching layer — an in-memory key/value container and the read-through
//! cache that fronts the "list all users" query.
//!
//! [`Cache`] is a typed map guarded by a single reader/writer lock: lookups
//! share the read side, inserts take the write side, so a reader never sees a
//! half-written value.
//!
//! [`CachedUsers`] memoizes the first successful full-table read under
//! [`ALL_USERS_KEY`] and serves every later read from memory. Writes made
//! through the service do not reach the cache, so once populated the snapshot
//! stays as it was until the process restarts or [`CachedUsers::clear`] is
//! called.
//!
//! Racing callers on a cold cache may each query the store and overwrite each
//! other's entry; there is no single-flight de-duplication.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::store::{StoreError, User, UserRepository};

/// Key under which the full user list is cached.
pub const ALL_USERS_KEY: &str = "all_users";

/// Thread-safe string-keyed map holding values of one type.
pub struct Cache<V> {
    entries: RwLock<HashMap<String, V>>,
}

impl<V> Default for Cache<V> {
    fn default() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl<V: Clone> Cache<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a clone of the value stored under `key`, if any.
    pub fn get(&self, key: &str) -> Option<V> {
        self.entries.read().get(key).cloned()
    }

    /// Stores `value` under `key`, replacing whatever was there.
    pub fn set(&self, key: impl Into<String>, value: V) {
        self.entries.write().insert(key.into(), value);
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Drops every entry.
    pub fn clear(&self) {
        self.entries.write().clear();
    }
}

/// Read-through cache over [`UserRepository::get_all_users`].
pub struct CachedUsers {
    repo: Arc<dyn UserRepository>,
    cache: Cache<Arc<[User]>>,
}

impl CachedUsers {
    pub fn new(repo: Arc<dyn UserRepository>) -> Self {
        Self {
            repo,
            cache: Cache::new(),
        }
    }

    /// Returns the cached user list, loading it from the store on a miss.
    ///
    /// A storage failure is returned as-is and leaves the cache untouched.
    pub fn get_all_users(&self) -> Result<Arc<[User]>, StoreError> {
        if let Some(users) = self.cache.get(ALL_USERS_KEY) {
            debug!(count = users.len(), "users served from cache");
            return Ok(users);
        }

        let users: Arc<[User]> = self.repo.get_all_users()?.into();
        self.cache.set(ALL_USERS_KEY, Arc::clone(&users));
        debug!(count = users.len(), "user cache populated");

        Ok(users)
    }

    /// Returns `true` once a read has populated the cache.
    pub fn is_populated(&self) -> bool {
        self.cache.get(ALL_USERS_KEY).is_some()
    }

    /// Empties the cache so the next read goes to the store.
    pub fn clear(&self) {
        self.cache.clear();
    }
}
