use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use futures::future::{BoxFuture, Shared};
use parking_lot::Mutex;
use tokio::time::Instant;

use super::CacheKey;

/// The outcome of an action execution, shared between all callers attached to it.
///
/// Both sides are reference counted, so every coalesced caller observes the very same value or
/// error instance.
pub type Outcome<T, E> = Result<Arc<T>, Arc<E>>;

pub(crate) type SharedOutcome<T, E> = Shared<BoxFuture<'static, Outcome<T, E>>>;

/// A cached execution, pending or settled.
pub(crate) struct CacheRecord<T, E> {
    /// Distinguishes this record from later ones installed under the same key.
    pub id: u64,
    /// The shared handle every dispatch for this key attaches to.
    pub value: SharedOutcome<T, E>,
    /// When this record stops being served. `None` never expires by time.
    pub expires_at: Option<Instant>,
}

impl<T, E> CacheRecord<T, E> {
    /// A record is still served at exactly its expiry instant.
    pub fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|expires_at| now > expires_at)
    }

    pub fn is_settled(&self) -> bool {
        self.value.peek().is_some()
    }
}

impl<T, E> fmt::Debug for CacheRecord<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheRecord")
            .field("id", &self.id)
            .field("settled", &self.is_settled())
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// The mapping from [`CacheKey`] to [`CacheRecord`] owned by one cache.
///
/// Expiry is never enforced here. Readers compare against [`CacheRecord::expires_at`], and an
/// expired record stays until it is replaced, deleted or cleared.
pub(crate) struct CacheStore<T, E> {
    records: HashMap<CacheKey, CacheRecord<T, E>>,
    next_id: u64,
}

impl<T, E> Default for CacheStore<T, E> {
    fn default() -> Self {
        Self {
            records: HashMap::new(),
            next_id: 0,
        }
    }
}

impl<T, E> fmt::Debug for CacheStore<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.records.iter()).finish()
    }
}

impl<T, E> CacheStore<T, E> {
    pub fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    pub fn get(&self, key: &CacheKey) -> Option<&CacheRecord<T, E>> {
        self.records.get(key)
    }

    /// Installs a record, replacing any previous one under the same key.
    pub fn insert(&mut self, key: CacheKey, record: CacheRecord<T, E>) {
        self.records.insert(key, record);
    }

    pub fn remove(&mut self, key: &CacheKey) -> bool {
        self.records.remove(key).is_some()
    }

    /// Removes the record under `key` only if it is still the record with the given `id`.
    pub fn remove_record(&mut self, key: &CacheKey, id: u64) -> bool {
        match self.records.get(key) {
            Some(record) if record.id == id => self.remove(key),
            _ => false,
        }
    }

    /// Removes all records of `action`, and reports whether there were any.
    pub fn remove_action(&mut self, action: &str) -> bool {
        let before = self.records.len();
        self.records.retain(|key, _| key.action() != action);
        self.records.len() != before
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn keys(&self) -> impl Iterator<Item = &CacheKey> {
        self.records.keys()
    }
}

/// A read-only, live view of a cache's records, for diagnostics and tests.
///
/// The view is not a snapshot: every method reads the current contents of the cache.
pub struct CacheState<T, E> {
    store: Arc<Mutex<CacheStore<T, E>>>,
}

impl<T, E> CacheState<T, E> {
    pub(crate) fn new(store: Arc<Mutex<CacheStore<T, E>>>) -> Self {
        Self { store }
    }

    /// The number of records, including expired ones that were not replaced yet.
    pub fn len(&self) -> usize {
        self.store.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All keys, sorted.
    pub fn keys(&self) -> Vec<CacheKey> {
        let mut keys: Vec<_> = self.store.lock().keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.store.lock().get(key).is_some()
    }

    /// Whether the execution behind `key` has finished, or `None` if there is no such record.
    pub fn is_settled(&self, key: &CacheKey) -> Option<bool> {
        self.store.lock().get(key).map(CacheRecord::is_settled)
    }
}

impl<T, E> Clone for CacheState<T, E> {
    fn clone(&self) -> Self {
        Self::new(Arc::clone(&self.store))
    }
}

impl<T, E> fmt::Debug for CacheState<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.store.lock(), f)
    }
}
