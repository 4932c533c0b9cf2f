use std::collections::HashMap;
use std::fmt;

use parking_lot::Mutex;

/// A key-value container used by the [`Revalidator`](crate::Revalidator).
///
/// The revalidator owns two of these: one for resolved [`CacheItem`](crate::CacheItem)s and one
/// for pending [`Resolver`](crate::Resolver)s. Absence is always modeled as `None`, never as an
/// error.
///
/// All access to a store goes through the revalidator, which serializes it. Implementations
/// therefore do not need to be clever about concurrency, they only have to be `Sync`.
pub trait Store<V>: Send + Sync {
    /// Returns a copy of the value stored under `key`.
    fn get(&self, key: &str) -> Option<V>;

    /// Stores `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: V);

    /// Removes the value stored under `key`, if any.
    fn delete(&self, key: &str);

    /// Returns all keys currently present, in no particular order.
    fn keys(&self) -> Vec<String>;
}

/// The default [`Store`], a [`HashMap`] behind a mutex.
pub struct MemoryStore<V> {
    map: Mutex<HashMap<String, V>>,
}

impl<V> MemoryStore<V> {
    pub fn new() -> Self {
        Self {
            map: Mutex::new(HashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.map.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.lock().is_empty()
    }
}

impl<V> Default for MemoryStore<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> fmt::Debug for MemoryStore<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryStore")
            .field("entries", &self.len())
            .finish()
    }
}

impl<V> Store<V> for MemoryStore<V>
where
    V: Clone + Send,
{
    fn get(&self, key: &str) -> Option<V> {
        self.map.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: V) {
        self.map.lock().insert(key.to_owned(), value);
    }

    fn delete(&self, key: &str) {
        self.map.lock().remove(key);
    }

    fn keys(&self) -> Vec<String> {
        self.map.lock().keys().cloned().collect()
    }
}
