//! Concurrent Map Module
//!
//! Generic thread-safe associative store built on a sharded `DashMap`.
//! Tuned for the typical cache pattern: many distinct keys, read-mostly,
//! rare overwrites.

use std::fmt;
use std::hash::Hash;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

// == Concurrent Map ==
/// A thread-safe map with atomic per-key primitives.
///
/// Every operation is atomic with respect to a single key. Operations on
/// different keys never block each other beyond sharing a shard lock for
/// the duration of one call.
pub struct ConcurrentMap<K, V> {
    inner: DashMap<K, V>,
}

impl<K, V> ConcurrentMap<K, V>
where
    K: Eq + Hash,
{
    // == Constructor ==
    /// Creates an empty map.
    pub fn new() -> Self {
        Self {
            inner: DashMap::new(),
        }
    }

    /// Creates an empty map with room for at least `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: DashMap::with_capacity(capacity),
        }
    }

    // == Store ==
    /// Unconditional upsert.
    pub fn store(&self, key: K, value: V) {
        self.inner.insert(key, value);
    }

    // == Delete ==
    /// Removes `key` if present.
    pub fn delete(&self, key: &K) {
        self.inner.remove(key);
    }

    // == Load And Delete ==
    /// Removes `key`, returning the value it held.
    pub fn load_and_delete(&self, key: &K) -> Option<V> {
        self.inner.remove(key).map(|(_, value)| value)
    }

    // == Swap ==
    /// Atomically replaces the value at `key`, returning the previous one.
    ///
    /// `None` means the key was absent and `value` was inserted.
    pub fn swap(&self, key: K, value: V) -> Option<V> {
        self.inner.insert(key, value)
    }

    /// Returns true if `key` is present.
    pub fn contains_key(&self, key: &K) -> bool {
        self.inner.contains_key(key)
    }

    /// Number of entries currently stored.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns true if the map holds no entries.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Removes every entry.
    pub fn clear(&self) {
        self.inner.clear();
    }

    /// Keeps only the entries for which `f` returns true.
    pub fn retain(&self, f: impl FnMut(&K, &mut V) -> bool) {
        self.inner.retain(f);
    }
}

impl<K, V> ConcurrentMap<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    // == Load ==
    /// Returns a copy of the value stored at `key`.
    pub fn load(&self, key: &K) -> Option<V> {
        self.inner.get(key).map(|slot| slot.value().clone())
    }

    // == Load Or Store ==
    /// Inserts `value` if `key` is absent, otherwise leaves the existing
    /// value untouched.
    ///
    /// Returns `(actual, loaded)`: `loaded` is true when a value was already
    /// present, in which case `actual` is that value and `value` is dropped.
    pub fn load_or_store(&self, key: K, value: V) -> (V, bool) {
        match self.inner.entry(key) {
            Entry::Occupied(slot) => (slot.get().clone(), true),
            Entry::Vacant(slot) => {
                slot.insert(value.clone());
                (value, false)
            }
        }
    }
}

impl<K, V> ConcurrentMap<K, V>
where
    K: Eq + Hash,
    V: PartialEq,
{
    // == Compare And Swap ==
    /// Replaces the value at `key` with `new` only if it currently equals `old`.
    pub fn compare_and_swap(&self, key: &K, old: &V, new: V) -> bool {
        match self.inner.get_mut(key) {
            Some(mut slot) if *slot == *old => {
                *slot = new;
                true
            }
            _ => false,
        }
    }

    // == Compare And Delete ==
    /// Removes `key` only if its value currently equals `old`.
    pub fn compare_and_delete(&self, key: &K, old: &V) -> bool {
        self.inner.remove_if(key, |_, current| current == old).is_some()
    }
}

impl<K, V> ConcurrentMap<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    // == Iteration ==
    /// Lazily yields every `(key, value)` pair.
    ///
    /// The key set is captured when iteration starts; each value is read
    /// when its key is reached and keys deleted in between are skipped.
    /// Keys inserted after the start are not observed. No lock is held
    /// between items, so the map may be mutated freely while iterating.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            map: self,
            keys: self.snapshot_keys().into_iter(),
        }
    }

    /// Lazily yields every key still present when it is reached.
    pub fn keys(&self) -> Keys<'_, K, V> {
        Keys {
            map: self,
            keys: self.snapshot_keys().into_iter(),
        }
    }

    /// Lazily yields every value.
    pub fn values(&self) -> Values<'_, K, V> {
        Values { inner: self.iter() }
    }

    fn snapshot_keys(&self) -> Vec<K> {
        self.inner.iter().map(|slot| slot.key().clone()).collect()
    }
}

impl<K, V> Default for ConcurrentMap<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> fmt::Debug for ConcurrentMap<K, V>
where
    K: Eq + Hash,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConcurrentMap")
            .field("len", &self.inner.len())
            .finish()
    }
}

// == Iterators ==
/// Iterator over `(key, value)` pairs. See [`ConcurrentMap::iter`].
pub struct Iter<'a, K, V> {
    map: &'a ConcurrentMap<K, V>,
    keys: std::vec::IntoIter<K>,
}

impl<K, V> Iterator for Iter<'_, K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    type Item = (K, V);

    fn next(&mut self) -> Option<Self::Item> {
        for key in self.keys.by_ref() {
            if let Some(value) = self.map.load(&key) {
                return Some((key, value));
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, self.keys.size_hint().1)
    }
}

/// Iterator over keys. See [`ConcurrentMap::keys`].
pub struct Keys<'a, K, V> {
    map: &'a ConcurrentMap<K, V>,
    keys: std::vec::IntoIter<K>,
}

impl<K, V> Iterator for Keys<'_, K, V>
where
    K: Eq + Hash,
{
    type Item = K;

    fn next(&mut self) -> Option<Self::Item> {
        let map = self.map;
        self.keys.by_ref().find(|key| map.contains_key(key))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, self.keys.size_hint().1)
    }
}

/// Iterator over values. See [`ConcurrentMap::values`].
pub struct Values<'a, K, V> {
    inner: Iter<'a, K, V>,
}

impl<K, V> Iterator for Values<'_, K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    type Item = V;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, value)| value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}
