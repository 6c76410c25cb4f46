//! Cache Store Module
//!
//! TTL cache engine: a concurrent map of entries, each paired with a timer
//! that evicts it.
//!
//! Eviction is keyed on entry identity. A timer only ever removes the exact
//! entry it was armed for (compare-and-delete on the entry id), so a timer
//! that loses the race against an overwrite can never take the newer entry
//! with it. Timers are also released only after their entry is installed,
//! so a zero TTL cannot fire before the entry exists.

use std::fmt;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::runtime::Handle;
use tracing::debug;

use crate::cache::{CacheEntry, CacheStats, StatsSnapshot};
use crate::error::{CacheError, Result};
use crate::sync::ConcurrentMap;
use crate::tasks::{Scheduler, TimerRelease};

type Slot<V> = Arc<CacheEntry<V>>;

struct Inner<K, V> {
    entries: ConcurrentMap<K, Slot<V>>,
    scheduler: Scheduler,
    next_id: AtomicU64,
    stats: CacheStats,
}

impl<K, V> Inner<K, V>
where
    K: Eq + Hash,
{
    /// Timer callback: removes `key` only if it still holds entry `id`.
    fn expire(&self, key: &K, id: u64) {
        let Some(current) = self.entries.load(key) else {
            return;
        };
        if current.id() != id {
            debug!(id, current = current.id(), "stale expiry ignored");
            return;
        }
        if self.entries.compare_and_delete(key, &current) {
            self.stats.record_expiration();
            debug!(id, "entry expired");
        }
    }
}

// == TTL Cache ==
/// Concurrent key-value cache where every entry expires on its own timer.
///
/// Cloning is cheap and clones share the same storage. When the last clone
/// is dropped every pending timer is cancelled.
///
/// Timers run on tokio. A cache created inside a runtime binds to it;
/// otherwise use [`TtlCache::with_handle`] or call `store` from within a
/// runtime.
pub struct TtlCache<K, V> {
    inner: Arc<Inner<K, V>>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    // == Constructor ==
    /// Creates an empty cache bound to the current tokio runtime, if any.
    pub fn new() -> Self {
        Self::with_scheduler(Scheduler::current())
    }

    /// Creates an empty cache whose timers run on `handle`.
    pub fn with_handle(handle: Handle) -> Self {
        Self::with_scheduler(Scheduler::with_handle(handle))
    }

    fn with_scheduler(scheduler: Scheduler) -> Self {
        Self {
            inner: Arc::new(Inner {
                entries: ConcurrentMap::new(),
                scheduler,
                next_id: AtomicU64::new(1),
                stats: CacheStats::new(),
            }),
        }
    }

    // == Store ==
    /// Stores `value` under `key` for `ttl`, replacing any existing entry.
    ///
    /// The replaced entry's timer is cancelled. Returns the value that was
    /// live at `key` before the call, if any. A zero `ttl` stores an entry
    /// that is already expired and gets evicted on the next timer tick.
    ///
    /// Fails only if no timer can be scheduled; nothing is inserted then.
    pub fn store(&self, key: K, value: V, ttl: Duration) -> Result<Option<V>> {
        let (entry, release) = self.new_entry(&key, value, ttl)?;
        let id = entry.id();

        let previous = self.inner.entries.swap(key.clone(), Arc::clone(&entry));
        self.start_timer(&key, &entry, release)?;
        self.inner.stats.record_store();
        debug!(id, ?ttl, "entry stored");

        let Some(previous) = previous else {
            return Ok(None);
        };
        if previous.cancel_timer() {
            self.inner.stats.record_cancelled_timer();
        }
        if previous.is_expired() {
            return Ok(None);
        }
        self.inner.stats.record_replacement();
        debug!(id, replaced = previous.id(), "entry replaced");
        Ok(Some(previous.value().clone()))
    }

    // == Load Or Store ==
    /// Stores `value` for `ttl` only if `key` holds no live entry.
    ///
    /// Returns `(actual, loaded)`: when `loaded` is true, `actual` is the
    /// existing value and nothing changed; otherwise `actual` is `value`.
    pub fn load_or_store(&self, key: K, value: V, ttl: Duration) -> Result<(V, bool)> {
        let (entry, release) = self.new_entry(&key, value, ttl)?;

        loop {
            let (actual, loaded) = self
                .inner
                .entries
                .load_or_store(key.clone(), Arc::clone(&entry));
            if !loaded {
                self.start_timer(&key, &entry, release)?;
                self.inner.stats.record_store();
                return Ok((entry.value().clone(), false));
            }
            if !actual.is_expired() {
                // `entry` and `release` drop here, discarding the new timer
                return Ok((actual.value().clone(), true));
            }
            // A dead entry awaiting its timer counts as absent
            if self
                .inner
                .entries
                .compare_and_swap(&key, &actual, Arc::clone(&entry))
            {
                self.start_timer(&key, &entry, release)?;
                if actual.cancel_timer() {
                    self.inner.stats.record_cancelled_timer();
                }
                self.inner.stats.record_store();
                return Ok((entry.value().clone(), false));
            }
        }
    }

    fn new_entry(&self, key: &K, value: V, ttl: Duration) -> Result<(Slot<V>, TimerRelease)> {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let cache = Arc::downgrade(&self.inner);
        let key = key.clone();

        let (timer, release) = self
            .inner
            .scheduler
            .arm(ttl, move || expire_callback(&cache, &key, id))?;
        Ok((Arc::new(CacheEntry::new(id, value, timer)), release))
    }

    /// Releases the timer of `entry`, already installed at `key`.
    ///
    /// If the runtime went down since arming, the timer can never fire, so
    /// the entry is taken back out and the call fails.
    fn start_timer(&self, key: &K, entry: &Slot<V>, release: TimerRelease) -> Result<()> {
        // A cancelled timer means a concurrent writer already displaced `entry`
        if release.release() || !entry.timer_armed() {
            return Ok(());
        }
        self.inner.entries.compare_and_delete(key, entry);
        Err(CacheError::SchedulerUnavailable(
            "runtime shut down before the timer started".to_string(),
        ))
    }
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    // == Load ==
    /// Returns the live value at `key`. Reading never extends the TTL.
    pub fn load(&self, key: &K) -> Option<V> {
        let value = self
            .inner
            .entries
            .load(key)
            .filter(|entry| !entry.is_expired())
            .map(|entry| entry.value().clone());

        if value.is_some() {
            self.inner.stats.record_hit();
        } else {
            self.inner.stats.record_miss();
        }
        value
    }

    // == Delete ==
    /// Removes the entry at `key` and cancels its timer.
    ///
    /// Returns the removed value if it was still live.
    pub fn delete(&self, key: &K) -> Option<V> {
        let entry = self.inner.entries.load_and_delete(key)?;
        if entry.cancel_timer() {
            self.inner.stats.record_cancelled_timer();
        }
        if entry.is_expired() {
            return None;
        }
        self.inner.stats.record_delete();
        debug!(id = entry.id(), "entry deleted");
        Some(entry.value().clone())
    }

    /// Time left before the entry at `key` expires.
    pub fn ttl_remaining(&self, key: &K) -> Option<Duration> {
        self.inner
            .entries
            .load(key)
            .filter(|entry| !entry.is_expired())
            .map(|entry| entry.ttl_remaining())
    }

    // == Iteration ==
    /// Lazily yields every live `(key, value)` pair.
    ///
    /// Weakly consistent: entries stored or removed while iterating may or
    /// may not be seen, but no key is yielded twice. The cache may be
    /// mutated from inside the loop.
    pub fn iter(&self) -> impl Iterator<Item = (K, V)> + '_ {
        self.inner
            .entries
            .iter()
            .filter(|(_, entry)| !entry.is_expired())
            .map(|(key, entry)| (key, entry.value().clone()))
    }

    /// Lazily yields every live key.
    pub fn keys(&self) -> impl Iterator<Item = K> + '_ {
        self.inner
            .entries
            .iter()
            .filter(|(_, entry)| !entry.is_expired())
            .map(|(key, _)| key)
    }

    /// Lazily yields every live value.
    pub fn values(&self) -> impl Iterator<Item = V> + '_ {
        self.inner
            .entries
            .values()
            .filter(|entry| !entry.is_expired())
            .map(|entry| entry.value().clone())
    }

    // == Clear ==
    /// Removes every entry, cancelling all pending timers.
    pub fn clear(&self) {
        let stats = &self.inner.stats;
        self.inner.entries.retain(|_, entry| {
            if entry.cancel_timer() {
                stats.record_cancelled_timer();
            }
            false
        });
    }

    // == Length ==
    /// Number of entries held, including expired ones whose timer has not
    /// run yet.
    pub fn len(&self) -> usize {
        self.inner.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.entries.is_empty()
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> StatsSnapshot {
        self.inner.stats.snapshot(self.inner.entries.len())
    }
}

fn expire_callback<K, V>(cache: &Weak<Inner<K, V>>, key: &K, id: u64)
where
    K: Eq + Hash,
{
    // Cache already dropped: nothing left to evict
    if let Some(inner) = cache.upgrade() {
        inner.expire(key, id);
    }
}

impl<K, V> Clone for TtlCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, V> Default for TtlCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> fmt::Debug for TtlCache<K, V>
where
    K: Eq + Hash,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TtlCache")
            .field("entries", &self.inner.entries)
            .field("scheduler", &self.inner.scheduler)
            .finish()
    }
}
