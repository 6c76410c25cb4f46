//! Cache Entry Module
//!
//! A stored value bundled with the timer that will evict it.

use std::time::Duration;

use tokio::time::Instant;

use crate::tasks::TimerHandle;

// == Cache Entry ==
/// A single cache entry.
///
/// Entries are identified by `id`, a generation number unique within one
/// cache. Two entries are equal iff their ids are equal, so a replaced
/// entry never compares equal to its replacement even when the values
/// match. The timer is owned by the entry alone; the scheduled task only
/// knows the key and the id.
#[derive(Debug)]
pub struct CacheEntry<V> {
    id: u64,
    value: V,
    expires_at: Instant,
    timer: TimerHandle,
}

impl<V> CacheEntry<V> {
    // == Constructor ==
    /// The entry expires exactly at `timer`'s deadline.
    pub fn new(id: u64, value: V, timer: TimerHandle) -> Self {
        Self {
            id,
            value,
            expires_at: timer.deadline(),
            timer,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn value(&self) -> &V {
        &self.value
    }

    // == Is Expired ==
    /// True once the TTL has fully elapsed, whether or not the timer has
    /// removed the entry yet.
    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }

    /// Time left before expiry, zero once expired.
    pub fn ttl_remaining(&self) -> Duration {
        self.expires_at.saturating_duration_since(Instant::now())
    }

    /// Cancels the eviction timer. Returns true if it was still pending.
    pub fn cancel_timer(&self) -> bool {
        self.timer.cancel()
    }

    /// True while the eviction timer is neither cancelled nor fired.
    pub fn timer_armed(&self) -> bool {
        self.timer.is_armed()
    }
}

impl<V> PartialEq for CacheEntry<V> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<V> Eq for CacheEntry<V> {}
