//! Stats Reporter Task
//!
//! Background task that periodically logs cache statistics.

use std::hash::Hash;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::TtlCache;

/// Spawns a background task that logs a stats snapshot every interval.
///
/// The task runs until aborted. Intervals with no cache activity since the
/// previous report are logged at debug level only.
///
/// # Arguments
/// * `cache` - Cache to report on (clones share state, so any clone works)
/// * `interval_secs` - Interval in seconds between reports
///
/// # Returns
/// A JoinHandle for the spawned task, which can be used to abort the task
/// during graceful shutdown.
///
/// # Example
/// ```ignore
/// let cache: TtlCache<u64, u64> = TtlCache::new();
/// let reporter = spawn_stats_reporter(cache.clone(), 1);
/// // Later, during shutdown:
/// reporter.abort();
/// ```
pub fn spawn_stats_reporter<K, V>(cache: TtlCache<K, V>, interval_secs: u64) -> JoinHandle<()>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    let interval = Duration::from_secs(interval_secs.max(1));

    tokio::spawn(async move {
        info!("Starting stats reporter with interval of {:?}", interval);
        let mut previous = cache.stats();

        loop {
            tokio::time::sleep(interval).await;

            let stats = cache.stats();
            let activity = (stats.hits + stats.misses + stats.stores + stats.deletes)
                - (previous.hits + previous.misses + previous.stores + previous.deletes);

            if activity > 0 || stats.expirations != previous.expirations {
                info!(
                    entries = stats.total_entries,
                    hits = stats.hits,
                    misses = stats.misses,
                    stores = stats.stores,
                    expirations = stats.expirations,
                    cancelled_timers = stats.cancelled_timers,
                    hit_rate = format!("{:.3}", stats.hit_rate()),
                    "cache stats"
                );
            } else {
                debug!(entries = stats.total_entries, "cache idle");
            }
            previous = stats;
        }
    })
}
