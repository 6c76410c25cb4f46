//! ttlcache - A generic, concurrency-safe in-memory TTL cache
//!
//! Every entry carries its own expiry timer. Overwriting or deleting an
//! entry cancels its pending timer, and a timer only ever evicts the exact
//! entry it was armed for.

pub mod cache;
pub mod config;
pub mod error;
pub mod sync;
pub mod tasks;
pub mod workload;

pub use cache::{StatsSnapshot, TtlCache};
pub use config::Config;
pub use error::{CacheError, Result};
pub use sync::ConcurrentMap;
pub use tasks::spawn_stats_reporter;
