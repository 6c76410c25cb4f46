//! Cache Module
//!
//! Provides the in-memory TTL cache: entries, per-entry expiry and statistics.

mod entry;
mod stats;
mod store;


// Re-export public types
pub use entry::CacheEntry;
pub use stats::{CacheStats, StatsSnapshot};
pub use store::TtlCache;
