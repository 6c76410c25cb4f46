//! Background Tasks Module
//!
//! Tokio tasks that run alongside the cache.
//!
//! # Tasks
//! - Expiry timers: one cancellable task per stored entry
//! - Stats reporter: logs cache statistics at a fixed interval

mod reporter;
pub(crate) mod timer;

pub use reporter::spawn_stats_reporter;
pub use timer::{Scheduler, TimerHandle, TimerRelease};
