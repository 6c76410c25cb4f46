//! Sync Module
//!
//! Concurrent primitives the cache is built on.

mod map;

pub use map::{ConcurrentMap, Iter, Keys, Values};
