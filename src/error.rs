//! Error types for the cache
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the cache.
///
/// Key absence is never an error; lookups return `Option`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// No timer could be armed for a new entry, so the entry was not inserted
    #[error("Scheduler unavailable: {0}")]
    SchedulerUnavailable(String),
}

// == Result Type Alias ==
/// Convenience Result type for the cache.
pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CacheError::SchedulerUnavailable("no runtime".to_string());
        assert_eq!(err.to_string(), "Scheduler unavailable: no runtime");
    }
}
