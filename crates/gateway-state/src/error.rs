//! State store errors.

use thiserror::Error;

/// Result type for state store operations
pub type StateResult<T> = Result<T, StateError>;

/// Error returned by a [`StateStore`](crate::StateStore)
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StateError {
    /// Cache keys must be non-empty
    #[error("cache key must not be empty")]
    EmptyKey,

    /// The entry alone is larger than the whole memory budget
    #[error("cache entry of {size} bytes exceeds the {budget} byte budget")]
    EntryTooLarge {
        /// Accounted entry size
        size: usize,
        /// Configured budget
        budget: usize,
    },

    /// The shared backend failed
    #[error("state backend error: {0}")]
    Backend(String),
}

impl From<redis::RedisError> for StateError {
    fn from(err: redis::RedisError) -> Self {
        Self::Backend(err.to_string())
    }
}
