//! Error types for the cache client
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Store Error Enum ==
/// Failures raised by a store backend.
///
/// These are propagated to callers of the cache client unchanged, wrapped in
/// [`CacheError::Store`].
#[derive(Error, Debug)]
pub enum StoreError {
    /// Error returned by the Redis driver (network, protocol, timeout)
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// A command was issued while the connection was closed
    #[error("Store connection is not open")]
    NotConnected,

    /// The key pattern could not be compiled
    #[error("Invalid key pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// An atomic batch was rejected and none of its commands were applied
    #[error("Atomic batch aborted: {0}")]
    BatchAborted(String),
}

// == Cache Error Enum ==
/// Unified error type for the cache client.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Connection target missing or specified twice
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Bulk write larger than the configured capacity bound
    #[error("Bulk write of {entries} entries exceeds capacity of {capacity}")]
    CapacityExceeded { entries: usize, capacity: usize },

    /// Stored payload could not be parsed according to its type tag
    #[error("Failed to decode cached value{}: {reason}", key_suffix(.key))]
    Decode {
        /// Fully-qualified store key, when the payload came from the store
        key: Option<String>,
        reason: String,
    },

    /// NaN and infinities have no stable string form
    #[error("Non-finite numbers cannot be cached")]
    NonFiniteNumber,

    /// Element type of an untyped empty array cannot be derived
    #[error("Cannot derive the element type of an empty sequence")]
    EmptySequence,

    /// Untyped array whose elements are not all of the same kind
    #[error("Sequence elements must all be of the same kind")]
    MixedSequence,

    /// JSON value with no cache representation (null, nested arrays)
    #[error("Unsupported value: {0}")]
    UnsupportedValue(String),

    /// Failure from the underlying store
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl CacheError {
    /// Decode failure not yet tied to a store key.
    pub fn decode(reason: impl Into<String>) -> Self {
        CacheError::Decode {
            key: None,
            reason: reason.into(),
        }
    }

    /// Attaches the store key to a decode failure; other errors pass through.
    pub fn at_key(self, full_key: &str) -> Self {
        match self {
            CacheError::Decode { key: None, reason } => CacheError::Decode {
                key: Some(full_key.to_string()),
                reason,
            },
            other => other,
        }
    }
}

fn key_suffix(key: &Option<String>) -> String {
    key.as_deref()
        .map(|key| format!(" at '{key}'"))
        .unwrap_or_default()
}

impl From<redis::RedisError> for CacheError {
    fn from(err: redis::RedisError) -> Self {
        CacheError::Store(StoreError::Redis(err))
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache client.
pub type Result<T> = std::result::Result<T, CacheError>;

/// Result type used by store backends.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_message() {
        let err = CacheError::CapacityExceeded {
            entries: 5,
            capacity: 3,
        };
        assert_eq!(
            err.to_string(),
            "Bulk write of 5 entries exceeds capacity of 3"
        );
    }

    #[test]
    fn test_decode_message_names_key() {
        let err = CacheError::decode("missing type tag separator");
        assert_eq!(
            err.to_string(),
            "Failed to decode cached value: missing type tag separator"
        );

        let err = err.at_key("tests:key1");
        assert_eq!(
            err.to_string(),
            "Failed to decode cached value at 'tests:key1': missing type tag separator"
        );
        assert!(matches!(
            err,
            CacheError::Decode { key: Some(ref k), .. } if k == "tests:key1"
        ));
    }

    #[test]
    fn test_at_key_leaves_other_errors() {
        let err = CacheError::NonFiniteNumber.at_key("k");
        assert!(matches!(err, CacheError::NonFiniteNumber));
    }

    #[test]
    fn test_store_error_is_transparent() {
        let err: CacheError = StoreError::NotConnected.into();
        assert_eq!(err.to_string(), "Store connection is not open");
        assert!(matches!(err, CacheError::Store(StoreError::NotConnected)));
    }
}
