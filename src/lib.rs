//! Typed Cache - A typed key-value cache client for Redis
//!
//! Namespaced keys, type-preserving values, TTL expiry and atomic bulk
//! operations on top of a pluggable key-value store.

pub mod cache;
pub mod config;
pub mod error;
pub mod store;

pub use cache::{CacheClient, CacheValue, SetOptions, TypeTag};
pub use config::{CacheConfig, ConnectionInfo, PoolOptions};
pub use error::{CacheError, Result, StoreError};
pub use store::{KeyValueStore, MemoryStore, RedisStore};
