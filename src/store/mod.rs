//! Store Module
//!
//! The key-value store the cache client delegates to, plus its backends.
//!
//! # Backends
//! - [`RedisStore`]: Redis over an auto-reconnecting async connection
//! - [`MemoryStore`]: in-process map with TTL, used for tests and local runs

mod entry;
mod memory;
mod redis;

use async_trait::async_trait;

use crate::error::StoreResult;

pub use entry::StoredEntry;
pub use memory::MemoryStore;
pub use self::redis::RedisStore;

// == Write Op ==
/// A single command inside an atomic batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOp {
    /// Store `value` at `key`, expiring after `ttl` seconds when set
    Set {
        key: String,
        value: String,
        ttl: Option<u64>,
    },
    /// Remove `key`
    Delete { key: String },
    /// Push the expiry of an existing `key` out to `ttl` seconds from now.
    /// Never shortens an expiry and never adds one to a persistent key.
    Expire { key: String, ttl: u64 },
}

// == Key Value Store ==
/// Capability surface required from a store backend.
///
/// Connection lifecycle calls are idempotent. Data calls made while the
/// store is closed fail with [`StoreError::NotConnected`](crate::error::StoreError::NotConnected);
/// opening the connection is the caller's job.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Opens the connection if it is not already open.
    async fn connect(&self) -> StoreResult<()>;

    /// Closes the connection without notifying the server.
    async fn disconnect(&self) -> StoreResult<()>;

    /// Asks the server to close the connection, then releases it.
    async fn quit(&self) -> StoreResult<()>;

    fn is_open(&self) -> bool;

    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Reads several keys at once. The result is aligned with `keys`.
    async fn mget(&self, keys: &[String]) -> StoreResult<Vec<Option<String>>>;

    async fn set(&self, key: &str, value: &str, ttl: Option<u64>) -> StoreResult<()>;

    async fn del(&self, key: &str) -> StoreResult<()>;

    /// Lists keys matching a glob-style pattern, in no particular order.
    async fn keys(&self, pattern: &str) -> StoreResult<Vec<String>>;

    /// Extends the expiry of `key` with the rules of [`WriteOp::Expire`].
    /// Missing keys are ignored.
    async fn expire(&self, key: &str, ttl: u64) -> StoreResult<()>;

    /// Applies every op or none of them.
    async fn exec_atomic(&self, ops: Vec<WriteOp>) -> StoreResult<()>;
}
