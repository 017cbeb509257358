//! Cache Client Module
//!
//! Public cache API: namespaced keys, typed values, TTL policy and atomic
//! bulk operations over a [`KeyValueStore`].

use std::collections::HashMap;

use tracing::{debug, info, warn};

use crate::cache::codec::{decode, encode};
use crate::cache::{CacheValue, KeyComposer};
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};
use crate::store::{KeyValueStore, RedisStore, WriteOp};

/// Pattern used by [`CacheClient::keys`] when none is given.
pub const DEFAULT_KEY_PATTERN: &str = "*";

// == Set Options ==
/// Per-call options for [`CacheClient::set`] and [`CacheClient::set_many`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetOptions {
    /// Expiry in seconds; overrides the client default. 0 counts as unset.
    pub expiry_in_seconds: Option<u64>,
    /// Second key segment, after the group prefix
    pub sub_group_prefix: Option<String>,
}

impl SetOptions {
    /// Options with no expiry override and no subgroup.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the per-call expiry in seconds.
    pub fn expiry_in_seconds(mut self, seconds: u64) -> Self {
        self.expiry_in_seconds = Some(seconds);
        self
    }

    /// Places the written keys under `prefix`.
    pub fn sub_group_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.sub_group_prefix = Some(prefix.into());
        self
    }
}

// == Cache Client ==
/// Typed cache client.
///
/// The connection is opened lazily by every data operation, so calling
/// [`connect`](Self::connect) is only needed to pre-warm it. The client holds
/// no state besides its configuration and the store's connection and can be
/// shared across tasks behind an `Arc`.
#[derive(Debug)]
pub struct CacheClient<S = RedisStore> {
    store: S,
    keys: KeyComposer,
    default_ttl: Option<u64>,
    max_bulk_entries: Option<usize>,
    extend_expiry_on_touch: bool,
}

impl CacheClient<RedisStore> {
    // == Constructor ==
    /// Creates a Redis-backed client.
    ///
    /// Fails with [`CacheError::Config`] if the config names no connection
    /// target or names both a URL and structured connection info. No network
    /// activity happens here.
    pub fn new(config: CacheConfig) -> Result<Self> {
        let url = config.connection_url()?;
        let store = RedisStore::new(&url, config.pool.clone())
            .map_err(|e| CacheError::Config(format!("invalid connection URL: {e}")))?;
        Ok(Self::with_store(store, &config))
    }
}

impl<S: KeyValueStore> CacheClient<S> {
    /// Creates a client over an existing store.
    ///
    /// The connection target in `config` is ignored; the store already knows
    /// where it points.
    pub fn with_store(store: S, config: &CacheConfig) -> Self {
        Self {
            store,
            keys: KeyComposer::new(config.group_key_prefix.clone()),
            default_ttl: config.effective_default_ttl(),
            max_bulk_entries: config.max_bulk_entries,
            extend_expiry_on_touch: config.extend_expiry_on_touch,
        }
    }

    /// The underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Fully-qualified store key for `key` under `sub_group_prefix`.
    pub fn compose_key(&self, key: &str, sub_group_prefix: Option<&str>) -> String {
        self.keys.compose(key, sub_group_prefix)
    }

    // == Connection Lifecycle ==
    /// Whether the store connection is currently open.
    pub fn is_open(&self) -> bool {
        self.store.is_open()
    }

    /// Opens the connection if it is closed.
    pub async fn connect(&self) -> Result<()> {
        if !self.store.is_open() {
            self.store.connect().await?;
        }
        Ok(())
    }

    /// Closes the connection if it is open.
    pub async fn disconnect(&self) -> Result<()> {
        if self.store.is_open() {
            self.store.disconnect().await?;
        }
        Ok(())
    }

    /// Gracefully closes the connection, releasing server-side resources.
    pub async fn terminate(&self) -> Result<()> {
        if self.store.is_open() {
            self.store.quit().await?;
            info!("Cache client terminated");
        }
        Ok(())
    }

    /// Precondition of every data operation.
    async fn ensure_open(&self) -> Result<()> {
        self.connect().await
    }

    /// Per-call expiry wins over the default TTL; neither means no expiry.
    fn resolve_ttl(&self, options: Option<&SetOptions>) -> Option<u64> {
        options
            .and_then(|o| o.expiry_in_seconds)
            .filter(|ttl| *ttl > 0)
            .or(self.default_ttl)
    }

    // == Keys ==
    /// Lists stored keys matching a glob pattern (`*` when `None`).
    ///
    /// Returned keys are fully-qualified and unordered.
    pub async fn keys(&self, pattern: Option<&str>) -> Result<Vec<String>> {
        self.ensure_open().await?;
        let pattern = pattern.unwrap_or(DEFAULT_KEY_PATTERN);
        let keys = self.store.keys(pattern).await?;
        debug!(pattern, count = keys.len(), "Listed keys");
        Ok(keys)
    }

    // == Get ==
    /// Reads and decodes a single value. Absent or expired keys yield `None`.
    pub async fn get(&self, key: &str, sub_group_prefix: Option<&str>) -> Result<Option<CacheValue>> {
        self.ensure_open().await?;
        let full_key = self.keys.compose(key, sub_group_prefix);

        let raw = self.store.get(&full_key).await?;
        let value = decode(raw.as_deref())
            .map_err(|err| err.at_key(&full_key))
            .inspect_err(|err| warn!(error = %err, "Failed to decode cached value"))?;

        debug!(key = %full_key, hit = value.is_some(), "Cache get");
        if value.is_some() {
            self.touch(vec![full_key]).await?;
        }
        Ok(value)
    }

    // == Get Many ==
    /// Reads several keys with one batched read.
    ///
    /// Every requested key appears in the result; keys that were not found
    /// map to `None`.
    pub async fn get_many<K>(
        &self,
        keys: &[K],
        sub_group_prefix: Option<&str>,
    ) -> Result<HashMap<String, Option<CacheValue>>>
    where
        K: AsRef<str>,
    {
        self.ensure_open().await?;
        if keys.is_empty() {
            return Ok(HashMap::new());
        }

        let full_keys: Vec<String> = keys
            .iter()
            .map(|key| self.keys.compose(key.as_ref(), sub_group_prefix))
            .collect();
        let raw_values = self.store.mget(&full_keys).await?;

        let mut results = HashMap::with_capacity(keys.len());
        let mut found = Vec::new();
        for ((key, full_key), raw) in keys.iter().zip(full_keys).zip(raw_values) {
            let value = decode(raw.as_deref())
                .map_err(|err| err.at_key(&full_key))
                .inspect_err(|err| warn!(error = %err, "Failed to decode cached value"))?;
            if value.is_some() {
                found.push(full_key);
            }
            results.insert(key.as_ref().to_string(), value);
        }

        debug!(requested = keys.len(), found = found.len(), "Cache get_many");
        self.touch(found).await?;
        Ok(results)
    }

    /// Extends keys that were just read to the default TTL, when enabled.
    ///
    /// Expiries only ever grow: a key with a longer remaining lifetime keeps
    /// it, and a key that never expires is left alone.
    async fn touch(&self, full_keys: Vec<String>) -> Result<()> {
        let Some(ttl) = self.default_ttl.filter(|_| self.extend_expiry_on_touch) else {
            return Ok(());
        };

        match full_keys.len() {
            0 => Ok(()),
            1 => Ok(self.store.expire(&full_keys[0], ttl).await?),
            _ => {
                let ops = full_keys
                    .into_iter()
                    .map(|key| WriteOp::Expire { key, ttl })
                    .collect();
                Ok(self.store.exec_atomic(ops).await?)
            }
        }
    }

    // == Set ==
    /// Encodes and stores a single value.
    pub async fn set(
        &self,
        key: &str,
        value: impl Into<CacheValue>,
        options: Option<&SetOptions>,
    ) -> Result<()> {
        let encoded = encode(&value.into())?;
        self.ensure_open().await?;

        let sub_group_prefix = options.and_then(|o| o.sub_group_prefix.as_deref());
        let full_key = self.keys.compose(key, sub_group_prefix);
        let ttl = self.resolve_ttl(options);

        self.store.set(&full_key, &encoded, ttl).await?;
        debug!(key = %full_key, ttl = ?ttl, "Cache set");
        Ok(())
    }

    // == Set Many ==
    /// Stores several values in one atomic batch.
    ///
    /// Fails with [`CacheError::CapacityExceeded`] before touching the store
    /// when the batch is larger than the configured bound. The TTL resolved
    /// from `options` applies to every entry.
    pub async fn set_many<I, K, V>(&self, entries: I, options: Option<&SetOptions>) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<CacheValue>,
    {
        let entries: Vec<(K, CacheValue)> = entries
            .into_iter()
            .map(|(key, value)| (key, value.into()))
            .collect();

        if let Some(capacity) = self.max_bulk_entries {
            if entries.len() > capacity {
                warn!(
                    entries = entries.len(),
                    capacity, "Rejected bulk write over capacity"
                );
                return Err(CacheError::CapacityExceeded {
                    entries: entries.len(),
                    capacity,
                });
            }
        }

        let sub_group_prefix = options.and_then(|o| o.sub_group_prefix.as_deref());
        let ttl = self.resolve_ttl(options);
        let ops = entries
            .iter()
            .map(|(key, value)| -> Result<WriteOp> {
                Ok(WriteOp::Set {
                    key: self.keys.compose(key.as_ref(), sub_group_prefix),
                    value: encode(value)?,
                    ttl,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        self.ensure_open().await?;
        if ops.is_empty() {
            return Ok(());
        }

        let count = ops.len();
        self.store.exec_atomic(ops).await?;
        debug!(count, ttl = ?ttl, "Cache set_many");
        Ok(())
    }

    // == Delete ==
    /// Removes a single key. Missing keys are not an error.
    pub async fn delete(&self, key: &str, sub_group_prefix: Option<&str>) -> Result<()> {
        self.ensure_open().await?;
        let full_key = self.keys.compose(key, sub_group_prefix);
        self.store.del(&full_key).await?;
        debug!(key = %full_key, "Cache delete");
        Ok(())
    }

    // == Delete Many ==
    /// Removes several keys in one atomic batch.
    pub async fn delete_many<K>(&self, keys: &[K], sub_group_prefix: Option<&str>) -> Result<()>
    where
        K: AsRef<str>,
    {
        self.ensure_open().await?;
        if keys.is_empty() {
            return Ok(());
        }

        let ops: Vec<WriteOp> = keys
            .iter()
            .map(|key| WriteOp::Delete {
                key: self.keys.compose(key.as_ref(), sub_group_prefix),
            })
            .collect();

        self.store.exec_atomic(ops).await?;
        debug!(count = keys.len(), "Cache delete_many");
        Ok(())
    }
}
