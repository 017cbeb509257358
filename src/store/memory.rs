//! Memory Store Module
//!
//! In-process store backend: a HashMap of tagged strings with TTL expiration
//! and whole-batch atomic writes.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use globset::GlobBuilder;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::store::{KeyValueStore, StoredEntry, WriteOp};

// == Memory Store ==
/// In-memory [`KeyValueStore`].
///
/// Data outlives `disconnect`/`quit` the way it outlives a client connection
/// on a real server; only the connection flag changes.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, StoredEntry>>,
    open: AtomicBool,
    fail_next_batch: AtomicBool,
}

impl MemoryStore {
    // == Constructor ==
    /// Creates an empty, closed store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next [`exec_atomic`](KeyValueStore::exec_atomic) call fail
    /// without applying any of its ops.
    pub fn fail_next_batch(&self) {
        self.fail_next_batch.store(true, Ordering::SeqCst);
    }

    // == Length ==
    /// Number of live (unexpired) entries.
    pub async fn len(&self) -> usize {
        let entries = self.entries.read().await;
        entries.values().filter(|entry| !entry.is_expired()).count()
    }

    /// True when no live entries remain.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Remaining TTL of `key` in milliseconds; `None` if absent or never expiring.
    pub async fn ttl_remaining_ms(&self, key: &str) -> Option<u64> {
        let entries = self.entries.read().await;
        entries
            .get(key)
            .filter(|entry| !entry.is_expired())
            .and_then(StoredEntry::ttl_remaining_ms)
    }

    // == Purge Expired ==
    /// Removes all expired entries, returning how many were dropped.
    pub async fn purge_expired(&self) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired());
        let removed = before - entries.len();
        if removed > 0 {
            debug!(removed, "Purged expired entries");
        }
        removed
    }

    fn ensure_open(&self) -> StoreResult<()> {
        if self.open.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::NotConnected)
        }
    }

    fn live_value(entries: &mut HashMap<String, StoredEntry>, key: &str) -> Option<String> {
        match entries.get(key) {
            Some(entry) if entry.is_expired() => {
                entries.remove(key);
                None
            }
            Some(entry) => Some(entry.value.clone()),
            None => None,
        }
    }

    fn apply(entries: &mut HashMap<String, StoredEntry>, op: WriteOp) {
        match op {
            WriteOp::Set { key, value, ttl } => {
                entries.insert(key, StoredEntry::new(value, ttl));
            }
            WriteOp::Delete { key } => {
                entries.remove(&key);
            }
            WriteOp::Expire { key, ttl } => {
                if let Some(entry) = entries.get_mut(&key).filter(|e| !e.is_expired()) {
                    entry.extend_expiry(ttl);
                }
            }
        }
    }
}

/// Escapes `{` and `}` outside character classes.
///
/// Redis `KEYS` has no `{a,b}` alternation; braces match themselves.
fn escape_braces(pattern: &str) -> String {
    let mut escaped = String::with_capacity(pattern.len());
    let mut chars = pattern.chars();
    let mut in_class = false;
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                escaped.push(c);
                if let Some(next) = chars.next() {
                    escaped.push(next);
                }
            }
            '[' if !in_class => {
                in_class = true;
                escaped.push(c);
            }
            ']' if in_class => {
                in_class = false;
                escaped.push(c);
            }
            '{' | '}' if !in_class => {
                escaped.push('\\');
                escaped.push(c);
            }
            _ => escaped.push(c),
        }
    }
    escaped
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn connect(&self) -> StoreResult<()> {
        self.open.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) -> StoreResult<()> {
        self.open.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn quit(&self) -> StoreResult<()> {
        self.disconnect().await
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        self.ensure_open()?;
        let mut entries = self.entries.write().await;
        Ok(Self::live_value(&mut entries, key))
    }

    async fn mget(&self, keys: &[String]) -> StoreResult<Vec<Option<String>>> {
        self.ensure_open()?;
        let mut entries = self.entries.write().await;
        Ok(keys
            .iter()
            .map(|key| Self::live_value(&mut entries, key))
            .collect())
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<u64>) -> StoreResult<()> {
        self.ensure_open()?;
        let mut entries = self.entries.write().await;
        entries.insert(key.to_string(), StoredEntry::new(value.to_string(), ttl));
        Ok(())
    }

    async fn del(&self, key: &str) -> StoreResult<()> {
        self.ensure_open()?;
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn keys(&self, pattern: &str) -> StoreResult<Vec<String>> {
        self.ensure_open()?;
        let matcher = GlobBuilder::new(&escape_braces(pattern))
            .literal_separator(false)
            .backslash_escape(true)
            .build()
            .map_err(|e| StoreError::InvalidPattern {
                pattern: pattern.to_string(),
                reason: e.to_string(),
            })?
            .compile_matcher();

        let entries = self.entries.read().await;
        Ok(entries
            .iter()
            .filter(|(key, entry)| !entry.is_expired() && matcher.is_match(key.as_str()))
            .map(|(key, _)| key.clone())
            .collect())
    }

    async fn expire(&self, key: &str, ttl: u64) -> StoreResult<()> {
        self.ensure_open()?;
        let mut entries = self.entries.write().await;
        Self::apply(
            &mut entries,
            WriteOp::Expire {
                key: key.to_string(),
                ttl,
            },
        );
        Ok(())
    }

    async fn exec_atomic(&self, ops: Vec<WriteOp>) -> StoreResult<()> {
        self.ensure_open()?;
        if self.fail_next_batch.swap(false, Ordering::SeqCst) {
            return Err(StoreError::BatchAborted(format!(
                "injected failure for batch of {} ops",
                ops.len()
            )));
        }

        // One write guard for the whole batch, so readers see all or nothing.
        let mut entries = self.entries.write().await;
        for op in ops {
            Self::apply(&mut entries, op);
        }
        Ok(())
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    async fn open_store() -> MemoryStore {
        let store = MemoryStore::new();
        store.connect().await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_closed_store_rejects_commands() {
        let store = MemoryStore::new();
        assert!(!store.is_open());
        assert!(matches!(
            store.get("k").await,
            Err(StoreError::NotConnected)
        ));
        assert!(matches!(
            store.exec_atomic(vec![]).await,
            Err(StoreError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_connect_is_idempotent() {
        let store = MemoryStore::new();
        store.connect().await.unwrap();
        store.connect().await.unwrap();
        assert!(store.is_open());
        store.disconnect().await.unwrap();
        store.disconnect().await.unwrap();
        assert!(!store.is_open());
    }

    #[tokio::test]
    async fn test_data_survives_reconnect() {
        let store = open_store().await;
        store.set("k", "v", None).await.unwrap();
        store.quit().await.unwrap();
        store.connect().await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));
    }

    #[tokio::test]
    async fn test_set_get_del() {
        let store = open_store().await;
        store.set("k", "v", None).await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));

        store.del("k").await.unwrap();
        assert!(store.get("k").await.unwrap().is_none());

        // Deleting a missing key is not an error
        store.del("k").await.unwrap();
    }

    #[tokio::test]
    async fn test_mget_is_positional() {
        let store = open_store().await;
        store.set("a", "1", None).await.unwrap();
        store.set("c", "3", None).await.unwrap();

        let keys = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let values = store.mget(&keys).await.unwrap();
        assert_eq!(
            values,
            vec![Some("1".to_string()), None, Some("3".to_string())]
        );
    }

    #[tokio::test]
    async fn test_ttl_expiration() {
        let store = open_store().await;
        store.set("k", "v", Some(1)).await.unwrap();
        assert!(store.get("k").await.unwrap().is_some());

        tokio::time::sleep(Duration::from_millis(1100)).await;

        assert!(store.get("k").await.unwrap().is_none());
        assert!(store.keys("*").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_expire_extends_and_ignores_missing() {
        let store = open_store().await;
        store.set("k", "v", Some(1)).await.unwrap();
        store.expire("k", 60).await.unwrap();
        store.expire("missing", 60).await.unwrap();

        assert!(store.ttl_remaining_ms("k").await.unwrap() > 30_000);
        assert!(store.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expire_only_grows() {
        let store = open_store().await;
        store.set("long", "v", Some(3600)).await.unwrap();
        store.set("forever", "v", None).await.unwrap();

        store
            .exec_atomic(vec![
                WriteOp::Expire {
                    key: "long".into(),
                    ttl: 5,
                },
                WriteOp::Expire {
                    key: "forever".into(),
                    ttl: 5,
                },
            ])
            .await
            .unwrap();

        assert!(store.ttl_remaining_ms("long").await.unwrap() > 3_000_000);
        assert!(store.ttl_remaining_ms("forever").await.is_none());
    }

    #[tokio::test]
    async fn test_keys_glob() {
        let store = open_store().await;
        store.set("tests:sub-1:key1", "v", None).await.unwrap();
        store.set("tests:key2", "v", None).await.unwrap();
        store.set("other", "v", None).await.unwrap();

        let keys = store.keys("*:sub-1:*").await.unwrap();
        assert_eq!(keys, vec!["tests:sub-1:key1".to_string()]);

        let mut all = store.keys("tests:*").await.unwrap();
        all.sort();
        assert_eq!(all, vec!["tests:key2", "tests:sub-1:key1"]);

        assert_eq!(store.keys("*").await.unwrap().len(), 3);
        assert!(store.keys("nothing*").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_keys_braces_are_literal() {
        let store = open_store().await;
        store.set("a", "v", None).await.unwrap();
        store.set("b", "v", None).await.unwrap();
        store.set("{a,b}", "v", None).await.unwrap();
        store.set("user:{42}", "v", None).await.unwrap();

        assert_eq!(store.keys("{a,b}").await.unwrap(), vec!["{a,b}".to_string()]);
        assert_eq!(
            store.keys("user:{*}").await.unwrap(),
            vec!["user:{42}".to_string()]
        );
    }

    #[test]
    fn test_escape_braces() {
        assert_eq!(escape_braces("{a,b}"), "\\{a,b\\}");
        assert_eq!(escape_braces("\\{x"), "\\{x");
        assert_eq!(escape_braces("[{]"), "[{]");
        assert_eq!(escape_braces("tests:*"), "tests:*");
    }

    #[tokio::test]
    async fn test_invalid_pattern() {
        let store = open_store().await;
        assert!(matches!(
            store.keys("[unclosed").await,
            Err(StoreError::InvalidPattern { .. })
        ));
    }

    #[tokio::test]
    async fn test_exec_atomic_applies_all() {
        let store = open_store().await;
        store.set("gone", "x", None).await.unwrap();

        store
            .exec_atomic(vec![
                WriteOp::Set {
                    key: "a".into(),
                    value: "1".into(),
                    ttl: None,
                },
                WriteOp::Set {
                    key: "b".into(),
                    value: "2".into(),
                    ttl: Some(60),
                },
                WriteOp::Delete { key: "gone".into() },
            ])
            .await
            .unwrap();

        assert_eq!(store.len().await, 2);
        assert!(store.get("gone").await.unwrap().is_none());
        assert!(store.ttl_remaining_ms("a").await.is_none());
        assert!(store.ttl_remaining_ms("b").await.is_some());
    }

    #[tokio::test]
    async fn test_failed_batch_applies_nothing() {
        let store = open_store().await;
        store.fail_next_batch();

        let result = store
            .exec_atomic(vec![
                WriteOp::Set {
                    key: "a".into(),
                    value: "1".into(),
                    ttl: None,
                },
                WriteOp::Set {
                    key: "b".into(),
                    value: "2".into(),
                    ttl: None,
                },
            ])
            .await;

        assert!(matches!(result, Err(StoreError::BatchAborted(_))));
        assert!(store.is_empty().await);

        // Only the next batch is affected
        store.exec_atomic(vec![WriteOp::Delete { key: "a".into() }]).await.unwrap();
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let store = open_store().await;
        store.set("short", "v", Some(1)).await.unwrap();
        store.set("long", "v", Some(60)).await.unwrap();

        tokio::time::sleep(Duration::from_millis(1100)).await;

        assert_eq!(store.purge_expired().await, 1);
        assert_eq!(store.len().await, 1);
    }
}
