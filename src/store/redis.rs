//! Redis Store Module
//!
//! [`KeyValueStore`] backed by a Redis server through an auto-reconnecting
//! multiplexed [`ConnectionManager`].

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use redis::{AsyncCommands, Client, Cmd};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::config::PoolOptions;
use crate::error::{StoreError, StoreResult};
use crate::store::{KeyValueStore, WriteOp};

// == Redis Store ==
/// Redis backend. The connection is opened by [`connect`](KeyValueStore::connect)
/// and shared by all callers; atomic batches are sent as `MULTI`/`EXEC`.
pub struct RedisStore {
    client: Client,
    pool: PoolOptions,
    connection: RwLock<Option<ConnectionManager>>,
    open: AtomicBool,
}

impl RedisStore {
    // == Constructor ==
    /// Parses `url` without touching the network.
    pub fn new(url: &str, pool: PoolOptions) -> StoreResult<Self> {
        Ok(Self {
            client: Client::open(url)?,
            pool,
            connection: RwLock::new(None),
            open: AtomicBool::new(false),
        })
    }

    fn manager_config(&self) -> ConnectionManagerConfig {
        let mut config = ConnectionManagerConfig::new();
        if let Some(timeout) = self.pool.connection_timeout() {
            config = config.set_connection_timeout(timeout);
        }
        if let Some(timeout) = self.pool.response_timeout() {
            config = config.set_response_timeout(timeout);
        }
        if let Some(retries) = self.pool.reconnect_retries {
            config = config.set_number_of_retries(retries);
        }
        config
    }

    /// Clones the shared connection handle.
    async fn connection(&self) -> StoreResult<ConnectionManager> {
        self.connection
            .read()
            .await
            .clone()
            .ok_or(StoreError::NotConnected)
    }

    fn address(&self) -> String {
        self.client.get_connection_info().addr.to_string()
    }
}

impl fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisStore")
            .field("addr", &self.address())
            .field("open", &self.is_open())
            .finish()
    }
}

/// Builds `SET key value [EX ttl]`.
fn set_command(key: &str, value: &str, ttl: Option<u64>) -> Cmd {
    let mut cmd = redis::cmd("SET");
    cmd.arg(key).arg(value);
    if let Some(ttl) = ttl {
        cmd.arg("EX").arg(ttl);
    }
    cmd
}

fn write_command(op: &WriteOp) -> Cmd {
    match op {
        WriteOp::Set { key, value, ttl } => set_command(key, value, *ttl),
        WriteOp::Delete { key } => {
            let mut cmd = redis::cmd("DEL");
            cmd.arg(key);
            cmd
        }
        // GT treats a key without expiry as infinite, so it is never given one
        WriteOp::Expire { key, ttl } => {
            let mut cmd = redis::cmd("EXPIRE");
            cmd.arg(key).arg(*ttl).arg("GT");
            cmd
        }
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn connect(&self) -> StoreResult<()> {
        let mut guard = self.connection.write().await;
        if guard.is_some() {
            return Ok(());
        }

        let manager =
            ConnectionManager::new_with_config(self.client.clone(), self.manager_config()).await?;
        *guard = Some(manager);
        self.open.store(true, Ordering::SeqCst);
        info!(addr = %self.address(), "Connected to Redis");
        Ok(())
    }

    async fn disconnect(&self) -> StoreResult<()> {
        let mut guard = self.connection.write().await;
        if guard.take().is_some() {
            self.open.store(false, Ordering::SeqCst);
            info!(addr = %self.address(), "Disconnected from Redis");
        }
        Ok(())
    }

    async fn quit(&self) -> StoreResult<()> {
        let mut guard = self.connection.write().await;
        let Some(mut conn) = guard.take() else {
            return Ok(());
        };
        self.open.store(false, Ordering::SeqCst);

        let result: redis::RedisResult<()> = redis::cmd("QUIT").query_async(&mut conn).await;
        drop(conn);
        match result {
            Ok(()) => {
                info!(addr = %self.address(), "Closed Redis connection");
                Ok(())
            }
            Err(err) => {
                warn!(addr = %self.address(), error = %err, "QUIT failed, connection dropped");
                Err(err.into())
            }
        }
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let mut conn = self.connection().await?;
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn mget(&self, keys: &[String]) -> StoreResult<Vec<Option<String>>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.connection().await?;
        let mut cmd = redis::cmd("MGET");
        for key in keys {
            cmd.arg(key);
        }
        // MGET always replies with an array, even for a single key.
        let values: Vec<Option<String>> = cmd.query_async(&mut conn).await?;
        Ok(values)
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<u64>) -> StoreResult<()> {
        let mut conn = self.connection().await?;
        let _: () = set_command(key, value, ttl).query_async(&mut conn).await?;
        Ok(())
    }

    async fn del(&self, key: &str) -> StoreResult<()> {
        let mut conn = self.connection().await?;
        let _: i64 = conn.del(key).await?;
        Ok(())
    }

    async fn keys(&self, pattern: &str) -> StoreResult<Vec<String>> {
        let mut conn = self.connection().await?;
        let keys: Vec<String> = conn.keys(pattern).await?;
        Ok(keys)
    }

    async fn expire(&self, key: &str, ttl: u64) -> StoreResult<()> {
        let mut conn = self.connection().await?;
        let _: i64 = write_command(&WriteOp::Expire {
            key: key.to_string(),
            ttl,
        })
        .query_async(&mut conn)
        .await?;
        Ok(())
    }

    async fn exec_atomic(&self, ops: Vec<WriteOp>) -> StoreResult<()> {
        if ops.is_empty() {
            return Ok(());
        }
        let mut conn = self.connection().await?;

        let mut pipe = redis::pipe();
        pipe.atomic();
        for op in &ops {
            pipe.add_command(write_command(op)).ignore();
        }

        debug!(ops = ops.len(), "Executing MULTI/EXEC batch");
        let _: () = pipe.query_async(&mut conn).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_command_without_ttl() {
        let cmd = set_command("k", "string::v", None);
        let packed = String::from_utf8(cmd.get_packed_command()).unwrap();
        assert!(packed.contains("SET"));
        assert!(packed.contains("string::v"));
        assert!(!packed.contains("EX"));
    }

    #[test]
    fn test_set_command_with_ttl() {
        let cmd = set_command("k", "v", Some(5));
        let packed = String::from_utf8(cmd.get_packed_command()).unwrap();
        assert!(packed.contains("EX"));
        assert!(packed.ends_with("$1\r\n5\r\n"));
    }

    #[test]
    fn test_write_command_names() {
        let del = write_command(&WriteOp::Delete { key: "k".into() });
        assert!(String::from_utf8(del.get_packed_command())
            .unwrap()
            .contains("DEL"));

        let expire = write_command(&WriteOp::Expire {
            key: "k".into(),
            ttl: 10,
        });
        let packed = String::from_utf8(expire.get_packed_command()).unwrap();
        assert!(packed.contains("EXPIRE"));
        assert!(packed.ends_with("$2\r\n10\r\n$2\r\nGT\r\n"));
    }

    #[tokio::test]
    async fn test_new_does_not_connect() {
        let store = RedisStore::new("redis://127.0.0.1:1/", PoolOptions::default()).unwrap();
        assert!(!store.is_open());
        assert!(matches!(store.get("k").await, Err(StoreError::NotConnected)));
        // Closing a store that was never opened is a no-op
        store.disconnect().await.unwrap();
        store.quit().await.unwrap();
    }

    #[test]
    fn test_invalid_url_rejected() {
        assert!(matches!(
            RedisStore::new("not a url", PoolOptions::default()),
            Err(StoreError::Redis(_))
        ));
    }
}
