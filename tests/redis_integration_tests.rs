//! Integration Tests against a live Redis server
//!
//! Skipped unless `REDIS_URL` is set, e.g.
//! `REDIS_URL=redis://127.0.0.1:6379 cargo test --test redis_integration_tests`.

use std::time::Duration;

use typed_cache::{CacheClient, CacheConfig, CacheValue, RedisStore, SetOptions};

// == Helper Functions ==

/// Builds a client under a group prefix unique to the calling test.
fn redis_client(group: &str) -> Option<CacheClient<RedisStore>> {
    let url = std::env::var("REDIS_URL").ok()?;
    let config = CacheConfig::with_url(url)
        .group_key_prefix(format!("typed-cache-it-{group}"))
        .default_ttl(5);
    Some(CacheClient::new(config).unwrap())
}

macro_rules! client_or_skip {
    ($group:expr) => {
        match redis_client($group) {
            Some(client) => client,
            None => {
                eprintln!("REDIS_URL not set, skipping");
                return;
            }
        }
    };
}

#[tokio::test]
async fn test_redis_set_get_delete() {
    let client = client_or_skip!("single");

    client.set("key1", "test1", None).await.unwrap();
    assert_eq!(
        client.get("key1", None).await.unwrap(),
        Some(CacheValue::from("test1"))
    );

    client.delete("key1", None).await.unwrap();
    assert!(client.get("key1", None).await.unwrap().is_none());
    client.terminate().await.unwrap();
}

#[tokio::test]
async fn test_redis_bulk_round_trip() {
    let client = client_or_skip!("bulk");
    let keys = ["a", "b", "c"];

    client
        .set_many([("a", 1_i32), ("b", 2_i32)], None)
        .await
        .unwrap();
    let results = client.get_many(&keys, None).await.unwrap();
    assert_eq!(results.len(), 3);
    assert_eq!(results["a"], Some(CacheValue::Number(1.0)));
    assert_eq!(results["b"], Some(CacheValue::Number(2.0)));
    assert_eq!(results["c"], None);

    client.delete_many(&keys, None).await.unwrap();
    let results = client.get_many(&keys, None).await.unwrap();
    assert!(results.values().all(Option::is_none));
    client.terminate().await.unwrap();
}

#[tokio::test]
async fn test_redis_expiry_and_sub_group() {
    let client = client_or_skip!("expiry");
    let options = SetOptions::new()
        .expiry_in_seconds(1)
        .sub_group_prefix("sub-1");

    client.set("key1", vec![true, false], Some(&options)).await.unwrap();
    assert_eq!(
        client.get("key1", Some("sub-1")).await.unwrap(),
        Some(CacheValue::BooleanList(vec![true, false]))
    );
    assert_eq!(
        client.keys(Some("typed-cache-it-expiry:sub-1:*")).await.unwrap(),
        vec!["typed-cache-it-expiry:sub-1:key1".to_string()]
    );

    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert!(client.get("key1", Some("sub-1")).await.unwrap().is_none());
    client.terminate().await.unwrap();
}

#[tokio::test]
async fn test_redis_disconnect_and_reconnect() {
    let client = client_or_skip!("lifecycle");

    client.connect().await.unwrap();
    assert!(client.is_open());
    client.disconnect().await.unwrap();
    assert!(!client.is_open());

    client.set("k", 3.25, None).await.unwrap();
    assert!(client.is_open());
    assert_eq!(
        client.get("k", None).await.unwrap(),
        Some(CacheValue::Number(3.25))
    );
    client.delete("k", None).await.unwrap();
    client.terminate().await.unwrap();
}
