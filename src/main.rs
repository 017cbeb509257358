//! Typed Cache - smoke check binary
//!
//! Connects with configuration taken from the environment, writes a few typed
//! values, reads them back and cleans up. Falls back to the in-memory store
//! when no Redis target is configured.

use anyhow::{bail, Context};
use serde_json::json;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use typed_cache::{CacheClient, CacheConfig, CacheValue, KeyValueStore, MemoryStore, SetOptions};

/// Main entry point for the smoke check.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Build a Redis-backed client, or an in-memory one without a target
/// 4. Round-trip a set of typed values, then terminate the connection
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "typed_cache=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = CacheConfig::from_env();
    info!(
        "Configuration loaded: group_prefix={:?}, default_ttl={:?}s, max_bulk_entries={:?}",
        config.group_key_prefix,
        config.effective_default_ttl(),
        config.max_bulk_entries
    );

    if config.url.is_none() && config.connection.is_none() {
        warn!("No REDIS_URL or REDIS_HOST set, using the in-memory store");
        let client = CacheClient::with_store(MemoryStore::new(), &config);
        return run(client).await;
    }

    let client = CacheClient::new(config).context("invalid cache configuration")?;
    run(client).await
}

async fn run<S: KeyValueStore>(client: CacheClient<S>) -> anyhow::Result<()> {
    let samples: Vec<(&str, CacheValue)> = vec![
        ("smoke-string", "apparently a string".into()),
        ("smoke-number", 100_i32.into()),
        ("smoke-boolean", false.into()),
        ("smoke-object", CacheValue::from_json(json!({"test1": true}))?),
        ("smoke-string-array", vec!["aa", "bb"].into()),
        ("smoke-number-array", vec![11.0, 22.0].into()),
    ];
    let keys: Vec<&str> = samples.iter().map(|(key, _)| *key).collect();

    let options = SetOptions::new().expiry_in_seconds(60);
    client.set_many(samples.clone(), Some(&options)).await?;

    let stored = client.get_many(&keys, None).await?;
    for (key, expected) in &samples {
        match stored.get(*key) {
            Some(Some(actual)) if actual == expected => info!(key, tag = %actual.tag(), "Round-trip ok"),
            other => bail!("round-trip mismatch for {key}: {other:?}"),
        }
    }

    client.delete_many(&keys, None).await?;
    let remaining = client.get_many(&keys, None).await?;
    if remaining.values().any(Option::is_some) {
        bail!("keys still present after delete_many");
    }

    client.terminate().await?;
    info!("Smoke check complete");
    Ok(())
}
