//! Keyed-expiry store: set-with-TTL / get / delete behind one trait.
//!
//! Two implementations exist. [`RedisKeyedExpiryStore`] delegates TTL
//! eviction to Redis (`SET EX`). [`InMemoryKeyedExpiryStore`] keeps entries
//! in a mutex-guarded map; every insert schedules its own deletion at expiry
//! and an optional periodic sweeper evicts anything a cancelled or lost
//! timer left behind.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tokio::task::JoinHandle;
use tracing::debug;

/// A key-value store whose entries expire after a time-to-live.
#[async_trait]
pub trait KeyedExpiryStore: Send + Sync {
    /// Store `value` under `key`, evicted automatically after `ttl`.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;

    /// Fetch the live value under `key`, `None` if absent or expired.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Remove `key` ahead of its expiry.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Count live entries whose key starts with `prefix`.
    async fn count_prefix(&self, prefix: &str) -> Result<u64>;
}

/// Redis-backed implementation; eviction is handled server-side via `SET EX`.
#[derive(Clone)]
pub struct RedisKeyedExpiryStore {
    conn: ConnectionManager,
}

impl RedisKeyedExpiryStore {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl KeyedExpiryStore for RedisKeyedExpiryStore {
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let mut conn = self.conn.clone();
        // Redis TTLs are whole seconds; round up so entries never expire early
        let secs = ttl.as_secs().max(1);
        conn.set_ex::<_, _, ()>(key, value, secs)
            .await
            .context("failed to SET EX in Redis")?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(key).await.context("failed to GET from Redis")?;
        Ok(value)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(key).await.context("failed to DEL in Redis")?;
        Ok(())
    }

    async fn count_prefix(&self, prefix: &str) -> Result<u64> {
        let mut conn = self.conn.clone();
        let keys: Vec<String> = conn
            .keys(format!("{prefix}*"))
            .await
            .context("failed to list keys in Redis")?;
        Ok(keys.len() as u64)
    }
}

struct Entry {
    value: String,
    expires_at: tokio::time::Instant,
    // Guards against a stale deletion timer removing a re-inserted key
    generation: u64,
}

/// In-process fallback implementation.
///
/// Entries self-delete via a task scheduled at insert time; reads also check
/// expiry so a late timer can never serve a stale value.
#[derive(Clone, Default)]
pub struct InMemoryKeyedExpiryStore {
    entries: Arc<Mutex<HashMap<String, Entry>>>,
    generation: Arc<AtomicU64>,
}

impl InMemoryKeyedExpiryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn remove_if_generation(&self, key: &str, generation: u64) {
        let mut entries = self.entries.lock().expect("keyed-expiry map poisoned");
        if entries.get(key).is_some_and(|e| e.generation == generation) {
            entries.remove(key);
        }
    }

    /// Count of live entries (expired-but-unswept entries excluded).
    pub fn live_len(&self) -> u64 {
        let now = tokio::time::Instant::now();
        let entries = self.entries.lock().expect("keyed-expiry map poisoned");
        entries.values().filter(|e| e.expires_at > now).count() as u64
    }

    /// Evict every entry past its expiry; returns the number removed.
    pub fn sweep(&self) -> u64 {
        let now = tokio::time::Instant::now();
        let mut entries = self.entries.lock().expect("keyed-expiry map poisoned");
        let before = entries.len();
        entries.retain(|_, e| e.expires_at > now);
        (before - entries.len()) as u64
    }

    /// Spawn a background task sweeping expired entries every `interval`.
    pub fn spawn_sweeper(&self, interval: Duration) -> JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await; // first tick completes immediately
            loop {
                ticker.tick().await;
                let evicted = store.sweep();
                if evicted > 0 {
                    debug!(evicted, "keyed-expiry sweeper evicted stale entries");
                }
            }
        })
    }
}

#[async_trait]
impl KeyedExpiryStore for InMemoryKeyedExpiryStore {
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let expires_at = tokio::time::Instant::now() + ttl;
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        {
            let mut entries = self.entries.lock().expect("keyed-expiry map poisoned");
            entries.insert(
                key.to_string(),
                Entry {
                    value: value.to_string(),
                    expires_at,
                    generation,
                },
            );
        }

        let store = self.clone();
        let key = key.to_string();
        tokio::spawn(async move {
            tokio::time::sleep_until(expires_at).await;
            store.remove_if_generation(&key, generation);
        });

        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let now = tokio::time::Instant::now();
        let mut entries = self.entries.lock().expect("keyed-expiry map poisoned");
        match entries.get(key) {
            Some(e) if e.expires_at > now => Ok(Some(e.value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.lock().expect("keyed-expiry map poisoned");
        entries.remove(key);
        Ok(())
    }

    async fn count_prefix(&self, prefix: &str) -> Result<u64> {
        let now = tokio::time::Instant::now();
        let entries = self.entries.lock().expect("keyed-expiry map poisoned");
        Ok(entries
            .iter()
            .filter(|(k, e)| k.starts_with(prefix) && e.expires_at > now)
            .count() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn entry_visible_before_ttl_and_gone_after() {
        let store = InMemoryKeyedExpiryStore::new();
        store.set("k1", "v1", Duration::from_secs(60)).await.unwrap();

        assert_eq!(store.get("k1").await.unwrap().as_deref(), Some("v1"));
        assert_eq!(store.live_len(), 1);

        tokio::time::advance(Duration::from_secs(61)).await;

        assert_eq!(store.get("k1").await.unwrap(), None);
        assert_eq!(store.live_len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn reinsert_outlives_stale_deletion_timer() {
        let store = InMemoryKeyedExpiryStore::new();
        store.set("k", "old", Duration::from_secs(10)).await.unwrap();
        // Re-insert with a longer TTL before the first timer fires
        store.set("k", "new", Duration::from_secs(120)).await.unwrap();

        // The first entry's timer fires here but must not remove the new entry
        tokio::time::advance(Duration::from_secs(11)).await;
        tokio::task::yield_now().await;

        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("new"));
    }

    #[tokio::test(start_paused = true)]
    async fn delete_removes_entry_early() {
        let store = InMemoryKeyedExpiryStore::new();
        store.set("k", "v", Duration::from_secs(60)).await.unwrap();
        store.delete("k").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_evicts_expired_entries() {
        let store = InMemoryKeyedExpiryStore::new();
        store.set("a", "1", Duration::from_secs(10)).await.unwrap();
        store.set("b", "2", Duration::from_secs(100)).await.unwrap();

        // Advance without yielding to the self-delete tasks so the sweep has
        // something to collect
        let now = tokio::time::Instant::now();
        {
            let mut entries = store.entries.lock().unwrap();
            entries.get_mut("a").unwrap().expires_at = now;
        }

        assert_eq!(store.sweep(), 1);
        assert_eq!(store.get("b").await.unwrap().as_deref(), Some("2"));
    }

    #[tokio::test(start_paused = true)]
    async fn count_prefix_filters_by_prefix_and_liveness() {
        let store = InMemoryKeyedExpiryStore::new();
        store.set("x:1", "1", Duration::from_secs(60)).await.unwrap();
        store.set("x:2", "2", Duration::from_secs(60)).await.unwrap();
        store.set("y:1", "3", Duration::from_secs(60)).await.unwrap();

        assert_eq!(store.count_prefix("x:").await.unwrap(), 2);
        assert_eq!(store.count_prefix("y:").await.unwrap(), 1);
        assert_eq!(store.count_prefix("z:").await.unwrap(), 0);
    }
}
