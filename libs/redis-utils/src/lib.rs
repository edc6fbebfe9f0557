//! Redis connection utilities shared across the workspace.
//!
//! Provides connection bootstrap plus the [`KeyedExpiryStore`] capability:
//! a key-value store with per-entry time-to-live, available in a
//! Redis-backed and an in-process flavor so components degrade gracefully
//! when Redis is unreachable.

use anyhow::{Context, Result};
use redis::aio::ConnectionManager;
use redis::Client;

mod keyed_expiry;

pub use keyed_expiry::{InMemoryKeyedExpiryStore, KeyedExpiryStore, RedisKeyedExpiryStore};

/// Open a multiplexed Redis connection manager.
///
/// The manager transparently reconnects after transient failures; callers
/// clone it cheaply per operation.
pub async fn connect(redis_url: &str) -> Result<ConnectionManager> {
    let client = Client::open(redis_url).context("failed to construct Redis client")?;
    let manager = ConnectionManager::new(client)
        .await
        .context("failed to initialize Redis connection manager")?;
    Ok(manager)
}
