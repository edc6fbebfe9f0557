//! Revocation ledger keyed by `(token class, jti)`.
//!
//! Entries carry a TTL mirroring the revoked token's own expiry so the
//! ledger never outgrows the set of still-valid tokens. Writes and reads
//! prefer the durable keyed-expiry store; the in-process map covers the
//! window where the durable store is down.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use redis_utils::{InMemoryKeyedExpiryStore, KeyedExpiryStore};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

const KEY_PREFIX: &str = "revoked:";

/// Upper bound for user-level revocation markers: the longest lifetime a
/// refresh token can have, so the marker outlives every token it covers.
pub const USER_REVOCATION_TTL: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Which kind of token an entry revokes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenClass {
    Access,
    Refresh,
}

impl TokenClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenClass::Access => "access",
            TokenClass::Refresh => "refresh",
        }
    }
}

/// Stored payload for a revocation entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevokedEntry {
    pub user_id: Uuid,
    pub reason: String,
}

/// Per-backend entry counts for operational monitoring.
#[derive(Debug, Clone, Serialize)]
pub struct LedgerStats {
    pub in_memory_entries: u64,
    pub durable_reachable: bool,
    pub durable_entries: Option<u64>,
}

pub struct TokenRevocationLedger {
    durable: Option<Arc<dyn KeyedExpiryStore>>,
    memory: InMemoryKeyedExpiryStore,
}

fn token_key(class: TokenClass, jti: &str) -> String {
    format!("{KEY_PREFIX}{}:{}", class.as_str(), jti)
}

fn user_key(user_id: Uuid) -> String {
    format!("{KEY_PREFIX}user:{user_id}")
}

impl TokenRevocationLedger {
    pub fn new(durable: Option<Arc<dyn KeyedExpiryStore>>) -> Self {
        Self {
            durable,
            memory: InMemoryKeyedExpiryStore::new(),
        }
    }

    /// Record a revocation for `(class, jti)` expiring after `ttl`.
    ///
    /// The TTL should mirror the token's remaining lifetime; entries must
    /// not outlive the token they revoke.
    pub async fn revoke(
        &self,
        class: TokenClass,
        jti: &str,
        user_id: Uuid,
        reason: &str,
        ttl: Duration,
    ) -> Result<()> {
        let key = token_key(class, jti);
        let entry = RevokedEntry {
            user_id,
            reason: reason.to_string(),
        };
        let value = serde_json::to_string(&entry)?;

        self.write(&key, &value, ttl).await;
        info!(jti = %jti, class = class.as_str(), ttl_secs = ttl.as_secs(), "token revoked");
        Ok(())
    }

    /// Whether `(class, jti)` has been revoked.
    ///
    /// The durable store answers first; a miss still consults the local map
    /// (entries recorded while the durable store was down live only there)
    /// and a durable-store error falls back to the local map entirely, so a
    /// transient outage degrades to locally-correct rather than
    /// reject-everything.
    pub async fn is_revoked(&self, class: TokenClass, jti: &str) -> bool {
        let key = token_key(class, jti);
        self.lookup(&key).await
    }

    /// Coarse-grained kill-switch: marks every session of `user_id` revoked.
    ///
    /// This writes a user-level marker only; existing per-token entries are
    /// not enumerated. Callers must check [`Self::is_user_revoked`] in
    /// addition to the per-token check for the marker to take effect.
    pub async fn revoke_all_for_user(&self, user_id: Uuid, reason: &str) -> Result<()> {
        let entry = RevokedEntry {
            user_id,
            reason: reason.to_string(),
        };
        let value = serde_json::to_string(&entry)?;
        self.write(&user_key(user_id), &value, USER_REVOCATION_TTL)
            .await;
        info!(user_id = %user_id, reason, "all sessions marked revoked for user");
        Ok(())
    }

    /// Whether a user-level revocation marker is active for `user_id`.
    pub async fn is_user_revoked(&self, user_id: Uuid) -> bool {
        self.lookup(&user_key(user_id)).await
    }

    /// Fetch the stored entry for `(class, jti)`, if any.
    pub async fn revocation(&self, class: TokenClass, jti: &str) -> Option<RevokedEntry> {
        let key = token_key(class, jti);
        let raw = match self.read(&key).await {
            Some(raw) => raw,
            None => return None,
        };
        serde_json::from_str(&raw).ok()
    }

    pub async fn stats(&self) -> LedgerStats {
        let in_memory_entries = self
            .memory
            .count_prefix(KEY_PREFIX)
            .await
            .unwrap_or_default();

        let (durable_reachable, durable_entries) = match &self.durable {
            Some(store) => match store.count_prefix(KEY_PREFIX).await {
                Ok(n) => (true, Some(n)),
                Err(e) => {
                    warn!(error = %e, "durable revocation store unreachable for stats");
                    (false, None)
                }
            },
            None => (false, None),
        };

        LedgerStats {
            in_memory_entries,
            durable_reachable,
            durable_entries,
        }
    }

    /// Periodically evict expired entries from the in-process map.
    ///
    /// Entries already schedule their own deletion at TTL; the sweep catches
    /// timers lost to task cancellation.
    pub fn spawn_sweeper(&self, interval: Duration) -> JoinHandle<()> {
        self.memory.spawn_sweeper(interval)
    }

    async fn write(&self, key: &str, value: &str, ttl: Duration) {
        if let Some(durable) = &self.durable {
            match durable.set(key, value, ttl).await {
                Ok(()) => return,
                Err(e) => {
                    warn!(error = %e, key, "durable revocation write failed, using in-process map");
                }
            }
        }
        // Infallible for the in-memory store
        let _ = self.memory.set(key, value, ttl).await;
    }

    async fn read(&self, key: &str) -> Option<String> {
        if let Some(durable) = &self.durable {
            match durable.get(key).await {
                Ok(Some(value)) => return Some(value),
                Ok(None) => {}
                Err(e) => {
                    warn!(error = %e, key, "durable revocation read failed, consulting in-process map");
                }
            }
        }
        self.memory.get(key).await.ok().flatten()
    }

    async fn lookup(&self, key: &str) -> bool {
        self.read(key).await.is_some()
    }
}
