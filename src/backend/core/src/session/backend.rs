//! Session backend implementations.
//!
//! This module provides pluggable key/value backends for session records:
//! - **InMemoryBackend**: process-local map with per-entry expiry
//! - **RedisBackend**: shared store using Redis with native TTL
//!
//! Backends deal in raw bytes; encoding, key namespacing and timeouts live in
//! [`SessionStore`](super::SessionStore).

use crate::error::{ErrorCode, GateError, Result};
use async_trait::async_trait;
use dashmap::DashMap;
use metrics::counter;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info};

// ═══════════════════════════════════════════════════════════════════════════════
// Backend Statistics
// ═══════════════════════════════════════════════════════════════════════════════

/// Session backend statistics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackendStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: u64,
    pub evictions: u64,
}

// ═══════════════════════════════════════════════════════════════════════════════
// Session Backend Trait
// ═══════════════════════════════════════════════════════════════════════════════

/// Key/value storage for serialized session records.
#[async_trait]
pub trait SessionBackend: Send + Sync {
    /// Read a value. Expired entries read as absent.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Upsert a value, optionally expiring after `ttl`.
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()>;

    /// Remove a value. Returns whether something was removed.
    async fn delete(&self, key: &str) -> Result<bool>;

    /// Round-trip to the backend to verify it is reachable.
    async fn ping(&self) -> Result<()>;

    async fn stats(&self) -> Result<BackendStats>;

    fn name(&self) -> &'static str;
}

// ═══════════════════════════════════════════════════════════════════════════════
// In-Memory Backend
// ═══════════════════════════════════════════════════════════════════════════════

/// Configuration for the in-memory backend.
#[derive(Debug, Clone)]
pub struct InMemoryConfig {
    /// Maximum number of live sessions before the oldest is evicted
    pub max_capacity: u64,

    /// Shard count for concurrent access (power of 2)
    pub shard_count: usize,
}

impl Default for InMemoryConfig {
    fn default() -> Self {
        Self {
            max_capacity: 100_000,
            shard_count: 16,
        }
    }
}

struct InMemoryEntry {
    data: Vec<u8>,
    inserted_at: Instant,
    expires_at: Option<Instant>,
}

impl InMemoryEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.map_or(false, |at| now >= at)
    }
}

/// Process-local session backend.
///
/// Suitable for single-instance deployments and tests; sessions do not
/// survive a restart and are not shared between instances.
pub struct InMemoryBackend {
    entries: DashMap<String, InMemoryEntry>,
    config: InMemoryConfig,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl InMemoryBackend {
    pub fn new(config: InMemoryConfig) -> Self {
        Self {
            entries: DashMap::with_shard_amount(config.shard_count),
            config,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Make room for one more entry, dropping expired entries first and then
    /// the oldest insert.
    fn maybe_evict(&self, incoming_key: &str) {
        if self.entries.contains_key(incoming_key)
            || (self.entries.len() as u64) < self.config.max_capacity
        {
            return;
        }

        if self.cleanup_expired() > 0
            && (self.entries.len() as u64) < self.config.max_capacity
        {
            return;
        }

        let oldest = self
            .entries
            .iter()
            .min_by_key(|entry| entry.value().inserted_at)
            .map(|entry| entry.key().clone());

        if let Some(key) = oldest {
            self.entries.remove(&key);
            self.evictions.fetch_add(1, Ordering::Relaxed);
            debug!("Evicted oldest session to stay within capacity");
        }
    }

    /// Drop expired entries. Returns how many were removed.
    pub fn cleanup_expired(&self) -> u64 {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        let removed = before.saturating_sub(self.entries.len()) as u64;

        if removed > 0 {
            self.evictions.fetch_add(removed, Ordering::Relaxed);
            debug!(removed, "Cleaned up expired sessions");
        }

        removed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for InMemoryBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Keys embed raw session ids; only counts are printed.
        f.debug_struct("InMemoryBackend")
            .field("entries", &self.entries.len())
            .field("config", &self.config)
            .field("evictions", &self.evictions.load(Ordering::Relaxed))
            .finish()
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new(InMemoryConfig::default())
    }
}

#[async_trait]
impl SessionBackend for InMemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let now = Instant::now();

        if let Some(entry) = self.entries.get(key) {
            if !entry.is_expired(now) {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Ok(Some(entry.data.clone()));
            }
        }

        // Only remove if still expired; a concurrent set may have replaced it.
        self.entries.remove_if(key, |_, entry| entry.is_expired(now));
        self.misses.fetch_add(1, Ordering::Relaxed);
        counter!("rolegate_session_backend_misses_total", "backend" => "in_memory").increment(1);
        Ok(None)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()> {
        self.maybe_evict(key);

        let now = Instant::now();
        self.entries.insert(
            key.to_string(),
            InMemoryEntry {
                data: value,
                inserted_at: now,
                expires_at: ttl.map(|ttl| now + ttl),
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        Ok(self.entries.remove(key).is_some())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn stats(&self) -> Result<BackendStats> {
        Ok(BackendStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.entries.len() as u64,
            evictions: self.evictions.load(Ordering::Relaxed),
        })
    }

    fn name(&self) -> &'static str {
        "in_memory"
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Redis Backend
// ═══════════════════════════════════════════════════════════════════════════════

/// Redis session backend.
///
/// Uses a `ConnectionManager`, which multiplexes commands over one connection
/// and reconnects transparently after drops.
pub struct RedisBackend {
    conn: redis::aio::ConnectionManager,
    url: String,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl RedisBackend {
    /// Connect and verify the server answers `PING`.
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url).map_err(|e| {
            GateError::with_internal(
                ErrorCode::StoreConnectionFailed,
                "Failed to create Redis client",
                e.to_string(),
            )
        })?;

        let mut conn = client.get_connection_manager().await.map_err(|e| {
            GateError::with_internal(
                ErrorCode::StoreConnectionFailed,
                "Failed to connect to Redis",
                e.to_string(),
            )
        })?;

        let _: String = redis::cmd("PING").query_async(&mut conn).await.map_err(|e| {
            GateError::with_internal(
                ErrorCode::StoreConnectionFailed,
                "Redis ping failed",
                e.to_string(),
            )
        })?;

        info!("Redis session backend connected to {}", url);

        Ok(Self {
            conn,
            url: url.to_string(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl SessionBackend for RedisBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.conn.clone();
        let data: Option<Vec<u8>> = conn.get(key).await.map_err(GateError::from)?;

        if data.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            counter!("rolegate_session_backend_misses_total", "backend" => "redis").increment(1);
        }

        Ok(data)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()> {
        let mut conn = self.conn.clone();

        match ttl {
            Some(ttl) => {
                let secs = expire_seconds(ttl);
                conn.set_ex::<_, _, ()>(key, value, secs)
                    .await
                    .map_err(GateError::from)?;
            }
            None => {
                conn.set::<_, _, ()>(key, value)
                    .await
                    .map_err(GateError::from)?;
            }
        }

        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        let deleted: i64 = conn.del(key).await.map_err(GateError::from)?;
        Ok(deleted > 0)
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(GateError::from)?;
        Ok(())
    }

    async fn stats(&self) -> Result<BackendStats> {
        let mut conn = self.conn.clone();
        let dbsize: u64 = redis::cmd("DBSIZE")
            .query_async(&mut conn)
            .await
            .map_err(GateError::from)?;

        Ok(BackendStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: dbsize,
            evictions: 0,
        })
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}

/// Whole seconds for `SET EX`, rounded up and never zero.
fn expire_seconds(ttl: Duration) -> u64 {
    let secs = ttl.as_secs() + u64::from(ttl.subsec_nanos() > 0);
    secs.max(1)
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
