//! Backing key/value stores.
//!
//! # Implementations
//! - `MemoryStore`: in-process `DashMap`, holds snapshots by value
//! - `RedisStore`: networked, snapshots serialized as JSON with `SET EX`
//!
//! # Design Decisions
//! - Stores only see fully namespaced keys
//! - Errors are returned as-is; retry and fallback are not a store concern here

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use redis::AsyncCommands;
use thiserror::Error;

use crate::idempotency::snapshot::CachedResponse;

/// Failure reported by a backing store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("snapshot codec error: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// A key/value store with per-entry expiry.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Fetch the live value for `key`.
    async fn get(&self, key: &str) -> Result<Option<CachedResponse>, StoreError>;

    /// Store `value` under `key`, replacing any previous value, expiring after `ttl`.
    async fn put(&self, key: &str, value: CachedResponse, ttl: Duration) -> Result<(), StoreError>;
}

/// Longest expiry a store schedules. The memory store still records the TTL as given.
const MAX_EXPIRY: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

fn expiry_after(now: Instant, ttl: Duration) -> Instant {
    now.checked_add(ttl.min(MAX_EXPIRY)).unwrap_or(now)
}

struct MemoryEntry {
    value: CachedResponse,
    ttl: Duration,
    expires_at: Instant,
}

/// In-process store.
///
/// Expired entries are dropped lazily on read. With `max_entries` set, inserting a
/// new key into a full store evicts the entry closest to expiry.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<DashMap<String, MemoryEntry>>,
    max_entries: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity_limit(max_entries: usize) -> Self {
        Self {
            inner: Arc::new(DashMap::new()),
            max_entries: Some(max_entries),
        }
    }

    /// The TTL recorded when `key` was last written.
    pub fn ttl_of(&self, key: &str) -> Option<Duration> {
        self.inner.get(key).map(|entry| entry.ttl)
    }

    /// Whether `key` holds a live entry.
    pub fn contains(&self, key: &str) -> bool {
        self.inner
            .get(key)
            .map(|entry| entry.expires_at > Instant::now())
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn clear(&self) {
        self.inner.clear();
    }

    fn evict_one(&self) {
        let victim = self
            .inner
            .iter()
            .min_by_key(|entry| entry.expires_at)
            .map(|entry| entry.key().clone());

        if let Some(key) = victim {
            self.inner.remove(&key);
            tracing::debug!(key = %key, "Evicted entry from full memory store");
        }
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<CachedResponse>, StoreError> {
        let now = Instant::now();
        if let Some(entry) = self.inner.get(key) {
            if entry.expires_at > now {
                return Ok(Some(entry.value.clone()));
            }
        }
        self.inner.remove_if(key, |_, entry| entry.expires_at <= now);
        Ok(None)
    }

    async fn put(&self, key: &str, value: CachedResponse, ttl: Duration) -> Result<(), StoreError> {
        if let Some(max) = self.max_entries {
            if self.inner.len() >= max && !self.inner.contains_key(key) {
                self.evict_one();
            }
        }

        self.inner.insert(
            key.to_string(),
            MemoryEntry {
                value,
                ttl,
                expires_at: expiry_after(Instant::now(), ttl),
            },
        );
        Ok(())
    }
}

/// Redis-backed store. Values are JSON-encoded snapshots.
pub struct RedisStore {
    client: redis::Client,
}

impl RedisStore {
    pub fn new(client: redis::Client) -> Self {
        Self { client }
    }

    pub fn open(url: &str) -> Result<Self, StoreError> {
        Ok(Self::new(redis::Client::open(url)?))
    }
}

#[async_trait]
impl CacheStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<CachedResponse>, StoreError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let raw: Option<String> = conn.get(key).await?;

        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    async fn put(&self, key: &str, value: CachedResponse, ttl: Duration) -> Result<(), StoreError> {
        let encoded = serde_json::to_string(&value)?;
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let _: () = conn.set_ex(key, encoded, ttl.min(MAX_EXPIRY).as_secs().max(1)).await?;
        Ok(())
    }
}
