//! Response cache keyed by idempotency key.
//!
//! # Key Layout
//! ```text
//! idempotency:{cache.prefix}{key}
//! ```
//!
//! The store, prefix and ttl are read from the live configuration on every call.
//! Changing the store or the prefix therefore partitions the cache: entries written
//! before the change stay where they were and are not visible after it.
//!
//! Prefix and key are joined without a separator, so `"a" + "bc"` and `"ab" + "c"`
//! name the same entry. Prefixes that end in a delimiter (`"tenant-a:"`) keep
//! partitions apart.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::config::ConfigHandle;
use crate::idempotency::key::IdempotencyKey;
use crate::idempotency::registry::StoreRegistry;
use crate::idempotency::snapshot::CachedResponse;
use crate::idempotency::store::StoreError;

/// Top-level namespace shared by every idempotency entry.
pub const NAMESPACE: &str = "idempotency:";

/// Failure while reading or writing the response cache.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("unknown cache store `{0}`")]
    UnknownStore(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Build the store-level key for `key` under `prefix`.
pub fn namespaced_key(prefix: &str, key: &IdempotencyKey) -> String {
    format!("{NAMESPACE}{prefix}{key}")
}

/// Idempotency view over the configured backing store.
#[derive(Clone)]
pub struct ResponseCache {
    config: ConfigHandle,
    stores: Arc<StoreRegistry>,
}

impl ResponseCache {
    pub fn new(config: ConfigHandle, stores: Arc<StoreRegistry>) -> Self {
        Self { config, stores }
    }

    pub fn config(&self) -> &ConfigHandle {
        &self.config
    }

    /// Fetch the response stored for `key` in the currently configured store.
    pub async fn get(&self, key: &IdempotencyKey) -> Result<Option<CachedResponse>, CacheError> {
        let (store_name, cache_key) = {
            let config = self.config.load();
            let cache = &config.idempotency.cache;
            (cache.store.clone(), namespaced_key(&cache.prefix, key))
        };

        let store = self.stores.resolve(&store_name)?;
        let found = store.get(&cache_key).await?;

        tracing::debug!(
            store = %store_name,
            cache_key = %cache_key,
            hit = found.is_some(),
            "Idempotency cache lookup"
        );
        Ok(found)
    }

    /// Store `response` for `key`, expiring after the configured ttl (minutes).
    pub async fn put(&self, key: &IdempotencyKey, response: CachedResponse) -> Result<(), CacheError> {
        let (store_name, cache_key, ttl_minutes) = {
            let config = self.config.load();
            let cache = &config.idempotency.cache;
            (cache.store.clone(), namespaced_key(&cache.prefix, key), cache.ttl)
        };

        let store = self.stores.resolve(&store_name)?;
        let ttl = Duration::from_secs(ttl_minutes.saturating_mul(60));
        store.put(&cache_key, response, ttl).await?;

        tracing::debug!(
            store = %store_name,
            cache_key = %cache_key,
            ttl_minutes,
            "Stored idempotent response"
        );
        Ok(())
    }
}
