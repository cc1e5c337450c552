//! Named store registry.

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::{StoreConfig, StoreDriver};
use crate::idempotency::cache::CacheError;
use crate::idempotency::store::{CacheStore, MemoryStore, RedisStore, StoreError};

/// Stores addressable by the name used in `idempotency.cache.store`.
#[derive(Clone, Default)]
pub struct StoreRegistry {
    stores: HashMap<String, Arc<dyn CacheStore>>,
}

impl StoreRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build every store declared in the configuration.
    pub fn from_config<'a>(
        stores: impl IntoIterator<Item = (&'a String, &'a StoreConfig)>,
    ) -> Result<Self, StoreError> {
        let mut registry = Self::new();
        for (name, config) in stores {
            let store: Arc<dyn CacheStore> = match config.driver {
                StoreDriver::Memory => match config.max_entries {
                    Some(max) => Arc::new(MemoryStore::with_capacity_limit(max)),
                    None => Arc::new(MemoryStore::new()),
                },
                StoreDriver::Redis => {
                    let url = config.url.as_deref().ok_or_else(|| {
                        StoreError::Unavailable(format!("store `{name}` has no url"))
                    })?;
                    Arc::new(RedisStore::open(url)?)
                }
            };
            tracing::info!(store = %name, driver = ?config.driver, "Registered cache store");
            registry.stores.insert(name.clone(), store);
        }
        Ok(registry)
    }

    /// Register (or replace) a store under `name`.
    pub fn with_store(mut self, name: impl Into<String>, store: impl CacheStore + 'static) -> Self {
        self.stores.insert(name.into(), Arc::new(store));
        self
    }

    /// Look up a store by name.
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn CacheStore>, CacheError> {
        self.stores
            .get(name)
            .cloned()
            .ok_or_else(|| CacheError::UnknownStore(name.to_string()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.stores.keys().map(String::as_str)
    }
}
