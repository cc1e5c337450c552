//! Response cache behaviour across stores, prefixes and expiry settings.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{HeaderValue, StatusCode};
use axum::response::Response;

use idempotency_gateway::config::GatewayConfig;
use idempotency_gateway::idempotency::{
    snapshot, CacheError, CacheStore, CachedResponse, DiagnosticContext, StoreError,
};
use idempotency_gateway::{ConfigHandle, IdempotencyKey, ResponseCache, StoreRegistry};

/// Store that keeps snapshots only in serialized form, like a networked store would.
#[derive(Clone, Default)]
struct SerializingStore {
    entries: Arc<Mutex<HashMap<String, (Vec<u8>, Duration)>>>,
}

impl SerializingStore {
    fn keys(&self) -> Vec<String> {
        let mut keys: Vec<_> = self.entries.lock().unwrap().keys().cloned().collect();
        keys.sort();
        keys
    }

    fn ttl_of(&self, key: &str) -> Option<Duration> {
        self.entries.lock().unwrap().get(key).map(|(_, ttl)| *ttl)
    }
}

#[async_trait]
impl CacheStore for SerializingStore {
    async fn get(&self, key: &str) -> Result<Option<CachedResponse>, StoreError> {
        let raw = self.entries.lock().unwrap().get(key).map(|(raw, _)| raw.clone());
        match raw {
            Some(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
            None => Ok(None),
        }
    }

    async fn put(&self, key: &str, value: CachedResponse, ttl: Duration) -> Result<(), StoreError> {
        let raw = serde_json::to_vec(&value)?;
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), (raw, ttl));
        Ok(())
    }
}

fn cache_over(stores: StoreRegistry, store: &str) -> ResponseCache {
    let mut config = GatewayConfig::default();
    config.idempotency.cache.store = store.to_string();
    ResponseCache::new(ConfigHandle::new(config), Arc::new(stores))
}

fn key(raw: &str) -> IdempotencyKey {
    IdempotencyKey::parse(raw).unwrap()
}

fn created_response() -> Response {
    let mut response = Response::new(Body::from("{\"id\":42}"));
    *response.status_mut() = StatusCode::CREATED;
    let headers = response.headers_mut();
    headers.insert("content-type", HeaderValue::from_static("application/json"));
    headers.append("set-cookie", HeaderValue::from_static("a=1"));
    headers.append("set-cookie", HeaderValue::from_static("b=2"));
    headers.insert("x-opaque", HeaderValue::from_bytes(&[0x80, 0xff]).unwrap());
    response
}

#[derive(Debug, thiserror::Error)]
#[error("ledger write raced another request")]
struct LedgerError;

#[tokio::test]
async fn test_replay_is_wire_identical_after_serialization() {
    let store = SerializingStore::default();
    let cache = cache_over(StoreRegistry::new().with_store("json", store.clone()), "json");

    let mut response = created_response();
    DiagnosticContext::attach(&mut response, LedgerError);
    let (cached, returned) = snapshot(response, 1024).await.unwrap();
    assert!(DiagnosticContext::of(&returned).is_some());

    cache.put(&key("order-42"), cached.clone()).await.unwrap();
    let fetched = cache.get(&key("order-42")).await.unwrap().unwrap();
    assert_eq!(fetched.to_wire(), cached.to_wire());

    // Rebuilding a response from the stored form and capturing it again changes nothing.
    let replayed = fetched.to_response();
    assert!(DiagnosticContext::of(&replayed).is_none());
    let (recaptured, _) = snapshot(replayed, 1024).await.unwrap();
    assert_eq!(recaptured.to_wire(), cached.to_wire());
    assert_eq!(recaptured.headers.len(), 4);
}

#[tokio::test]
async fn test_switching_store_partitions_entries() {
    let store1 = SerializingStore::default();
    let store2 = SerializingStore::default();
    let cache = cache_over(
        StoreRegistry::new()
            .with_store("store1", store1.clone())
            .with_store("store2", store2.clone()),
        "store1",
    );
    let (cached, _) = snapshot(created_response(), 1024).await.unwrap();

    cache.put(&key("k"), cached).await.unwrap();
    assert!(cache.get(&key("k")).await.unwrap().is_some());

    cache
        .config()
        .update(|c| c.idempotency.cache.store = "store2".to_string());
    assert!(cache.get(&key("k")).await.unwrap().is_none());

    cache
        .config()
        .update(|c| c.idempotency.cache.store = "store1".to_string());
    assert!(cache.get(&key("k")).await.unwrap().is_some());

    assert_eq!(store1.keys(), vec!["idempotency:k".to_string()]);
    assert!(store2.keys().is_empty());
}

#[tokio::test]
async fn test_prefix_is_part_of_the_stored_key() {
    let store = SerializingStore::default();
    let cache = cache_over(StoreRegistry::new().with_store("json", store.clone()), "json");
    let (cached, _) = snapshot(created_response(), 1024).await.unwrap();

    cache
        .config()
        .update(|c| c.idempotency.cache.prefix = "tenant-a:".to_string());
    cache.put(&key("k"), cached).await.unwrap();

    cache
        .config()
        .update(|c| c.idempotency.cache.prefix = "tenant-b:".to_string());
    assert!(cache.get(&key("k")).await.unwrap().is_none());

    assert_eq!(store.keys(), vec!["idempotency:tenant-a:k".to_string()]);
}

#[tokio::test]
async fn test_ttl_defaults_to_one_day() {
    let store = SerializingStore::default();
    let cache = cache_over(StoreRegistry::new().with_store("json", store.clone()), "json");
    let (cached, _) = snapshot(created_response(), 1024).await.unwrap();

    cache.put(&key("default"), cached.clone()).await.unwrap();
    assert_eq!(
        store.ttl_of("idempotency:default"),
        Some(Duration::from_secs(1440 * 60))
    );

    cache.config().update(|c| c.idempotency.cache.ttl = 60);
    cache.put(&key("hourly"), cached).await.unwrap();
    assert_eq!(
        store.ttl_of("idempotency:hourly"),
        Some(Duration::from_secs(3600))
    );
}

#[tokio::test]
async fn test_unknown_store_is_an_error() {
    let cache = cache_over(StoreRegistry::new(), "missing");

    let err = cache.get(&key("k")).await.unwrap_err();
    assert!(matches!(err, CacheError::UnknownStore(name) if name == "missing"));
}

#[tokio::test]
async fn test_store_errors_propagate() {
    struct BrokenStore;

    #[async_trait]
    impl CacheStore for BrokenStore {
        async fn get(&self, _key: &str) -> Result<Option<CachedResponse>, StoreError> {
            Err(StoreError::Unavailable("connection refused".to_string()))
        }

        async fn put(&self, _: &str, _: CachedResponse, _: Duration) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("connection refused".to_string()))
        }
    }

    let cache = cache_over(StoreRegistry::new().with_store("broken", BrokenStore), "broken");
    let err = cache.get(&key("k")).await.unwrap_err();
    assert!(matches!(err, CacheError::Store(StoreError::Unavailable(_))));
}
