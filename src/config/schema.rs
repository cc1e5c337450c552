//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Name of the store declared by [`GatewayConfig::default`].
pub const DEFAULT_STORE: &str = "memory";

/// Root configuration for the idempotency gateway.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// The single upstream service requests are forwarded to.
    pub upstream: UpstreamConfig,

    /// Idempotency header and cache settings.
    pub idempotency: IdempotencyConfig,

    /// Named backing stores, selected by `idempotency.cache.store`.
    pub stores: BTreeMap<String, StoreConfig>,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Client-side retry configuration.
    pub retries: RetryConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        let mut stores = BTreeMap::new();
        stores.insert(DEFAULT_STORE.to_string(), StoreConfig::default());

        Self {
            listener: ListenerConfig::default(),
            upstream: UpstreamConfig::default(),
            idempotency: IdempotencyConfig::default(),
            stores,
            timeouts: TimeoutConfig::default(),
            retries: RetryConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Upstream service configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Upstream address (e.g., "127.0.0.1:3000").
    pub address: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:3000".to_string(),
        }
    }
}

/// Idempotency settings. Read on every request, so hot reloads apply immediately.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct IdempotencyConfig {
    /// Request header carrying the idempotency key.
    pub header: String,

    /// Largest response body that will be buffered for caching.
    pub max_body_bytes: usize,

    pub cache: CacheSettings,
}

impl Default for IdempotencyConfig {
    fn default() -> Self {
        Self {
            header: "Idempotency-Key".to_string(),
            max_body_bytes: 2 * 1024 * 1024,
            cache: CacheSettings::default(),
        }
    }
}

/// Where and for how long responses are kept.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Name of the entry in `stores` to use.
    pub store: String,

    /// Appended to the fixed `idempotency:` namespace.
    pub prefix: String,

    /// Minutes until a stored response expires.
    pub ttl: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            store: DEFAULT_STORE.to_string(),
            prefix: String::new(),
            ttl: 1440,
        }
    }
}

/// Backing store driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreDriver {
    #[default]
    Memory,
    Redis,
}

/// A named backing store.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct StoreConfig {
    pub driver: StoreDriver,

    /// Connection URL, required for the redis driver.
    pub url: Option<String>,

    /// Entry cap for the memory driver (unbounded when absent).
    pub max_entries: Option<usize>,
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Retry configuration for the idempotent client.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first.
    pub max_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 100,
            max_delay_ms: 2000,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit JSON log lines instead of the human-readable format.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
