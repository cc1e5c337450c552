//! Idempotency core.
//!
//! # Data Flow
//! ```text
//! inbound request
//!     → policy.rs (method eligible? key present?)
//!     → cache.rs (namespace key, pick store from live config)
//!     → registry.rs → store.rs (get / put with ttl)
//!     → snapshot.rs (capture or replay the response)
//! ```
//!
//! # Design Decisions
//! - Only POST, PUT and PATCH participate
//! - A missing or empty key means "not participating", never an error
//! - Store failures propagate; nothing here retries or falls back
//! - Concurrent first requests sharing a key both execute; there is no claim step

pub mod cache;
pub mod key;
pub mod policy;
pub mod registry;
pub mod snapshot;
pub mod store;

pub use cache::{namespaced_key, CacheError, ResponseCache, NAMESPACE};
pub use key::IdempotencyKey;
pub use policy::KeyPolicy;
pub use registry::StoreRegistry;
pub use snapshot::{capture, snapshot, CachedResponse, Capture, DiagnosticContext};
pub use store::{CacheStore, MemoryStore, RedisStore, StoreError};
