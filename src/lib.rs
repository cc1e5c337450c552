//! Idempotency keys for HTTP.
//!
//! Makes POST, PUT and PATCH safe to retry. The server half caches the first response
//! produced for an idempotency key and replays it for later requests with the same key;
//! the client half stamps each outgoing request with a key that survives retries.

pub mod client;
pub mod config;
pub mod http;
pub mod idempotency;
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use client::{ClientTagger, IdempotentClient};
pub use config::{ConfigHandle, GatewayConfig};
pub use http::{GatewayServer, ServerInterceptor};
pub use idempotency::{IdempotencyKey, KeyPolicy, ResponseCache, StoreRegistry};
pub use lifecycle::Shutdown;
