//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated)
//!     → handle.rs (ConfigHandle, shared by every subsystem)
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → atomic swap inside ConfigHandle
//!     → next request reads the new values
//! ```
//!
//! # Design Decisions
//! - Idempotency settings are read per call, never copied at startup
//! - All fields have defaults to allow minimal configs
//! - Invalid reloads are logged and dropped; the running config stays

pub mod handle;
pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use handle::ConfigHandle;
pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    CacheSettings, GatewayConfig, IdempotencyConfig, ListenerConfig, ObservabilityConfig,
    RetryConfig, StoreConfig, StoreDriver, TimeoutConfig, UpstreamConfig,
};
pub use validation::ValidationError;
