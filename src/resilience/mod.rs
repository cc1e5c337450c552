//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Request from the idempotent client:
//!     → On failure: retries.rs (check if retryable)
//!     → backoff.rs (server Retry-After, else exponential delay with jitter)
//!     → same request, same idempotency key, sent again
//! ```
//!
//! # Design Decisions
//! - An idempotency key is what makes retrying POST/PATCH safe
//! - Jittered backoff prevents thundering herd

pub mod backoff;
pub mod retries;

pub use backoff::{retry_after, retry_delay};
pub use retries::is_retryable;
