//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, tracing, timeout)
//!     → interceptor.rs (replay stored response, or execute and store)
//!     → server.rs forward (send to upstream)
//!     → Send to client
//! ```

pub mod interceptor;
pub mod server;

pub use interceptor::{
    idempotency_middleware, IdempotencyLayer, IdempotencyService, InterceptError,
    ServerInterceptor,
};
pub use server::{ForwardError, GatewayServer};
