//! Client-side idempotency.
//!
//! # Data Flow
//! ```text
//! caller builds request
//!     → tagger.rs (stamp key if eligible and missing)
//!     → retrying.rs (send; on retryable failure, back off and resend the same request)
//!     → server sees one key for the whole logical request
//! ```

pub mod retrying;
pub mod tagger;

pub use retrying::{ClientError, IdempotentClient, TaggedResponse};
pub use tagger::{ClientTagger, IdempotencyKeyLayer, IdempotencyKeyService, OutboundRequest};
