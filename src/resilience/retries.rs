//! Retry classification.
//!
//! # Design Decisions
//! - Non-idempotent methods are retried only when they carry an idempotency key
//! - Connection errors are always retryable for safe requests
//! - Of the statuses, only 429 and gateway-class 5xx (502/503/504) are retried

use axum::http::{Method, StatusCode};

/// Whether a request may be sent again after this outcome.
///
/// `keyed` says the request carries an idempotency key, which makes repeating a
/// POST or PATCH safe against a deduplicating server.
pub fn is_retryable(
    method: &Method,
    keyed: bool,
    status: Option<StatusCode>,
    network_error: bool,
) -> bool {
    if !(method.is_idempotent() || keyed) {
        return false;
    }

    if network_error {
        return true;
    }

    matches!(
        status,
        Some(
            StatusCode::TOO_MANY_REQUESTS
                | StatusCode::BAD_GATEWAY
                | StatusCode::SERVICE_UNAVAILABLE
                | StatusCode::GATEWAY_TIMEOUT
        )
    )
}
