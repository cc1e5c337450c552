//! Delay between client retries.
//!
//! A `Retry-After` sent with a 429 or 503 takes precedence over the computed backoff.
//! Either way the wait never exceeds `retries.max_delay_ms`. Computed delays use equal
//! jitter: half of the exponential step is fixed and the other half is random, so
//! concurrent clients spread out without any of them retrying immediately.

use std::time::Duration;

use axum::http::{header::RETRY_AFTER, HeaderMap};
use rand::Rng;

use crate::config::RetryConfig;

/// How long to wait before retry number `attempt` (1-based).
pub fn retry_delay(attempt: u32, retries: &RetryConfig, retry_after: Option<Duration>) -> Duration {
    if let Some(wait) = retry_after {
        return wait.min(Duration::from_millis(retries.max_delay_ms));
    }
    if attempt == 0 {
        return Duration::ZERO;
    }

    let factor = 1u64.checked_shl(attempt - 1).unwrap_or(u64::MAX);
    let step = retries
        .base_delay_ms
        .saturating_mul(factor)
        .min(retries.max_delay_ms);
    let fixed = step / 2;
    let jitter = rand::thread_rng().gen_range(0..=step - fixed);

    Duration::from_millis(fixed + jitter)
}

/// The server's `Retry-After` in delta-seconds form.
///
/// The HTTP-date form is not interpreted and yields `None`, which falls back to the
/// computed backoff.
pub fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}
