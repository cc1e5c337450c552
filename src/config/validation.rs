//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check referential integrity (the active store is declared)
//! - Validate value ranges (ttl > 0, attempts > 0)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system, including on reload

use axum::http::HeaderName;
use thiserror::Error;

use crate::config::schema::{GatewayConfig, StoreDriver};

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("idempotency.header must not be empty")]
    EmptyHeader,

    #[error("idempotency.header `{0}` is not a valid header name")]
    InvalidHeader(String),

    #[error("idempotency.cache.ttl must be at least one minute")]
    ZeroTtl,

    #[error("idempotency.cache.store `{0}` is not declared under [stores]")]
    UndeclaredStore(String),

    #[error("store `{0}` uses the redis driver but has no url")]
    MissingStoreUrl(String),

    #[error("store `{0}` has max_entries = 0")]
    ZeroCapacity(String),

    #[error("retries.max_attempts must be at least 1")]
    ZeroAttempts,
}

/// Check a parsed configuration for semantic errors.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let idempotency = &config.idempotency;

    if idempotency.header.is_empty() {
        errors.push(ValidationError::EmptyHeader);
    } else if HeaderName::from_bytes(idempotency.header.as_bytes()).is_err() {
        errors.push(ValidationError::InvalidHeader(idempotency.header.clone()));
    }

    if idempotency.cache.ttl == 0 {
        errors.push(ValidationError::ZeroTtl);
    }

    if !config.stores.contains_key(&idempotency.cache.store) {
        errors.push(ValidationError::UndeclaredStore(idempotency.cache.store.clone()));
    }

    for (name, store) in &config.stores {
        if store.driver == StoreDriver::Redis && store.url.is_none() {
            errors.push(ValidationError::MissingStoreUrl(name.clone()));
        }
        if store.max_entries == Some(0) {
            errors.push(ValidationError::ZeroCapacity(name.clone()));
        }
    }

    if config.retries.max_attempts == 0 {
        errors.push(ValidationError::ZeroAttempts);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::StoreConfig;

    #[test]
    fn test_default_config_is_valid() {
        assert_eq!(validate_config(&GatewayConfig::default()), Ok(()));
    }

    #[test]
    fn test_collects_every_error() {
        let mut config = GatewayConfig::default();
        config.idempotency.header = "bad header".into();
        config.idempotency.cache.ttl = 0;
        config.idempotency.cache.store = "missing".into();
        config.stores.insert(
            "remote".into(),
            StoreConfig {
                driver: StoreDriver::Redis,
                url: None,
                max_entries: None,
            },
        );

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![
                ValidationError::InvalidHeader("bad header".into()),
                ValidationError::ZeroTtl,
                ValidationError::UndeclaredStore("missing".into()),
                ValidationError::MissingStoreUrl("remote".into()),
            ]
        );
    }

    #[test]
    fn test_empty_header_rejected() {
        let mut config = GatewayConfig::default();
        config.idempotency.header.clear();
        assert_eq!(
            validate_config(&config),
            Err(vec![ValidationError::EmptyHeader])
        );
    }
}
