//! Which requests participate, and where their key lives.

use axum::http::{HeaderMap, HeaderName, Method};

use crate::config::ConfigHandle;
use crate::idempotency::key::IdempotencyKey;

/// Methods whose responses are cached and replayed.
pub const ELIGIBLE_METHODS: [Method; 3] = [Method::POST, Method::PUT, Method::PATCH];

/// Method eligibility and key extraction, driven by the live configuration.
#[derive(Debug, Clone, Default)]
pub struct KeyPolicy {
    config: ConfigHandle,
}

impl KeyPolicy {
    pub fn new(config: ConfigHandle) -> Self {
        Self { config }
    }

    /// True iff `method` is POST, PUT or PATCH, compared case-insensitively.
    pub fn is_eligible(method: &Method) -> bool {
        ELIGIBLE_METHODS
            .iter()
            .any(|eligible| eligible.as_str().eq_ignore_ascii_case(method.as_str()))
    }

    /// The configured idempotency header.
    ///
    /// Validation rejects unusable names, so a failure here only happens for a config
    /// swapped in without validation; that case behaves as "no header configured".
    pub fn header_name(&self) -> Option<HeaderName> {
        HeaderName::from_bytes(self.config.load().idempotency.header.as_bytes()).ok()
    }

    /// Whether `headers` carries a non-empty value under the configured header.
    ///
    /// Looks at the raw bytes only. Used on the outbound side, where any value the
    /// caller set must be left as it is.
    pub fn has_key_header(&self, headers: &HeaderMap) -> bool {
        self.header_name()
            .and_then(|name| headers.get(&name).map(|value| !value.is_empty()))
            .unwrap_or(false)
    }

    /// Read the key from `headers`. Missing or blank values yield `None`.
    pub fn extract_key(&self, headers: &HeaderMap) -> Option<IdempotencyKey> {
        let name = self.header_name()?;
        headers.get(&name).and_then(IdempotencyKey::from_header)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_eligible_methods() {
        assert!(KeyPolicy::is_eligible(&Method::POST));
        assert!(KeyPolicy::is_eligible(&Method::PUT));
        assert!(KeyPolicy::is_eligible(&Method::PATCH));
        assert!(KeyPolicy::is_eligible(&Method::from_bytes(b"post").unwrap()));
        assert!(KeyPolicy::is_eligible(&Method::from_bytes(b"Patch").unwrap()));

        for method in [
            Method::GET,
            Method::DELETE,
            Method::HEAD,
            Method::OPTIONS,
            Method::TRACE,
            Method::CONNECT,
        ] {
            assert!(!KeyPolicy::is_eligible(&method), "{method} must be ineligible");
        }
    }

    #[test]
    fn test_extract_key_is_case_insensitive() {
        let policy = KeyPolicy::default();
        let mut headers = HeaderMap::new();
        headers.insert("idempotency-key", HeaderValue::from_static("unique-key"));

        assert_eq!(
            policy.extract_key(&headers).map(String::from),
            Some("unique-key".to_string())
        );
    }

    #[test]
    fn test_extract_key_missing_or_empty() {
        let policy = KeyPolicy::default();
        let mut headers = HeaderMap::new();
        assert_eq!(policy.extract_key(&headers), None);

        headers.insert("Idempotency-Key", HeaderValue::from_static(""));
        assert_eq!(policy.extract_key(&headers), None);

        headers.insert("Incorrect-Key", HeaderValue::from_static("unique-key"));
        assert_eq!(policy.extract_key(&headers), None);
    }

    #[test]
    fn test_has_key_header_looks_at_raw_bytes() {
        let policy = KeyPolicy::default();
        let mut headers = HeaderMap::new();
        assert!(!policy.has_key_header(&headers));

        headers.insert("Idempotency-Key", HeaderValue::from_static(""));
        assert!(!policy.has_key_header(&headers));

        headers.insert("Idempotency-Key", HeaderValue::from_static("  "));
        assert!(policy.has_key_header(&headers));
        assert_eq!(policy.extract_key(&headers), None);

        headers.insert("Idempotency-Key", HeaderValue::from_bytes(&[0xff, 0xfe]).unwrap());
        assert!(policy.has_key_header(&headers));
    }

    #[test]
    fn test_header_is_read_live() {
        let config = ConfigHandle::default();
        let policy = KeyPolicy::new(config.clone());
        let mut headers = HeaderMap::new();
        headers.insert("X-Request-Key", HeaderValue::from_static("abc"));

        assert_eq!(policy.extract_key(&headers), None);
        config.update(|c| c.idempotency.header = "X-Request-Key".into());
        assert_eq!(
            policy.extract_key(&headers).map(String::from),
            Some("abc".to_string())
        );
    }
}
