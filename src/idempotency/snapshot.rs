//! Replayable response snapshots.
//!
//! A response is split into two parts: what the client sees (status, headers, body)
//! and internal diagnostics carried in [`DiagnosticContext`]. Only the first part is
//! ever captured in a [`CachedResponse`].

use std::fmt;
use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::http::{header::CONTENT_LENGTH, response::Parts, HeaderName, HeaderValue, StatusCode};
use axum::response::Response;
use serde::{Deserialize, Serialize};

/// Error detail attached to a response for logging and debugging.
///
/// Lives in the response extensions and is never part of a snapshot, so whatever it
/// wraps does not need to be serializable.
#[derive(Clone)]
pub struct DiagnosticContext(Arc<dyn std::error::Error + Send + Sync>);

impl DiagnosticContext {
    pub fn new(error: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self(Arc::new(error))
    }

    /// Attach `error` to `response`.
    pub fn attach(response: &mut Response, error: impl std::error::Error + Send + Sync + 'static) {
        response.extensions_mut().insert(Self::new(error));
    }

    /// The diagnostic attached to `response`, if any.
    pub fn of(response: &Response) -> Option<&Self> {
        response.extensions().get::<Self>()
    }

    pub fn error(&self) -> &(dyn std::error::Error + Send + Sync) {
        self.0.as_ref()
    }
}

impl fmt::Debug for DiagnosticContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("DiagnosticContext")
            .field(&self.0.to_string())
            .finish()
    }
}

/// The stored form of a response.
///
/// Headers keep their order and repeated names. Names are the lowercase form
/// `HeaderMap` normalizes to, so the casing a handler used is not preserved. Values are
/// raw bytes because header values are not required to be UTF-8.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedResponse {
    pub body: Vec<u8>,
    pub status: u16,
    pub headers: Vec<(String, Vec<u8>)>,
}

impl CachedResponse {
    /// Capture the visible part of a response. Extensions, including any
    /// [`DiagnosticContext`], are left behind.
    pub fn from_parts(parts: &Parts, body: &[u8]) -> Self {
        Self {
            body: body.to_vec(),
            status: parts.status.as_u16(),
            headers: parts
                .headers
                .iter()
                .map(|(name, value)| (name.as_str().to_string(), value.as_bytes().to_vec()))
                .collect(),
        }
    }

    /// Rebuild a response equivalent to the one captured.
    ///
    /// Entries that no longer parse as header names or values are skipped; they can
    /// only come from a store holding data this crate did not write.
    pub fn to_response(&self) -> Response {
        let mut response = Response::new(Body::from(self.body.clone()));
        *response.status_mut() =
            StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let headers = response.headers_mut();
        for (name, value) in &self.headers {
            match (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_bytes(value),
            ) {
                (Ok(name), Ok(value)) => {
                    headers.append(name, value);
                }
                _ => tracing::warn!(header = %name, "Skipping unreadable cached header"),
            }
        }

        response
    }

    /// The HTTP/1.1 wire form: status line, headers, blank line, body.
    pub fn to_wire(&self) -> Vec<u8> {
        let reason = StatusCode::from_u16(self.status)
            .ok()
            .and_then(|s| s.canonical_reason())
            .unwrap_or("");

        let mut wire = format!("HTTP/1.1 {} {}\r\n", self.status, reason).into_bytes();
        for (name, value) in &self.headers {
            wire.extend_from_slice(name.as_bytes());
            wire.extend_from_slice(b": ");
            wire.extend_from_slice(value);
            wire.extend_from_slice(b"\r\n");
        }
        wire.extend_from_slice(b"\r\n");
        wire.extend_from_slice(&self.body);
        wire
    }
}

/// Buffer `response` (up to `limit` bytes of body) and capture it.
///
/// Returns the snapshot together with a response to hand back to the caller. The
/// returned response keeps the original extensions, diagnostics included.
pub async fn snapshot(
    response: Response,
    limit: usize,
) -> Result<(CachedResponse, Response), axum::Error> {
    let (parts, body) = response.into_parts();
    let bytes: Bytes = axum::body::to_bytes(body, limit).await?;
    let cached = CachedResponse::from_parts(&parts, &bytes);
    Ok((cached, Response::from_parts(parts, Body::from(bytes))))
}

/// Outcome of [`capture`].
#[derive(Debug)]
pub enum Capture {
    /// The body fit within the limit. Carries the snapshot and the response to return.
    Stored(CachedResponse, Response),
    /// The body is larger than the limit. The response is handed back intact.
    Oversized(Response),
}

/// Capture `response` for storage if its body fits in `limit` bytes.
///
/// A response whose `Content-Length` already exceeds the limit is returned without
/// being read. Otherwise the body is buffered in full, so a response that turns out
/// too large still reaches the caller unchanged.
pub async fn capture(response: Response, limit: usize) -> Result<Capture, axum::Error> {
    let declared = response
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());
    if declared.is_some_and(|len| len > limit as u64) {
        return Ok(Capture::Oversized(response));
    }

    let (parts, body) = response.into_parts();
    let bytes: Bytes = axum::body::to_bytes(body, usize::MAX).await?;
    if bytes.len() > limit {
        return Ok(Capture::Oversized(Response::from_parts(parts, Body::from(bytes))));
    }

    let cached = CachedResponse::from_parts(&parts, &bytes);
    Ok(Capture::Stored(
        cached,
        Response::from_parts(parts, Body::from(bytes)),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header;

    fn sample() -> Response {
        let mut response = Response::new(Body::from("content"));
        response
            .headers_mut()
            .insert("Header", HeaderValue::from_static("Value"));
        response
    }

    #[tokio::test]
    async fn test_snapshot_captures_visible_response() {
        let (cached, returned) = snapshot(sample(), 1024).await.unwrap();

        assert_eq!(cached.status, 200);
        assert_eq!(cached.body, b"content");
        assert_eq!(cached.headers, vec![("header".to_string(), b"Value".to_vec())]);
        assert_eq!(
            cached.to_wire(),
            b"HTTP/1.1 200 OK\r\nheader: Value\r\n\r\ncontent".to_vec()
        );

        let body = axum::body::to_bytes(returned.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"content");
    }

    #[tokio::test]
    async fn test_diagnostics_stay_out_of_the_snapshot() {
        let mut response = sample();
        let err = std::io::Error::new(std::io::ErrorKind::Other, "validation failed");
        DiagnosticContext::attach(&mut response, err);

        let (cached, returned) = snapshot(response, 1024).await.unwrap();

        assert!(DiagnosticContext::of(&returned).is_some());
        assert!(DiagnosticContext::of(&cached.to_response()).is_none());
        assert!(serde_json::to_string(&cached).is_ok());
    }

    #[tokio::test]
    async fn test_multi_value_headers_keep_order() {
        let mut response = Response::new(Body::empty());
        *response.status_mut() = StatusCode::FOUND;
        let headers = response.headers_mut();
        headers.append(header::SET_COOKIE, HeaderValue::from_static("a=1"));
        headers.append(header::SET_COOKIE, HeaderValue::from_static("b=2"));
        headers.insert(header::LOCATION, HeaderValue::from_static("http://google.ca"));

        let (cached, _) = snapshot(response, 1024).await.unwrap();
        let replayed = cached.to_response();

        let cookies: Vec<_> = replayed.headers().get_all(header::SET_COOKIE).iter().collect();
        assert_eq!(cookies, vec!["a=1", "b=2"]);
        assert_eq!(replayed.status(), StatusCode::FOUND);

        let (again, _) = snapshot(replayed, 1024).await.unwrap();
        assert_eq!(again.to_wire(), cached.to_wire());
    }

    #[tokio::test]
    async fn test_body_over_limit_is_an_error() {
        let response = Response::new(Body::from(vec![0u8; 64]));
        assert!(snapshot(response, 16).await.is_err());
    }

    #[tokio::test]
    async fn test_capture_keeps_oversized_bodies() {
        let body = "x".repeat(64);
        let response = Response::new(Body::from(body.clone()));

        let Capture::Oversized(returned) = capture(response, 16).await.unwrap() else {
            panic!("a 64 byte body must not fit in 16 bytes");
        };
        let bytes = axum::body::to_bytes(returned.into_body(), 1024).await.unwrap();
        assert_eq!(&bytes[..], body.as_bytes());
    }

    #[tokio::test]
    async fn test_capture_skips_reading_declared_oversized_bodies() {
        let mut response = Response::new(Body::from("x".repeat(64)));
        response
            .headers_mut()
            .insert(CONTENT_LENGTH, HeaderValue::from_static("64"));

        let captured = capture(response, 16).await.unwrap();
        assert!(matches!(captured, Capture::Oversized(_)));
    }

    #[tokio::test]
    async fn test_capture_stores_bodies_within_limit() {
        let Capture::Stored(cached, _) = capture(sample(), 7).await.unwrap() else {
            panic!("a 7 byte body fits in 7 bytes");
        };
        assert_eq!(cached.body, b"content");
    }
}
