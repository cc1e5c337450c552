//! Client-side request tagging.
//!
//! # Responsibilities
//! - Give every outgoing POST/PUT/PATCH an idempotency key
//! - Keep an existing key untouched so every retry of a request sends the same key
//!
//! # Design Decisions
//! - Requests are taken and returned by value; callers always send the returned value
//! - Works on `http::Request<B>` and `reqwest::Request` through [`OutboundRequest`]

use std::task::{Context, Poll};

use axum::http::{HeaderMap, Method, Request};
use tower::{Layer, Service};

use crate::config::ConfigHandle;
use crate::idempotency::{IdempotencyKey, KeyPolicy};
use crate::observability::metrics;

/// The parts of an outgoing request the tagger needs.
pub trait OutboundRequest {
    fn method(&self) -> &Method;
    fn headers(&self) -> &HeaderMap;
    fn headers_mut(&mut self) -> &mut HeaderMap;
}

impl<B> OutboundRequest for Request<B> {
    fn method(&self) -> &Method {
        Request::method(self)
    }

    fn headers(&self) -> &HeaderMap {
        Request::headers(self)
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        Request::headers_mut(self)
    }
}

impl OutboundRequest for reqwest::Request {
    fn method(&self) -> &Method {
        reqwest::Request::method(self)
    }

    fn headers(&self) -> &HeaderMap {
        reqwest::Request::headers(self)
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        reqwest::Request::headers_mut(self)
    }
}

/// Stamps idempotency keys onto outgoing requests.
#[derive(Debug, Clone, Default)]
pub struct ClientTagger {
    policy: KeyPolicy,
}

impl ClientTagger {
    pub fn new(config: ConfigHandle) -> Self {
        Self {
            policy: KeyPolicy::new(config),
        }
    }

    /// Return `request` carrying an idempotency key if its method is eligible.
    ///
    /// A request that already has a non-empty key comes back unchanged, whatever the
    /// bytes of that key are.
    pub fn tag<R: OutboundRequest>(&self, mut request: R) -> R {
        if !KeyPolicy::is_eligible(request.method()) {
            return request;
        }

        if self.policy.has_key_header(request.headers()) {
            return request;
        }

        let Some(header) = self.policy.header_name() else {
            tracing::warn!("Idempotency header name is not usable, sending request untagged");
            return request;
        };

        let key = IdempotencyKey::generate();
        tracing::debug!(key = %key, method = %request.method(), "Generated idempotency key");
        metrics::record_key_generated();
        request.headers_mut().insert(header, key.to_header_value());
        request
    }

    /// The key `request` currently carries.
    pub fn key_of<R: OutboundRequest>(&self, request: &R) -> Option<IdempotencyKey> {
        self.policy.extract_key(request.headers())
    }
}

/// Tower layer that runs every request through a [`ClientTagger`] before the inner service.
///
/// Place it inside any retry layer so a retried request is re-tagged and keeps its key.
#[derive(Debug, Clone, Default)]
pub struct IdempotencyKeyLayer {
    tagger: ClientTagger,
}

impl IdempotencyKeyLayer {
    pub fn new(tagger: ClientTagger) -> Self {
        Self { tagger }
    }
}

impl<S> Layer<S> for IdempotencyKeyLayer {
    type Service = IdempotencyKeyService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        IdempotencyKeyService {
            inner,
            tagger: self.tagger.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct IdempotencyKeyService<S> {
    inner: S,
    tagger: ClientTagger,
}

impl<S, B> Service<Request<B>> for IdempotencyKeyService<S>
where
    S: Service<Request<B>>,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<B>) -> Self::Future {
        let request = self.tagger.tag(request);
        self.inner.call(request)
    }
}
