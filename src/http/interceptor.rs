//! Server-side idempotency interceptor.
//!
//! # Per-request state machine
//! ```text
//! START → CHECK_ELIGIBLE ─ ineligible ─────────────→ PASSTHROUGH
//!               │
//!               ▼
//!         CHECK_KEY ─────── absent ────────────────→ PASSTHROUGH
//!               │
//!               ▼
//!         LOOKUP ────────── hit ───────────────────→ REPLAY
//!               │
//!               ▼ miss
//!         EXECUTE → STORE → RETURN
//! ```
//!
//! # Design Decisions
//! - A hit never reaches the downstream handler
//! - Downstream failures propagate and are not cached, so a retry re-executes
//! - Cache failures propagate too; a broken store is not treated as a miss

use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tower::{Layer, Service};

use crate::config::ConfigHandle;
use crate::idempotency::{capture, CacheError, Capture, KeyPolicy, ResponseCache, StoreRegistry};
use crate::observability::metrics;

/// Why an intercepted request failed.
#[derive(Debug, Error)]
pub enum InterceptError<E> {
    #[error("idempotency cache failure: {0}")]
    Cache(#[from] CacheError),

    #[error("response body could not be read: {0}")]
    Body(axum::Error),

    #[error("downstream handler failed: {0}")]
    Downstream(E),
}

impl<E> InterceptError<E> {
    /// Turn the error into a response, using `downstream` for handler failures.
    ///
    /// Cache failures become 503 and unreadable response bodies 500.
    pub fn into_response_with(self, downstream: impl FnOnce(E) -> Response) -> Response {
        match self {
            InterceptError::Downstream(e) => downstream(e),
            InterceptError::Cache(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, "Idempotency cache unavailable").into_response()
            }
            InterceptError::Body(e) => {
                tracing::error!(error = %e, "Response body failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "Response body failed").into_response()
            }
        }
    }
}

/// Replays stored responses for repeated idempotency keys.
#[derive(Clone)]
pub struct ServerInterceptor {
    policy: KeyPolicy,
    cache: ResponseCache,
}

impl ServerInterceptor {
    pub fn new(config: ConfigHandle, stores: Arc<StoreRegistry>) -> Self {
        Self {
            policy: KeyPolicy::new(config.clone()),
            cache: ResponseCache::new(config, stores),
        }
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    /// Run `request` through the interceptor, calling `next` only when no stored
    /// response exists for its key.
    pub async fn handle<F, Fut, E>(
        &self,
        request: Request,
        next: F,
    ) -> Result<Response, InterceptError<E>>
    where
        F: FnOnce(Request) -> Fut,
        Fut: Future<Output = Result<Response, E>>,
    {
        if !KeyPolicy::is_eligible(request.method()) {
            metrics::record_passthrough("method");
            return next(request).await.map_err(InterceptError::Downstream);
        }

        let Some(key) = self.policy.extract_key(request.headers()) else {
            metrics::record_passthrough("no_key");
            return next(request).await.map_err(InterceptError::Downstream);
        };

        let cached = self.cache.get(&key).await.inspect_err(|e| {
            metrics::record_store_error("get");
            tracing::error!(key = %key, error = %e, "Idempotency lookup failed");
        })?;

        if let Some(cached) = cached {
            metrics::record_lookup(true);
            tracing::info!(
                key = %key,
                method = %request.method(),
                status = cached.status,
                "Replaying stored response"
            );
            return Ok(cached.to_response());
        }

        metrics::record_lookup(false);
        let method = request.method().clone();
        let response = next(request).await.map_err(InterceptError::Downstream)?;

        let limit = self.cache.config().load().idempotency.max_body_bytes;
        let (cached, response) = match capture(response, limit)
            .await
            .map_err(InterceptError::Body)?
        {
            Capture::Stored(cached, response) => (cached, response),
            Capture::Oversized(response) => {
                metrics::record_passthrough("oversized");
                tracing::warn!(
                    key = %key,
                    method = %method,
                    limit,
                    "Response body exceeds max_body_bytes, returned without storing"
                );
                return Ok(response);
            }
        };

        self.cache.put(&key, cached).await.inspect_err(|e| {
            metrics::record_store_error("put");
            tracing::error!(key = %key, error = %e, "Failed to store response");
        })?;

        tracing::debug!(
            key = %key,
            method = %method,
            status = response.status().as_u16(),
            "Stored response for first execution"
        );
        Ok(response)
    }
}

/// Axum middleware wrapping the rest of the router in a [`ServerInterceptor`].
///
/// ```ignore
/// router.layer(axum::middleware::from_fn_with_state(interceptor, idempotency_middleware))
/// ```
pub async fn idempotency_middleware(
    State(interceptor): State<ServerInterceptor>,
    request: Request,
    next: Next,
) -> Response {
    interceptor
        .handle(request, |request| async move {
            Ok::<_, Infallible>(next.run(request).await)
        })
        .await
        .unwrap_or_else(|e| e.into_response_with(|never| match never {}))
}

/// Tower layer form of the interceptor, for services whose errors should propagate.
#[derive(Clone)]
pub struct IdempotencyLayer {
    interceptor: ServerInterceptor,
}

impl IdempotencyLayer {
    pub fn new(interceptor: ServerInterceptor) -> Self {
        Self { interceptor }
    }
}

impl<S> Layer<S> for IdempotencyLayer {
    type Service = IdempotencyService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        IdempotencyService {
            inner,
            interceptor: self.interceptor.clone(),
        }
    }
}

#[derive(Clone)]
pub struct IdempotencyService<S> {
    inner: S,
    interceptor: ServerInterceptor,
}

impl<S> Service<Request> for IdempotencyService<S>
where
    S: Service<Request, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Send + 'static,
{
    type Response = Response;
    type Error = InterceptError<S::Error>;
    type Future = Pin<Box<dyn Future<Output = Result<Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(InterceptError::Downstream)
    }

    fn call(&mut self, request: Request) -> Self::Future {
        // The ready service goes into the future; the clone stays for the next call.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let interceptor = self.interceptor.clone();

        Box::pin(async move {
            interceptor
                .handle(request, move |request| inner.call(request))
                .await
        })
    }
}
