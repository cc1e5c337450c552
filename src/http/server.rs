//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the forwarding handler
//! - Wire up middleware (request ID, tracing, timeout)
//! - Pass requests through the idempotency interceptor to the upstream service
//! - Apply configuration updates while running

use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{Request, State},
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::{ConfigHandle, GatewayConfig};
use crate::http::interceptor::ServerInterceptor;
use crate::idempotency::StoreRegistry;
use crate::observability::metrics;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub client: Client<HttpConnector, Body>,
    pub config: ConfigHandle,
    pub interceptor: ServerInterceptor,
}

/// Why a request could not be forwarded to the upstream.
#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("invalid upstream address `{0}`")]
    InvalidUpstream(String),

    #[error("upstream request failed: {0}")]
    Upstream(#[from] hyper_util::client::legacy::Error),
}

/// Reverse proxy applying the idempotency interceptor to one upstream.
pub struct GatewayServer {
    router: Router,
    config: ConfigHandle,
    stores: Arc<StoreRegistry>,
}

impl GatewayServer {
    /// Create a new gateway with the given configuration and stores.
    pub fn new(config: ConfigHandle, stores: Arc<StoreRegistry>) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());

        let state = AppState {
            client,
            config: config.clone(),
            interceptor: ServerInterceptor::new(config.clone(), stores.clone()),
        };

        let router = Self::build_router(&config.load(), state);
        Self {
            router,
            config,
            stores,
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &GatewayConfig, state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(gateway_handler))
            .route("/", any(gateway_handler))
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// The fully layered router, for serving or driving directly in tests.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn config(&self) -> &ConfigHandle {
        &self.config
    }

    /// Serve on `listener` until `shutdown` fires, applying `config_updates` as they arrive.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<GatewayConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "Gateway starting");

        let config = self.config.clone();
        let stores = self.stores.clone();
        tokio::spawn(async move {
            while let Some(new_config) = config_updates.recv().await {
                let store = &new_config.idempotency.cache.store;
                if stores.resolve(store).is_err() {
                    tracing::warn!(
                        store = %store,
                        "Reloaded config selects a store that was not built at startup"
                    );
                }
                config.store(new_config);
                tracing::info!("Configuration reloaded");
            }
        });

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("Gateway stopped");
        Ok(())
    }
}

/// Run the request through the interceptor, forwarding misses upstream.
///
/// Forwarding failures surface as 502 without being stored, so a retry with the
/// same key reaches the upstream again.
async fn gateway_handler(State(state): State<AppState>, request: Request) -> Response {
    let start_time = Instant::now();
    let method = request.method().to_string();

    let response = state
        .interceptor
        .handle(request, |request| forward(&state, request))
        .await
        .unwrap_or_else(|e| {
            e.into_response_with(|e| {
                tracing::error!(error = %e, "Upstream error");
                (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response()
            })
        });

    metrics::record_request(&method, response.status().as_u16(), start_time);
    response
}

/// Forward the request to the upstream read from the live configuration.
async fn forward(state: &AppState, request: Request) -> Result<Response, ForwardError> {
    let upstream = state.config.load().upstream.address.clone();

    let (mut parts, body) = request.into_parts();
    let path_and_query = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");

    parts.uri = format!("http://{upstream}{path_and_query}")
        .parse::<Uri>()
        .map_err(|_| ForwardError::InvalidUpstream(upstream.clone()))?;

    tracing::debug!(method = %parts.method, uri = %parts.uri, "Forwarding request");

    let response = state.client.request(Request::from_parts(parts, body)).await?;
    let (parts, body) = response.into_parts();
    Ok(Response::from_parts(parts, Body::new(body)))
}
