//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::any,
    Router,
};
use tokio::net::TcpListener;

pub const KEY_HEADER: &str = "idempotency-key";

/// A programmable upstream that counts calls and records the idempotency key of each.
#[derive(Clone)]
pub struct MockUpstream {
    pub addr: SocketAddr,
    state: Arc<UpstreamState>,
}

struct UpstreamState {
    calls: AtomicUsize,
    statuses: Vec<u16>,
    keys: Mutex<Vec<Option<String>>>,
}

impl MockUpstream {
    pub fn calls(&self) -> usize {
        self.state.calls.load(Ordering::SeqCst)
    }

    pub fn keys(&self) -> Vec<Option<String>> {
        self.state.keys.lock().unwrap().clone()
    }
}

/// Start an upstream answering 200 with `call #n` bodies.
pub async fn start_upstream() -> MockUpstream {
    start_scripted_upstream(Vec::new()).await
}

/// Start an upstream whose n-th call answers `statuses[n]`, then 200 once the script runs out.
///
/// Every answer carries `Retry-After: 0`.
pub async fn start_scripted_upstream(statuses: Vec<u16>) -> MockUpstream {
    let state = Arc::new(UpstreamState {
        calls: AtomicUsize::new(0),
        statuses,
        keys: Mutex::new(Vec::new()),
    });

    let app = Router::new()
        .route("/", any(upstream_handler))
        .route("/{*path}", any(upstream_handler))
        .with_state(state.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    MockUpstream { addr, state }
}

async fn upstream_handler(
    State(state): State<Arc<UpstreamState>>,
    headers: HeaderMap,
) -> (StatusCode, [(&'static str, &'static str); 2], String) {
    let n = state.calls.fetch_add(1, Ordering::SeqCst);
    let key = headers
        .get(KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    state.keys.lock().unwrap().push(key);

    let status = state.statuses.get(n).copied().unwrap_or(200);
    (
        StatusCode::from_u16(status).unwrap(),
        [("x-upstream", "mock"), ("retry-after", "0")],
        format!("call #{}", n + 1),
    )
}

/// An address nothing is listening on.
pub async fn unused_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}
