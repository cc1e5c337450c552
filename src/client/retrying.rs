//! Retrying HTTP client built on the tagger.

use axum::http::Method;
use reqwest::{IntoUrl, RequestBuilder};
use thiserror::Error;

use crate::client::tagger::ClientTagger;
use crate::config::ConfigHandle;
use crate::idempotency::IdempotencyKey;
use crate::resilience::{is_retryable, retry_after, retry_delay};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("request body cannot be replayed for a retry")]
    BodyNotReplayable,
}

/// A completed exchange.
#[derive(Debug)]
pub struct TaggedResponse {
    /// Key the request was sent with, if its method is eligible.
    pub key: Option<IdempotencyKey>,
    /// Number of attempts made, including the successful one.
    pub attempts: u32,
    pub response: reqwest::Response,
}

/// HTTP client that tags each logical request once and retries it with the same key.
#[derive(Clone)]
pub struct IdempotentClient {
    client: reqwest::Client,
    tagger: ClientTagger,
    config: ConfigHandle,
}

impl IdempotentClient {
    pub fn new(client: reqwest::Client, config: ConfigHandle) -> Self {
        Self {
            client,
            tagger: ClientTagger::new(config.clone()),
            config,
        }
    }

    /// Start building a request with the underlying client.
    pub fn request(&self, method: Method, url: impl IntoUrl) -> RequestBuilder {
        self.client.request(method, url)
    }

    /// Send `request`, retrying transport errors and retryable statuses.
    ///
    /// A `Retry-After` on a retryable response sets the wait, capped like any backoff.
    ///
    /// The key is fixed before the first attempt, so every attempt carries it.
    pub async fn execute(&self, request: reqwest::Request) -> Result<TaggedResponse, ClientError> {
        let request = self.tagger.tag(request);
        let key = self.tagger.key_of(&request);
        let method = request.method().clone();
        let retries = self.config.load().retries.clone();

        if request.try_clone().is_none() {
            tracing::debug!(method = %method, "Streaming body, sending without retries");
            let response = self.client.execute(request).await?;
            return Ok(TaggedResponse {
                key,
                attempts: 1,
                response,
            });
        }

        let mut attempts = 0;
        loop {
            attempts += 1;
            let attempt = request.try_clone().ok_or(ClientError::BodyNotReplayable)?;
            let can_retry = attempts < retries.max_attempts;

            match self.client.execute(attempt).await {
                Ok(response) => {
                    let status = response.status();
                    if can_retry && is_retryable(&method, key.is_some(), Some(status), false) {
                        let delay =
                            retry_delay(attempts, &retries, retry_after(response.headers()));
                        tracing::info!(
                            key = ?key.as_ref().map(IdempotencyKey::as_str),
                            attempt = attempts,
                            status = %status,
                            delay = ?delay,
                            "Retrying request"
                        );
                        tokio::time::sleep(delay).await;
                        continue;
                    }

                    return Ok(TaggedResponse {
                        key,
                        attempts,
                        response,
                    });
                }
                Err(e) => {
                    let network_error = e.is_connect() || e.is_timeout() || e.is_request();
                    if can_retry && is_retryable(&method, key.is_some(), None, network_error) {
                        let delay = retry_delay(attempts, &retries, None);
                        tracing::info!(
                            key = ?key.as_ref().map(IdempotencyKey::as_str),
                            attempt = attempts,
                            error = %e,
                            delay = ?delay,
                            "Retrying after network error"
                        );
                        tokio::time::sleep(delay).await;
                        continue;
                    }

                    tracing::error!(attempt = attempts, error = %e, "Request failed");
                    return Err(ClientError::Transport(e));
                }
            }
        }
    }
}
