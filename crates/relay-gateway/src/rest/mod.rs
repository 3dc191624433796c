//! REST API client
//!
//! Authenticated access to the platform HTTP API. Every call takes a token
//! from the per-route rate limiter before it goes out and retries a bounded
//! number of times on throttling or server errors.

mod rate_limit;

pub use rate_limit::{RateLimitInfo, RateLimiter};

use std::sync::Arc;
use std::time::Duration;

use relay_core::entities::ChatMessage;
use relay_core::error::GatewayError;
use reqwest::header;
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use tracing::{debug, warn};

/// Attempts allowed for one call before giving up
const MAX_ATTEMPTS: u32 = 4;

/// Wait applied when a global 429 carries no Retry-After
const GLOBAL_RETRY_FALLBACK: Duration = Duration::from_secs(60);

/// Wait applied when a route 429 carries no reset delay
const ROUTE_RETRY_FALLBACK: Duration = Duration::from_secs(1);

/// Pause before retrying a 5xx answer
const SERVER_ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// Outbound request timeout
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const USER_AGENT: &str = concat!("relay/", env!("CARGO_PKG_VERSION"));

/// Route keys used for rate limit bucketing
const ROUTE_GATEWAY_BOT: &str = "GET /gateway/bot";
const ROUTE_CREATE_MESSAGE: &str = "POST /channels/:id/messages";
const ROUTE_DELETE_MESSAGE: &str = "DELETE /channels/:id/messages/:id";

/// Connection info returned by the gateway discovery endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayBotInfo {
    /// WebSocket URL to dial
    pub url: String,
}

/// HTTP client for the platform API
pub struct RestClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
    limiter: Arc<RateLimiter>,
}

impl RestClient {
    pub fn new(
        base_url: impl Into<String>,
        token: impl Into<String>,
        limiter: Arc<RateLimiter>,
    ) -> Result<Self, GatewayError> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        let base_url = base_url.into().trim_end_matches('/').to_string();

        Ok(Self {
            http,
            base_url,
            token: token.into(),
            limiter,
        })
    }

    /// Look up the WebSocket URL the gateway should dial
    pub async fn get_gateway_bot(&self) -> Result<GatewayBotInfo, GatewayError> {
        let request = self.request(Method::GET, "/gateway/bot");
        let response = check_status(self.execute(ROUTE_GATEWAY_BOT, request).await?).await?;

        response
            .json::<GatewayBotInfo>()
            .await
            .map_err(|e| GatewayError::Protocol(format!("malformed gateway info: {e}")))
    }

    /// Post a message to a channel. The payload must already be the JSON
    /// body the API expects.
    pub async fn create_message(
        &self,
        channel_id: &str,
        payload_json: &str,
    ) -> Result<ChatMessage, GatewayError> {
        let path = format!("/channels/{channel_id}/messages");
        let request = self
            .request(Method::POST, &path)
            .header(header::CONTENT_TYPE, "application/json")
            .body(payload_json.to_string());

        let response = check_status(self.execute(ROUTE_CREATE_MESSAGE, request).await?).await?;

        response
            .json::<ChatMessage>()
            .await
            .map_err(|e| GatewayError::Protocol(format!("malformed message response: {e}")))
    }

    /// Delete a message from a channel
    pub async fn delete_message(
        &self,
        channel_id: &str,
        message_id: &str,
    ) -> Result<(), GatewayError> {
        let path = format!("/channels/{channel_id}/messages/{message_id}");
        let request = self.request(Method::DELETE, &path);

        check_status(self.execute(ROUTE_DELETE_MESSAGE, request).await?).await?;
        Ok(())
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, format!("{}{path}", self.base_url))
            .header(header::AUTHORIZATION, format!("Bot {}", self.token))
    }

    /// Send a request under the rate limiter, retrying 429s and 5xxs a
    /// bounded number of times.
    async fn execute(
        &self,
        route: &'static str,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, GatewayError> {
        let mut rate_limited_for = None;

        for attempt in 1..=MAX_ATTEMPTS {
            self.limiter.acquire(route).await?;

            let attempt_request = request
                .try_clone()
                .ok_or_else(|| GatewayError::Transport("request body is not replayable".to_string()))?;

            let response = match attempt_request.send().await {
                Ok(response) => response,
                Err(e) => {
                    self.limiter.release(route);
                    return Err(GatewayError::Transport(e.to_string()));
                }
            };

            let info = RateLimitInfo::from_headers(response.headers());
            self.limiter.update(route, &info);

            let status = response.status();
            if status == StatusCode::TOO_MANY_REQUESTS {
                if info.global {
                    let retry_after = info.retry_after.unwrap_or(GLOBAL_RETRY_FALLBACK);
                    warn!(
                        route,
                        attempt,
                        retry_after_secs = retry_after.as_secs(),
                        "Hit global rate limit"
                    );
                    self.limiter.set_global(retry_after);
                    rate_limited_for = Some(retry_after);
                } else {
                    let wait = info
                        .reset_after
                        .or(info.retry_after)
                        .unwrap_or(ROUTE_RETRY_FALLBACK);
                    warn!(
                        route,
                        attempt,
                        wait_ms = wait.as_millis() as u64,
                        "Hit route rate limit"
                    );
                    tokio::time::sleep(wait).await;
                    rate_limited_for = Some(wait);
                }
                continue;
            }

            if status.is_server_error() {
                warn!(route, attempt, status = status.as_u16(), "Server error, retrying");
                rate_limited_for = None;
                tokio::time::sleep(SERVER_ERROR_BACKOFF).await;
                continue;
            }

            debug!(route, status = status.as_u16(), "Request completed");
            return Ok(response);
        }

        match rate_limited_for {
            Some(retry_after) => Err(GatewayError::RateLimited { retry_after }),
            None => Err(GatewayError::MaxRetriesExceeded {
                route,
                attempts: MAX_ATTEMPTS,
            }),
        }
    }
}

/// Map non-success statuses, logging the response body for diagnosis
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, GatewayError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::NOT_FOUND {
        return Err(GatewayError::NotFound);
    }

    let body = response.text().await.unwrap_or_default();
    warn!(status = status.as_u16(), body = %body, "API request rejected");
    Err(GatewayError::UnexpectedStatus(status.as_u16()))
}
