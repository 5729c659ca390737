//! The transport seam every concrete adapter is built on, so adapter unit
//! tests can inject a canned responder instead of making a real network
//! call — the same posture the teacher gives `BuildsRootService` /
//! `EmailSender`: depend on `Arc<dyn Trait>`, not a concrete client.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

/// A provider HTTP response, reduced to what adapters actually inspect.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Value,
    pub retry_after: Option<Duration>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_rate_limited(&self) -> bool {
        self.status == 429
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

/// A single outbound provider call.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub bearer_token: Option<String>,
    pub json_body: Option<Value>,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            bearer_token: None,
            json_body: None,
        }
    }

    pub fn bearer(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.json_body = Some(body);
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("network error: {0}")]
    Network(String),
    #[error("response decode error: {0}")]
    Decode(String),
}

/// The injectable transport. Adapters hold `Arc<dyn HttpClient>` rather
/// than a bare `reqwest::Client` (§4.6 "Supplemental").
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// The production client: a thin wrapper over `reqwest`.
pub struct ReqwestHttpClient {
    client: reqwest::Client,
}

impl ReqwestHttpClient {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .expect("reqwest client builder"),
        }
    }
}

impl Default for ReqwestHttpClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let method = match request.method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Delete => reqwest::Method::DELETE,
        };
        let mut builder = self.client.request(method, &request.url);
        if let Some(token) = &request.bearer_token {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &request.json_body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|err| TransportError::Network(err.to_string()))?;

        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs);

        let body = response
            .json::<Value>()
            .await
            .unwrap_or(Value::Null);

        Ok(HttpResponse {
            status,
            body,
            retry_after,
        })
    }
}

/// Sends `request` and, on a `429`, sleeps for `Retry-After` (default 60s)
/// and retries exactly once (§4.6 "Rate limiting").
pub async fn send_with_rate_limit_retry(
    client: &dyn HttpClient,
    request: HttpRequest,
) -> Result<HttpResponse, TransportError> {
    let first = client.send(request.clone()).await?;
    if !first.is_rate_limited() {
        return Ok(first);
    }
    let delay = first.retry_after.unwrap_or(Duration::from_secs(60));
    tokio::time::sleep(delay).await;
    client.send(request).await
}
