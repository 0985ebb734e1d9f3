//! # Direct Transport Executor
//!
//! Performs one network exchange for a fully-resolved request descriptor.
//! Ordinary HTTP failures (4xx/5xx) never escape as errors: everything is
//! folded into the uniform [`NormalizedResponse`], and transport-level
//! faults (DNS, connection reset, timeout) map to status 0.
//!
//! Steps run strictly in order for each call: validate, build the URL,
//! assemble headers, inject credentials, derive the timeout budget, execute,
//! normalize. A 401 in multi-user mode is handed to [`AuthRetryPolicy`] for
//! the single refresh-and-retry; the retry attempt rebuilds the request from
//! a fresh config snapshot and gets a fresh timeout budget.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::auth::{self, AuthRetryPolicy};
use crate::core::config::{ConfigProvider, GatewayConfig};
use crate::core::error::{GatewayError, GatewayResult};
use crate::core::timeout::TimeoutConfig;
use crate::core::types::{NormalizedResponse, RequestBody, RequestDescriptor};
use crate::transport::{ErrorSource, Transport};

/// Transport strategy performing direct network calls with `reqwest`
pub struct DirectTransport {
    client: reqwest::Client,
    provider: Arc<dyn ConfigProvider>,
    timeouts: TimeoutConfig,
}

impl DirectTransport {
    pub fn new(provider: Arc<dyn ConfigProvider>, timeouts: TimeoutConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            provider,
            timeouts,
        }
    }

    async fn perform(&self, descriptor: &RequestDescriptor) -> GatewayResult<NormalizedResponse> {
        let policy = AuthRetryPolicy::new(self.provider.as_ref());
        policy
            .run(|config| self.attempt(descriptor, config))
            .await
    }

    /// One complete attempt: build, send, normalize. Errors are folded into
    /// the normalized shape here so the retry policy sees plain responses.
    async fn attempt(&self, descriptor: &RequestDescriptor, config: GatewayConfig) -> NormalizedResponse {
        match self.send_once(descriptor, &config).await {
            Ok(response) => response,
            Err(err) => NormalizedResponse::from_error(&err),
        }
    }

    async fn send_once(
        &self,
        descriptor: &RequestDescriptor,
        config: &GatewayConfig,
    ) -> GatewayResult<NormalizedResponse> {
        let url = build_url(&config.server_url, descriptor)?;
        let headers = build_headers(descriptor, config)?;
        let method = Method::from_bytes(descriptor.method.as_bytes())
            .map_err(|_| GatewayError::config(format!("invalid HTTP method: {}", descriptor.method)))?;

        let mut request = self.client.request(method, url).headers(headers);
        request = match &descriptor.body {
            RequestBody::Empty => request,
            RequestBody::Json(value) => request.body(serde_json::to_vec(value)?),
            RequestBody::Text(text) => request.body(text.clone()),
            RequestBody::Binary { data, .. } => request.body(data.clone()),
        };

        let budget = descriptor
            .timeout
            .unwrap_or_else(|| self.timeouts.budget_for(&descriptor.path));

        // The select! scope drops the in-flight call and the timer on every
        // exit path, so neither can leak past this function.
        let send = tokio::time::timeout(budget, request.send());
        let outcome = match &descriptor.cancellation {
            Some(token) => {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => return Err(GatewayError::Cancelled),
                    outcome = send => outcome,
                }
            }
            None => send.await,
        };

        let response = match outcome {
            Ok(Ok(response)) => response,
            Ok(Err(err)) => {
                return Err(GatewayError::transport(format!("request failed: {err}")));
            }
            Err(_) => {
                return Err(GatewayError::transport(format!(
                    "request timed out after {}ms",
                    budget.as_millis()
                )));
            }
        };

        Ok(normalize(response).await)
    }
}

#[async_trait]
impl Transport for DirectTransport {
    fn name(&self) -> &'static str {
        "direct"
    }

    fn source(&self) -> ErrorSource {
        ErrorSource::Direct
    }

    async fn execute(&self, descriptor: &RequestDescriptor) -> GatewayResult<NormalizedResponse> {
        // The direct transport is the last resort: it never asks the
        // dispatcher to fall through, so every failure is a final verdict.
        Ok(match self.perform(descriptor).await {
            Ok(response) => response,
            Err(err) => NormalizedResponse::from_error(&err),
        })
    }
}

/// Join the configured base URL and the request path
fn build_url(server_url: &str, descriptor: &RequestDescriptor) -> GatewayResult<Url> {
    if descriptor.has_absolute_path() {
        return Url::parse(&descriptor.path)
            .map_err(|err| GatewayError::config(format!("invalid absolute URL: {err}")));
    }

    let base = server_url.trim();
    if base.is_empty() {
        return Err(GatewayError::config(
            "no server URL is configured; set one in the server connection settings",
        ));
    }

    let base = Url::parse(base)
        .map_err(|err| GatewayError::config(format!("invalid server URL {base:?}: {err}")))?;
    base.join(&descriptor.path)
        .map_err(|err| GatewayError::config(format!("invalid request path {:?}: {err}", descriptor.path)))
}

/// Assemble the final header map: caller headers, content-type defaulting,
/// then credential injection unless the call opted out
fn build_headers(descriptor: &RequestDescriptor, config: &GatewayConfig) -> GatewayResult<HeaderMap> {
    let mut headers = HeaderMap::new();
    for (name, value) in &descriptor.headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| GatewayError::config(format!("invalid header name: {name}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|_| GatewayError::config(format!("invalid value for header {name}")))?;
        headers.insert(name, value);
    }

    if !headers.contains_key(CONTENT_TYPE) {
        match &descriptor.body {
            // structured bodies default to JSON; pre-serialized text is sent
            // verbatim and binary carries its own content type
            RequestBody::Json(_) => {
                headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            }
            RequestBody::Binary { content_type, .. } => {
                let value = HeaderValue::from_str(content_type).map_err(|_| {
                    GatewayError::config(format!("invalid content type: {content_type}"))
                })?;
                headers.insert(CONTENT_TYPE, value);
            }
            RequestBody::Empty | RequestBody::Text(_) => {}
        }
    }

    if !descriptor.no_auth {
        auth::inject_auth(&mut headers, config)?;
    }

    Ok(headers)
}

/// Collapse a raw HTTP response into the uniform shape
async fn normalize(response: reqwest::Response) -> NormalizedResponse {
    let status = response.status();
    let headers: HashMap<String, String> = response
        .headers()
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_ascii_lowercase(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect();

    let retry_after = headers.get("retry-after").and_then(|raw| parse_retry_after(raw));
    let is_json = headers
        .get("content-type")
        .map_or(false, |ct| ct.contains("application/json"));

    let body = match response.text().await {
        Ok(text) => text,
        Err(err) => {
            return NormalizedResponse {
                headers: Some(headers),
                retry_after,
                ..NormalizedResponse::failure(0, format!("failed to read response body: {err}"))
            };
        }
    };

    let data = if is_json {
        match serde_json::from_str::<Value>(&body) {
            Ok(value) => Some(value),
            Err(_) if body.is_empty() => None,
            Err(_) => Some(Value::String(body)),
        }
    } else if body.is_empty() {
        None
    } else {
        Some(Value::String(body))
    };

    if status.is_success() {
        NormalizedResponse {
            retry_after,
            ..NormalizedResponse::success(status.as_u16(), data, Some(headers))
        }
    } else {
        let detail = extract_detail(status, data.as_ref());
        debug!(status = status.as_u16(), detail = %detail, "server reported failure");
        NormalizedResponse {
            data,
            headers: Some(headers),
            retry_after,
            ..NormalizedResponse::failure(status.as_u16(), detail)
        }
    }
}

/// Prefer structured `detail`/`error`/`message` fields over raw status text
fn extract_detail(status: StatusCode, data: Option<&Value>) -> String {
    if let Some(value) = data {
        for key in ["detail", "error", "message"] {
            match value.get(key) {
                Some(Value::String(text)) if !text.is_empty() => return text.clone(),
                Some(Value::Object(inner)) => {
                    if let Some(Value::String(text)) = inner.get("message") {
                        if !text.is_empty() {
                            return text.clone();
                        }
                    }
                }
                _ => {}
            }
        }
        if let Value::String(text) = value {
            if !text.is_empty() {
                return text.clone();
            }
        }
    }

    format!(
        "HTTP {} {}",
        status.as_u16(),
        status.canonical_reason().unwrap_or("error")
    )
}

/// Parse a `Retry-After` header value: delay-seconds or HTTP-date
fn parse_retry_after(raw: &str) -> Option<Duration> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(seconds) = raw.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }
    let date = DateTime::parse_from_rfc2822(raw).ok()?;
    let delta = date.with_timezone(&Utc) - Utc::now();
    Some(delta.to_std().unwrap_or_default())
}
