//! # Request Dispatcher
//!
//! [`RequestGateway`] is the single public entry point for request/response
//! calls. It tries its transports in a fixed preference order (the host
//! message channel when a bridge was supplied, then the direct network
//! executor) and falls through only when a transport cannot carry the call
//! at all. Failures are classified (cancellations stay silent), recorded in
//! the bounded error log, and re-raised as a single error type carrying the
//! status code.

pub mod stream;
pub mod upload;

pub use stream::ChunkStream;
pub use upload::{FilePayload, UploadDescriptor};

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::core::config::ConfigProvider;
use crate::core::error::{GatewayError, GatewayResult};
use crate::core::timeout::TimeoutConfig;
use crate::core::types::{NormalizedResponse, RequestDescriptor};
use crate::diagnostics::error_log::{ErrorLogEntry, ErrorLogStore};
use crate::transport::channel::{ChannelTransport, HostBridge};
use crate::transport::direct::DirectTransport;
use crate::transport::{ErrorSource, Transport};

/// Whether a failure message describes a cancellation
///
/// Cancellations fail the call but are never logged and never surfaced as
/// user-facing failures.
pub(crate) fn looks_like_cancellation(message: &str) -> bool {
    let message = message.to_ascii_lowercase();
    message.contains("cancel") || message.contains("abort")
}

/// Builder for [`RequestGateway`]
#[derive(Default)]
pub struct GatewayBuilder {
    provider: Option<Arc<dyn ConfigProvider>>,
    bridge: Option<Arc<dyn HostBridge>>,
    error_log: Option<Arc<ErrorLogStore>>,
    timeouts: TimeoutConfig,
}

impl GatewayBuilder {
    /// Source of connection settings (required)
    pub fn config_provider(mut self, provider: Arc<dyn ConfigProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Bridge to the privileged host process; enables the message-channel
    /// transport, streaming and uploads
    pub fn host_bridge(mut self, bridge: Arc<dyn HostBridge>) -> Self {
        self.bridge = Some(bridge);
        self
    }

    /// Error log store; a fresh bounded store is created when omitted
    pub fn error_log(mut self, error_log: Arc<ErrorLogStore>) -> Self {
        self.error_log = Some(error_log);
        self
    }

    /// Timeout budget table
    pub fn timeouts(mut self, timeouts: TimeoutConfig) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn build(self) -> GatewayResult<RequestGateway> {
        let provider = self
            .provider
            .ok_or_else(|| GatewayError::config("a config provider is required"))?;

        let mut transports: Vec<Arc<dyn Transport>> = Vec::new();
        if let Some(bridge) = &self.bridge {
            transports.push(Arc::new(ChannelTransport::new(bridge.clone())));
        }
        transports.push(Arc::new(DirectTransport::new(
            provider,
            self.timeouts.clone(),
        )));

        Ok(RequestGateway {
            transports,
            bridge: self.bridge,
            error_log: self.error_log.unwrap_or_default(),
            timeouts: self.timeouts,
        })
    }
}

/// The request gateway: dispatches logical API calls over the preferred
/// transport and normalizes every outcome
pub struct RequestGateway {
    transports: Vec<Arc<dyn Transport>>,
    bridge: Option<Arc<dyn HostBridge>>,
    error_log: Arc<ErrorLogStore>,
    timeouts: TimeoutConfig,
}

impl std::fmt::Debug for RequestGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestGateway")
            .field("transports", &self.transports.len())
            .field("bridge", &self.bridge.is_some())
            .field("timeouts", &self.timeouts)
            .finish()
    }
}

impl RequestGateway {
    pub fn builder() -> GatewayBuilder {
        GatewayBuilder::default()
    }

    /// The error log store, for diagnostics UIs
    pub fn error_log(&self) -> &Arc<ErrorLogStore> {
        &self.error_log
    }

    pub(crate) fn host_bridge(&self) -> Option<&Arc<dyn HostBridge>> {
        self.bridge.as_ref()
    }

    pub(crate) fn timeouts(&self) -> &TimeoutConfig {
        &self.timeouts
    }

    /// Execute one request/response call and return its payload unchanged
    ///
    /// The dispatcher never reinterprets the payload shape; decoding into a
    /// caller type is [`RequestGateway::request_as`]'s job.
    #[instrument(skip(self, descriptor), fields(method = %descriptor.method, path = %descriptor.path))]
    pub async fn request(&self, descriptor: RequestDescriptor) -> GatewayResult<Value> {
        descriptor.validate()?;
        let (source, response) = self.execute(&descriptor).await?;
        self.conclude(&descriptor.method, &descriptor.path, source, response)
    }

    /// Execute one call and decode the payload into `T`
    pub async fn request_as<T: DeserializeOwned>(
        &self,
        descriptor: RequestDescriptor,
    ) -> GatewayResult<T> {
        let value = self.request(descriptor).await?;
        serde_json::from_value(value).map_err(GatewayError::from)
    }

    /// Try transports in preference order; fall through only on
    /// channel-establishment failure
    async fn execute(
        &self,
        descriptor: &RequestDescriptor,
    ) -> GatewayResult<(ErrorSource, NormalizedResponse)> {
        let mut last_unavailable: Option<GatewayError> = None;

        for transport in &self.transports {
            match transport.execute(descriptor).await {
                Ok(response) => return Ok((transport.source(), response)),
                Err(err) => {
                    debug!(
                        transport = transport.name(),
                        error = %err,
                        "transport unavailable, falling back"
                    );
                    last_unavailable = Some(err);
                }
            }
        }

        Err(last_unavailable
            .unwrap_or_else(|| GatewayError::transport("no transport is available")))
    }

    /// Classify a final response: success, silent cancellation, or a logged
    /// failure re-raised with its status
    pub(crate) fn conclude(
        &self,
        method: &str,
        path: &str,
        source: ErrorSource,
        response: NormalizedResponse,
    ) -> GatewayResult<Value> {
        if response.ok {
            return Ok(response.data.unwrap_or(Value::Null));
        }

        let message = response
            .error
            .unwrap_or_else(|| format!("request failed with status {}", response.status));

        if looks_like_cancellation(&message) {
            return Err(GatewayError::Cancelled);
        }

        // best-effort diagnostics; recording never delays or breaks the call
        let status = (response.status != 0).then_some(response.status);
        self.error_log.record(ErrorLogEntry::new(
            source,
            method,
            path,
            status,
            Some(message.clone()),
        ));

        Err(GatewayError::request(response.status, message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancellation_message_classification() {
        assert!(looks_like_cancellation("Request cancelled"));
        assert!(looks_like_cancellation("The operation was aborted"));
        assert!(!looks_like_cancellation("connection reset by peer"));
    }

    #[test]
    fn test_builder_requires_provider() {
        let err = RequestGateway::builder().build().unwrap_err();
        assert_eq!(err.status(), 400);
    }
}
