//! # Message-Channel Transport
//!
//! Forwards request descriptors to a privileged host process over an
//! asynchronous message channel and awaits a normalized reply. Used when the
//! gateway runs in a restricted execution context that cannot perform
//! network I/O directly; the host performs the exchange and answers with the
//! same normalized shape the direct transport produces.
//!
//! The [`HostBridge`] trait is the seam the embedding application implements
//! to reach its host process. The wire messages here are the protocol:
//! request/upload round trips plus a dedicated duplex channel per streaming
//! call.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::core::error::{GatewayError, GatewayResult};
use crate::core::types::{NormalizedResponse, RequestBody, RequestDescriptor};
use crate::transport::{ErrorSource, Transport};

/// Message posted to the host process
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ChannelMessage {
    /// One request/response round trip
    #[serde(rename = "gateway:request")]
    Request(RequestPayload),
    /// One multipart-style upload
    #[serde(rename = "gateway:upload")]
    Upload(UploadPayload),
}

/// Payload of a `gateway:request` message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestPayload {
    pub path: String,
    pub method: String,
    pub headers: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    pub no_auth: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

/// Payload of a `gateway:upload` message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadPayload {
    pub path: String,
    pub method: String,
    pub fields: HashMap<String, String>,
    pub file: FileField,
}

/// File part of an upload: name, content type and base64-encoded bytes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileField {
    pub name: String,
    #[serde(rename = "type")]
    pub content_type: String,
    pub data: String,
}

/// Reply from the host for request and upload messages
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelReply {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub data: Option<Value>,
}

impl ChannelReply {
    /// Convert into the uniform response shape
    ///
    /// A failed reply without a status maps to 0 (transport-level fault) and
    /// is always given a human-readable error.
    pub fn into_normalized(self) -> NormalizedResponse {
        let status = self.status.unwrap_or(if self.ok { 200 } else { 0 });
        if self.ok {
            NormalizedResponse::success(status, self.data, None)
        } else {
            let error = self
                .error
                .filter(|message| !message.is_empty())
                .unwrap_or_else(|| "message channel request failed".to_string());
            NormalizedResponse {
                data: self.data,
                ..NormalizedResponse::failure(status, error)
            }
        }
    }
}

/// First message posted on a dedicated stream channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamOpen {
    pub path: String,
    pub method: String,
    pub headers: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    pub stream_idle_timeout_ms: u64,
}

/// Inbound event on a stream channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum StreamEvent {
    /// One text chunk
    Data { data: String },
    /// Normal completion; no more chunks follow
    Done,
    /// Terminal failure, raised after queued chunks drain
    Error { message: String },
}

/// Handle for one open stream channel
///
/// Carries the inbound event queue and the teardown token the bridge
/// implementation watches to disconnect the host-side call. The gateway
/// cancels the token on every exit path, including early consumer drop.
#[derive(Debug)]
pub struct StreamHandle {
    events: mpsc::Receiver<StreamEvent>,
    teardown: CancellationToken,
}

impl StreamHandle {
    pub fn new(events: mpsc::Receiver<StreamEvent>, teardown: CancellationToken) -> Self {
        Self { events, teardown }
    }

    pub(crate) fn into_parts(self) -> (mpsc::Receiver<StreamEvent>, CancellationToken) {
        (self.events, self.teardown)
    }
}

/// Connection to the privileged host process
///
/// Implemented by the embedding application over whatever message-passing
/// primitive reaches its host (extension port, IPC socket, worker channel).
#[async_trait]
pub trait HostBridge: Send + Sync {
    /// Post one message and await the host's reply
    async fn round_trip(&self, message: ChannelMessage) -> GatewayResult<ChannelReply>;

    /// Open a dedicated duplex channel for one streaming call
    async fn open_stream(&self, open: StreamOpen) -> GatewayResult<StreamHandle>;
}

/// Transport strategy backed by a [`HostBridge`]
pub struct ChannelTransport {
    bridge: Arc<dyn HostBridge>,
}

impl ChannelTransport {
    pub fn new(bridge: Arc<dyn HostBridge>) -> Self {
        Self { bridge }
    }

    /// Build the wire payload for a descriptor
    ///
    /// Binary bodies are not carried over the plain request channel; they go
    /// through the upload protocol, so a binary descriptor falls through to
    /// the direct transport.
    pub(crate) fn payload_for(descriptor: &RequestDescriptor) -> GatewayResult<RequestPayload> {
        let body = match &descriptor.body {
            RequestBody::Empty => None,
            RequestBody::Json(value) => Some(value.clone()),
            RequestBody::Text(text) => Some(Value::String(text.clone())),
            RequestBody::Binary { .. } => {
                return Err(GatewayError::channel_unavailable(
                    "binary bodies are sent through the upload channel",
                ));
            }
        };

        Ok(RequestPayload {
            path: descriptor.path.clone(),
            method: descriptor.method.clone(),
            headers: descriptor.headers.clone(),
            body,
            no_auth: descriptor.no_auth,
            timeout_ms: descriptor.timeout.map(|t| t.as_millis() as u64),
        })
    }
}

#[async_trait]
impl Transport for ChannelTransport {
    fn name(&self) -> &'static str {
        "message-channel"
    }

    fn source(&self) -> ErrorSource {
        ErrorSource::MessageChannel
    }

    async fn execute(&self, descriptor: &RequestDescriptor) -> GatewayResult<NormalizedResponse> {
        let payload = Self::payload_for(descriptor)?;
        let send = self.bridge.round_trip(ChannelMessage::Request(payload));

        let reply = match &descriptor.cancellation {
            Some(token) => {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => {
                        // abort without waiting for the host reply
                        return Ok(NormalizedResponse::from_error(&GatewayError::Cancelled));
                    }
                    reply = send => reply,
                }
            }
            None => send.await,
        };

        match reply {
            Ok(reply) => Ok(reply.into_normalized()),
            Err(err) => Err(GatewayError::channel_unavailable(err.to_string())),
        }
    }
}
