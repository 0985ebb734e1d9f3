//! # Upload Dispatcher
//!
//! Sends multipart-style payloads (named fields plus one binary file)
//! through the message channel only. Large binary transfer is not worth two
//! code paths, so there is no direct-transport fallback; the call fails when
//! no host bridge is available. Outcomes are classified, logged and raised
//! exactly like request/response calls.

use std::collections::HashMap;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use bytes::Bytes;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use crate::core::error::{GatewayError, GatewayResult};
use crate::core::types::NormalizedResponse;
use crate::dispatch::RequestGateway;
use crate::transport::channel::{ChannelMessage, FileField, UploadPayload};
use crate::transport::ErrorSource;

/// The binary file part of an upload
#[derive(Debug, Clone)]
pub struct FilePayload {
    /// File name reported to the server
    pub name: String,
    /// MIME type of the file bytes
    pub content_type: String,
    /// Raw file bytes
    pub data: Bytes,
}

impl FilePayload {
    pub fn new(name: impl Into<String>, content_type: impl Into<String>, data: Bytes) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            data,
        }
    }
}

/// Description of one upload call
#[derive(Debug, Clone)]
pub struct UploadDescriptor {
    pub path: String,
    pub method: String,
    pub fields: HashMap<String, String>,
    pub file: FilePayload,
    pub cancellation: Option<CancellationToken>,
}

impl UploadDescriptor {
    /// POST upload to a path
    pub fn new(path: impl Into<String>, file: FilePayload) -> Self {
        Self {
            path: path.into(),
            method: "POST".to_string(),
            fields: HashMap::new(),
            file,
            cancellation: None,
        }
    }

    /// Add a named form field
    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Override the method
    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into().to_ascii_uppercase();
        self
    }

    /// Attach a cancellation token
    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    fn validate(&self) -> GatewayResult<()> {
        if self.path.trim().is_empty() {
            return Err(GatewayError::config("upload path must not be empty"));
        }
        if self.file.name.trim().is_empty() {
            return Err(GatewayError::config("upload file name must not be empty"));
        }
        Ok(())
    }
}

impl RequestGateway {
    /// Send one upload through the message channel
    #[instrument(skip(self, descriptor), fields(method = %descriptor.method, path = %descriptor.path))]
    pub async fn upload(&self, descriptor: UploadDescriptor) -> GatewayResult<Value> {
        descriptor.validate()?;
        let bridge = self
            .host_bridge()
            .ok_or_else(|| GatewayError::transport("uploads require the host message channel"))?;

        let payload = UploadPayload {
            path: descriptor.path.clone(),
            method: descriptor.method.clone(),
            fields: descriptor.fields.clone(),
            file: FileField {
                name: descriptor.file.name.clone(),
                content_type: descriptor.file.content_type.clone(),
                data: BASE64.encode(&descriptor.file.data),
            },
        };

        let send = bridge.round_trip(ChannelMessage::Upload(payload));
        let reply = match &descriptor.cancellation {
            Some(token) => {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => return Err(GatewayError::Cancelled),
                    reply = send => reply,
                }
            }
            None => send.await,
        };

        let response = match reply {
            Ok(reply) => reply.into_normalized(),
            Err(err) => NormalizedResponse::failure(0, format!("upload channel failed: {err}")),
        };

        self.conclude(
            &descriptor.method,
            &descriptor.path,
            ErrorSource::MessageChannel,
            response,
        )
    }
}
