//! # Request Gateway Library
//!
//! Network-access layer for a client application talking to a single remote
//! API server. The gateway turns a logical API call (path, method, headers,
//! body, auth requirement, timeout, cancellation) into a completed response
//! or a stream of text chunks, while transparently choosing between two
//! execution strategies:
//!
//! - a **message channel** to a privileged host process, used when the
//!   caller runs in a restricted execution context that cannot perform
//!   network I/O directly, and
//! - a **direct network call** over HTTP, used otherwise or as the fallback
//!   when the channel cannot be established.
//!
//! Whatever the path, every call produces the same normalized response
//! shape, so callers stay transport-agnostic. The gateway also enforces the
//! authentication policy (single shared API key or per-user tokens with a
//! one-shot refresh retry), derives per-endpoint timeout budgets, and keeps
//! a bounded, rate-limited log of failed requests for diagnostics.
//!
//! ## Quick start
//!
//! ```no_run
//! use std::sync::Arc;
//! use request_gateway::{GatewayConfig, RequestDescriptor, RequestGateway, StaticConfigProvider};
//!
//! # async fn run() -> request_gateway::GatewayResult<()> {
//! let provider = Arc::new(StaticConfigProvider::new(GatewayConfig::single_key(
//!     "http://localhost:1234",
//!     "sk-live-example",
//! )));
//!
//! let gateway = RequestGateway::builder().config_provider(provider).build()?;
//! let models = gateway.request(RequestDescriptor::get("/api/v1/models")).await?;
//! # let _ = models;
//! # Ok(())
//! # }
//! ```

/// Core building blocks: errors, configuration, request/response types,
/// timeout budgets
pub mod core;

/// Authentication policy: credential injection and the one-shot refresh retry
pub mod auth;

/// Transport strategies: host message channel and direct network calls
pub mod transport;

/// Dispatchers: request/response, streaming, uploads
pub mod dispatch;

/// Diagnostics: the bounded, throttled error log
pub mod diagnostics;

// Re-export the public API surface so embedders can import everything they
// need from the crate root.

pub use crate::core::config::{AuthMode, ConfigProvider, GatewayConfig, StaticConfigProvider};
pub use crate::core::error::{GatewayError, GatewayResult};
pub use crate::core::timeout::TimeoutConfig;
pub use crate::core::types::{NormalizedResponse, RequestBody, RequestDescriptor};
pub use crate::diagnostics::error_log::{ErrorLogEntry, ErrorLogStore};
pub use crate::dispatch::{ChunkStream, FilePayload, GatewayBuilder, RequestGateway, UploadDescriptor};
pub use crate::transport::channel::{
    ChannelMessage, ChannelReply, ChannelTransport, FileField, HostBridge, RequestPayload,
    StreamEvent, StreamHandle, StreamOpen, UploadPayload,
};
pub use crate::transport::direct::DirectTransport;
pub use crate::transport::{ErrorSource, Transport};
