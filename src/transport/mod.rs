//! # Transport Strategies
//!
//! A [`Transport`] turns a request descriptor into a [`NormalizedResponse`].
//! The dispatcher holds transports in a fixed preference order (message
//! channel first, direct network call second) and falls through on
//! channel-establishment failure only; an ordinary HTTP failure from a
//! transport is a final verdict, not a reason to try the next one.

pub mod channel;
pub mod direct;

pub use channel::{ChannelTransport, HostBridge};
pub use direct::DirectTransport;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::error::GatewayResult;
use crate::core::types::{NormalizedResponse, RequestDescriptor};

/// Which execution path produced a response or failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorSource {
    /// Host-mediated message channel
    #[serde(rename = "message-channel")]
    MessageChannel,
    /// Direct network call
    #[serde(rename = "direct")]
    Direct,
}

impl std::fmt::Display for ErrorSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MessageChannel => write!(f, "message-channel"),
            Self::Direct => write!(f, "direct"),
        }
    }
}

/// Execution strategy for one request/response call
///
/// `Ok(response)` is final even when `response.ok` is false. `Err(..)` means
/// the transport could not carry the call at all (no channel, send failed)
/// and the dispatcher should fall through to the next strategy.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Strategy name for logging
    fn name(&self) -> &'static str;

    /// Source tag recorded in the error log
    fn source(&self) -> ErrorSource;

    /// Execute one call
    async fn execute(&self, descriptor: &RequestDescriptor) -> GatewayResult<NormalizedResponse>;
}
