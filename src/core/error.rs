//! # Error Handling Module
//!
//! This module provides error handling for the request gateway using the
//! `thiserror` crate. It defines the failure taxonomy every call can produce
//! and maps each category to the status code callers branch on.
//!
//! The important property is that callers never have to parse error strings:
//! every error carries a `status()` (0 for transport-level faults, an HTTP
//! status otherwise) and a stable `error_type()` tag.

use thiserror::Error;

/// Main result type used throughout the gateway
///
/// Type alias that makes error handling more ergonomic: `GatewayResult<T>`
/// instead of `Result<T, GatewayError>` everywhere.
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Failure taxonomy for gateway calls
///
/// Each variant represents a different category of failure. The `#[error]`
/// attribute from `thiserror` implements `Display` with the given message.
#[derive(Debug, Error, Clone)]
pub enum GatewayError {
    /// Configuration or validation errors (missing server URL, empty path, etc.)
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Authentication failures (missing/placeholder credential, refresh exhausted)
    #[error("Authentication failed: {reason}")]
    Auth { reason: String },

    /// Transport-level faults (DNS, connection reset, timeout, abort)
    #[error("Network error: {message}")]
    Transport { message: String },

    /// Server-reported failure with the extracted human-readable detail
    #[error("Request failed ({status}): {message}")]
    Request { status: u16, message: String },

    /// The call was cancelled by its cancellation token; never logged as a failure
    #[error("Request cancelled")]
    Cancelled,

    /// A successful payload could not be decoded into the caller's type
    #[error("Failed to decode response payload: {message}")]
    Decode { message: String },

    /// The host message channel could not carry the call at all;
    /// signals the dispatcher to fall through to the next transport
    #[error("Message channel unavailable: {message}")]
    ChannelUnavailable { message: String },
}

impl GatewayError {
    /// Create a configuration error with a custom message
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an authentication error with a custom reason
    pub fn auth<S: Into<String>>(reason: S) -> Self {
        Self::Auth {
            reason: reason.into(),
        }
    }

    /// Create a transport-level error with a custom message
    pub fn transport<S: Into<String>>(message: S) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Create a server-reported request failure
    pub fn request<S: Into<String>>(status: u16, message: S) -> Self {
        Self::Request {
            status,
            message: message.into(),
        }
    }

    /// Create a channel-unavailable error (dispatcher fallback signal)
    pub fn channel_unavailable<S: Into<String>>(message: S) -> Self {
        Self::ChannelUnavailable {
            message: message.into(),
        }
    }

    /// Status code callers can branch on without parsing strings
    ///
    /// 400 for configuration errors, 401 for auth errors, the server's own
    /// status for request failures, and 0 for everything that never produced
    /// an HTTP response.
    pub fn status(&self) -> u16 {
        match self {
            Self::Configuration { .. } => 400,
            Self::Auth { .. } => 401,
            Self::Request { status, .. } => *status,
            Self::Transport { .. } | Self::Cancelled | Self::Decode { .. } => 0,
            Self::ChannelUnavailable { .. } => 0,
        }
    }

    /// Stable string tag for diagnostics and structured logs
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::Configuration { .. } => "configuration_error",
            Self::Auth { .. } => "authentication_error",
            Self::Transport { .. } => "network_error",
            Self::Request { .. } => "request_failed",
            Self::Cancelled => "cancelled",
            Self::Decode { .. } => "decode_error",
            Self::ChannelUnavailable { .. } => "channel_unavailable",
        }
    }

    /// Whether this error is a cancellation (never logged, never user-facing)
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode {
            message: err.to_string(),
        }
    }
}

impl From<url::ParseError> for GatewayError {
    fn from(err: url::ParseError) -> Self {
        Self::Configuration {
            message: format!("invalid URL: {err}"),
        }
    }
}
