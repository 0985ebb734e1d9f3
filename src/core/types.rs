//! # Core Request/Response Types
//!
//! Value objects exchanged between the dispatchers and the transports:
//! the immutable [`RequestDescriptor`] describing one logical API call and
//! the [`NormalizedResponse`] every transport must produce regardless of
//! origin. The uniform response shape is the key invariant that lets
//! callers stay transport-agnostic.

use std::collections::HashMap;
use std::time::Duration;

use bytes::Bytes;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::core::error::{GatewayError, GatewayResult};

/// Body of a logical API call
///
/// The variant determines content-type defaulting: only a structured
/// [`RequestBody::Json`] body gets a defaulted `application/json` header.
/// A pre-serialized [`RequestBody::Text`] body is sent verbatim, and a
/// [`RequestBody::Binary`] body carries its own content type so the
/// transport never double-encodes it.
#[derive(Debug, Clone, Default)]
pub enum RequestBody {
    /// No body
    #[default]
    Empty,
    /// Structured JSON payload, serialized by the transport
    Json(Value),
    /// Pre-serialized string payload, sent as-is
    Text(String),
    /// Binary payload with its own content type
    Binary {
        content_type: String,
        data: Bytes,
    },
}

impl RequestBody {
    /// Whether a body is present at all
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}

/// Immutable description of one logical API call
///
/// One descriptor corresponds to exactly one call; it is built once with the
/// chained constructors and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    /// Request path, joined onto the configured server URL
    /// (absolute `http(s)://` paths bypass joining)
    pub path: String,

    /// HTTP method, uppercase
    pub method: String,

    /// Caller-supplied headers; auth headers are stripped and re-injected
    /// by the transport unless `no_auth` is set
    pub headers: HashMap<String, String>,

    /// Request body
    pub body: RequestBody,

    /// Skip credential injection entirely
    pub no_auth: bool,

    /// Explicit timeout override; wins over the per-endpoint budget
    pub timeout: Option<Duration>,

    /// Optional cancellation token raced against the call
    pub cancellation: Option<CancellationToken>,
}

impl RequestDescriptor {
    /// Create a descriptor with an arbitrary method
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            method: method.into().to_ascii_uppercase(),
            headers: HashMap::new(),
            body: RequestBody::Empty,
            no_auth: false,
            timeout: None,
            cancellation: None,
        }
    }

    /// GET descriptor
    pub fn get(path: impl Into<String>) -> Self {
        Self::new("GET", path)
    }

    /// POST descriptor
    pub fn post(path: impl Into<String>) -> Self {
        Self::new("POST", path)
    }

    /// PUT descriptor
    pub fn put(path: impl Into<String>) -> Self {
        Self::new("PUT", path)
    }

    /// DELETE descriptor
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new("DELETE", path)
    }

    /// Add a header
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Attach a structured JSON body
    pub fn json(mut self, body: Value) -> Self {
        self.body = RequestBody::Json(body);
        self
    }

    /// Attach a pre-serialized string body
    pub fn text_body(mut self, body: impl Into<String>) -> Self {
        self.body = RequestBody::Text(body.into());
        self
    }

    /// Attach a binary body with its own content type
    pub fn binary(mut self, content_type: impl Into<String>, data: Bytes) -> Self {
        self.body = RequestBody::Binary {
            content_type: content_type.into(),
            data,
        };
        self
    }

    /// Skip credential injection for this call
    pub fn no_auth(mut self) -> Self {
        self.no_auth = true;
        self
    }

    /// Override the derived timeout budget
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Attach a cancellation token
    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Precondition check performed before any dispatch
    pub fn validate(&self) -> GatewayResult<()> {
        if self.path.trim().is_empty() {
            return Err(GatewayError::config("request path must not be empty"));
        }
        if self.method.trim().is_empty() {
            return Err(GatewayError::config("request method must not be empty"));
        }
        Ok(())
    }

    /// Whether the path is already an absolute URL
    pub fn has_absolute_path(&self) -> bool {
        self.path.starts_with("http://") || self.path.starts_with("https://")
    }
}

/// The single response shape every transport must produce
///
/// Whether a call went through the host message channel or a direct network
/// exchange, the caller always sees this. `ok == false` always carries a
/// human-readable `error`.
#[derive(Debug, Clone)]
pub struct NormalizedResponse {
    /// Whether the call succeeded (2xx)
    pub ok: bool,

    /// HTTP status, or 0 for transport-level faults
    pub status: u16,

    /// Parsed payload: JSON when the content type says so, else the raw text
    pub data: Option<Value>,

    /// Response headers with lower-cased names; `None` when the origin
    /// (message channel) does not expose them
    pub headers: Option<HashMap<String, String>>,

    /// Human-readable failure detail; always present when `ok` is false
    pub error: Option<String>,

    /// Parsed `Retry-After` value, when the server sent one
    pub retry_after: Option<Duration>,
}

impl NormalizedResponse {
    /// Successful response
    pub fn success(status: u16, data: Option<Value>, headers: Option<HashMap<String, String>>) -> Self {
        Self {
            ok: true,
            status,
            data,
            headers,
            error: None,
            retry_after: None,
        }
    }

    /// Failed response with a human-readable detail
    pub fn failure(status: u16, error: impl Into<String>) -> Self {
        Self {
            ok: false,
            status,
            data: None,
            headers: None,
            error: Some(error.into()),
            retry_after: None,
        }
    }

    /// Convert a typed error into the uniform failure shape
    pub fn from_error(err: &GatewayError) -> Self {
        Self::failure(err.status(), err.to_string())
    }
}
