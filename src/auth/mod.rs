//! # Authentication Policy
//!
//! Credential injection for direct network calls and the one-shot
//! refresh-and-retry policy applied after a 401.
//!
//! Caller-supplied auth headers are always stripped before injection, so a
//! descriptor can never smuggle its own credentials past the configured
//! policy. Placeholder API keys (sample values shipped in default configs)
//! are rejected before any network call is attempted.

pub mod retry;

pub use retry::AuthRetryPolicy;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};

use crate::core::config::{AuthMode, GatewayConfig};
use crate::core::error::{GatewayError, GatewayResult};

/// Header carrying the shared API key in single-key mode
pub const API_KEY_HEADER: &str = "x-api-key";

/// Known sample/default API key values that must never be treated as valid
pub const PLACEHOLDER_API_KEYS: &[&str] = &[
    "your-api-key",
    "your-api-key-here",
    "changeme",
    "sk-placeholder",
];

/// Whether an API key is one of the known placeholder values
pub fn is_placeholder_key(key: &str) -> bool {
    let key = key.trim();
    PLACEHOLDER_API_KEYS
        .iter()
        .any(|placeholder| key.eq_ignore_ascii_case(placeholder))
}

/// Remove any caller-supplied credential headers
pub fn strip_auth_headers(headers: &mut HeaderMap) {
    headers.remove(AUTHORIZATION);
    headers.remove(HeaderName::from_static(API_KEY_HEADER));
}

/// Strip and re-inject credentials according to the configured auth mode
///
/// Fails with an actionable [`GatewayError::Auth`] when the required
/// credential is missing or still a placeholder, before any network call.
pub fn inject_auth(headers: &mut HeaderMap, config: &GatewayConfig) -> GatewayResult<()> {
    strip_auth_headers(headers);

    match config.auth_mode {
        AuthMode::SingleKey => {
            let key = config.api_key.as_deref().map(str::trim).unwrap_or("");
            if key.is_empty() {
                return Err(GatewayError::auth(
                    "no API key is configured; set one in the server connection settings",
                ));
            }
            if is_placeholder_key(key) {
                return Err(GatewayError::auth(
                    "the configured API key is still the placeholder value; \
                     replace it in the server connection settings",
                ));
            }
            let value = HeaderValue::from_str(key)
                .map_err(|_| GatewayError::auth("the configured API key contains invalid characters"))?;
            headers.insert(HeaderName::from_static(API_KEY_HEADER), value);
        }
        AuthMode::MultiUser => {
            let token = config.access_token.as_deref().map(str::trim).unwrap_or("");
            if token.is_empty() {
                return Err(GatewayError::auth(
                    "no access token is available; sign in again",
                ));
            }
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|_| GatewayError::auth("the access token contains invalid characters"))?;
            headers.insert(AUTHORIZATION, value);
        }
    }

    Ok(())
}
