//! # Gateway Configuration
//!
//! Connection settings for the single remote API server and the
//! [`ConfigProvider`] seam through which the embedding application supplies
//! them. The gateway treats the config as read-mostly: it never persists it
//! and only asks the provider to refresh credentials after a 401.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::core::error::GatewayResult;

/// How the gateway authenticates against the server
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthMode {
    /// A single shared API key, sent as `X-API-KEY`
    #[default]
    #[serde(rename = "single-key")]
    SingleKey,
    /// Per-user access/refresh token pair, sent as `Authorization: Bearer`
    #[serde(rename = "multi-user")]
    MultiUser,
}

/// Connection settings for the remote API server
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Base URL of the server; may be empty only when every call uses an
    /// absolute path
    pub server_url: String,

    /// Active authentication mode
    pub auth_mode: AuthMode,

    /// API key for [`AuthMode::SingleKey`]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Access token for [`AuthMode::MultiUser`]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,

    /// Refresh token enabling the one-shot auth-refresh retry
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

impl GatewayConfig {
    /// Single-key configuration
    pub fn single_key(server_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            auth_mode: AuthMode::SingleKey,
            api_key: Some(api_key.into()),
            access_token: None,
            refresh_token: None,
        }
    }

    /// Multi-user configuration
    pub fn multi_user(
        server_url: impl Into<String>,
        access_token: impl Into<String>,
        refresh_token: Option<String>,
    ) -> Self {
        Self {
            server_url: server_url.into(),
            auth_mode: AuthMode::MultiUser,
            api_key: None,
            access_token: Some(access_token.into()),
            refresh_token,
        }
    }

    /// Whether a usable refresh token is present
    pub fn has_refresh_token(&self) -> bool {
        self.refresh_token
            .as_deref()
            .map_or(false, |token| !token.trim().is_empty())
    }
}

/// Source of the gateway configuration
///
/// Implemented by the embedding application. `get_config` is called once per
/// call attempt so each attempt sees a fresh snapshot; `refresh_auth` is the
/// optional hook invoked at most once after a 401 in multi-user mode. The
/// default implementation reports that no refresh hook exists.
#[async_trait]
pub trait ConfigProvider: Send + Sync {
    /// Current connection settings
    async fn get_config(&self) -> GatewayResult<GatewayConfig>;

    /// Attempt to refresh the access token; returns `true` when a new token
    /// was obtained and the call should be retried
    async fn refresh_auth(&self) -> GatewayResult<bool> {
        Ok(false)
    }
}

/// In-memory provider for embedders with static settings and for tests
#[derive(Debug, Default)]
pub struct StaticConfigProvider {
    config: RwLock<GatewayConfig>,
}

impl StaticConfigProvider {
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            config: RwLock::new(config),
        }
    }

    /// Replace the stored settings
    pub fn set_config(&self, config: GatewayConfig) {
        *self.config.write() = config;
    }
}

#[async_trait]
impl ConfigProvider for StaticConfigProvider {
    async fn get_config(&self) -> GatewayResult<GatewayConfig> {
        Ok(self.config.read().clone())
    }
}
