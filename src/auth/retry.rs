//! One-shot auth-refresh retry policy
//!
//! Applied by the direct transport around each call: when the first attempt
//! comes back 401 in multi-user mode with a refresh token on hand, the
//! provider's refresh hook runs exactly once and the call is rebuilt from a
//! fresh config snapshot with a fresh timeout budget. The policy is decoupled
//! from HTTP through the `attempt` closure, so it can be tested without a
//! server.

use std::future::Future;

use tracing::{debug, warn};

use crate::core::config::{AuthMode, ConfigProvider, GatewayConfig};
use crate::core::error::GatewayResult;
use crate::core::types::NormalizedResponse;

/// Whether a response status should trigger the single refresh-and-retry
pub fn should_refresh(status: u16, config: &GatewayConfig) -> bool {
    status == 401 && config.auth_mode == AuthMode::MultiUser && config.has_refresh_token()
}

/// At-most-one refresh-and-retry around a call attempt
pub struct AuthRetryPolicy<'a> {
    provider: &'a dyn ConfigProvider,
}

impl<'a> AuthRetryPolicy<'a> {
    pub fn new(provider: &'a dyn ConfigProvider) -> Self {
        Self { provider }
    }

    /// Run `attempt` with a fresh config snapshot; on a refreshable 401,
    /// refresh once and run it again with the re-resolved config.
    ///
    /// The second attempt's response is final, 401 or not.
    pub async fn run<F, Fut>(&self, mut attempt: F) -> GatewayResult<NormalizedResponse>
    where
        F: FnMut(GatewayConfig) -> Fut,
        Fut: Future<Output = NormalizedResponse>,
    {
        let config = self.provider.get_config().await?;
        let first = attempt(config.clone()).await;

        if !should_refresh(first.status, &config) {
            return Ok(first);
        }

        debug!("access token rejected with 401, attempting refresh");
        match self.provider.refresh_auth().await {
            Ok(true) => {}
            Ok(false) => {
                debug!("no refresh hook available, keeping original response");
                return Ok(first);
            }
            Err(err) => {
                warn!(error = %err, "token refresh failed");
                return Ok(first);
            }
        }

        let refreshed = self.provider.get_config().await?;
        Ok(attempt(refreshed).await)
    }
}
