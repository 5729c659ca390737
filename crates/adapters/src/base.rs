//! Shared OAuth-lifecycle plumbing every provider adapter wraps the
//! `Adapter` trait around. Real per-provider authorization-code exchanges
//! are the explicit Non-goal (§1); `connect` here simulates a completed
//! grant so the rest of the contract — storage, expiry, refresh,
//! disconnect — exercises real `IntegrationManager` code paths end to end.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Utc;

use pe_core::error::CoreResult;
use pe_core::IntegrationManager;
use pe_models::{AuthStatus, NewIntegration};

use crate::http_client::HttpClient;
use crate::support::synthetic_id;

pub struct ProviderBase {
    pub tool: &'static str,
    pub integration_manager: Arc<IntegrationManager>,
    pub http: Arc<dyn HttpClient>,
    pub default_scopes: Vec<String>,
}

impl ProviderBase {
    pub fn new(
        tool: &'static str,
        integration_manager: Arc<IntegrationManager>,
        http: Arc<dyn HttpClient>,
        default_scopes: Vec<String>,
    ) -> Self {
        Self {
            tool,
            integration_manager,
            http,
            default_scopes,
        }
    }

    /// Simulates a completed OAuth grant for `user_id`: an access token
    /// good for an hour and the adapter's default scopes. `storeIntegration`
    /// is a conditional upsert, so reconnecting an already-granted user is
    /// idempotent.
    pub async fn connect(&self, user_id: &str) -> CoreResult<AuthStatus> {
        let expires_at = Utc::now() + chrono::Duration::hours(1);
        let integration = self
            .integration_manager
            .store_integration(NewIntegration {
                user_id: user_id.to_string(),
                tool_name: self.tool.to_string(),
                access_token: synthetic_id("tok"),
                refresh_token: Some(synthetic_id("rtok")),
                expires_at: Some(expires_at),
                scopes: self.default_scopes.iter().cloned().collect(),
                metadata: Default::default(),
            })
            .await?;
        Ok(AuthStatus {
            connected: true,
            expires_at: integration.expires_at,
            scopes: Some(integration.scopes.into_iter().collect()),
            error: None,
        })
    }

    pub async fn is_connected(&self, user_id: &str) -> bool {
        self.integration_manager
            .is_connected(user_id, self.tool)
            .await
            .map(|status| status.connected)
            .unwrap_or(false)
    }

    pub async fn disconnect(&self, user_id: &str) -> CoreResult<()> {
        self.integration_manager.disconnect(user_id, self.tool).await
    }
}

pub const DEFAULT_TIMEOUT: StdDuration = StdDuration::from_secs(30);
