use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex as AsyncMutex;

use pe_cache::{Cache, CacheExt};
use pe_models::{ConnectionStatus, Integration, IntegrationStatus, NewIntegration};
use pe_store::Store;

use crate::error::{CoreResult, EngineError};
use crate::keys;

const INTEGRATION_TTL: std::time::Duration = std::time::Duration::from_secs(3600);

/// The result of exchanging a refresh token with a provider's token
/// endpoint. `refresh_token` is `None` when the provider's response omits
/// one, in which case the caller reuses the existing refresh token (§4.2
/// "must be robust to the returned response omitting a new
/// `refresh_token`").
#[derive(Debug, Clone)]
pub struct RefreshedToken {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Per-tool OAuth refresh strategy. Real implementations exchange the
/// stored refresh token with the provider's token endpoint; per the
/// explicit Non-goal on real per-provider OAuth flows, the binary
/// registers one simulated strategy per tool that preserves the contract
/// (§9 "several adapters simulate success").
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(&self, integration: &Integration) -> CoreResult<RefreshedToken>;
}

/// OAuth credential lifecycle per `(userId, toolName)` (§4.2).
pub struct IntegrationManager {
    store: Arc<dyn Store>,
    cache: Arc<dyn Cache>,
    refreshers: HashMap<String, Arc<dyn TokenRefresher>>,
    /// Per-`(userId, toolName)` single-flight guard over refresh, resolving
    /// the §9 "Refresh-token stampede" open design note: the source
    /// performs refresh without coalescing, so concurrent expiry checks
    /// would otherwise race the provider's token endpoint.
    inflight: AsyncMutex<HashMap<(String, String), Arc<AsyncMutex<()>>>>,
}

impl IntegrationManager {
    pub fn new(store: Arc<dyn Store>, cache: Arc<dyn Cache>) -> Self {
        Self {
            store,
            cache,
            refreshers: HashMap::new(),
            inflight: AsyncMutex::new(HashMap::new()),
        }
    }

    pub fn register_refresher(&mut self, tool: impl Into<String>, refresher: Arc<dyn TokenRefresher>) {
        self.refreshers.insert(tool.into(), refresher);
    }

    /// Conditional upsert on `(userId, toolName)`; populates KV at
    /// `integration:<user>:<tool>` with a 3600s TTL after the write lands.
    pub async fn store_integration(&self, new: NewIntegration) -> CoreResult<Integration> {
        let integration = self.store.upsert_integration(new).await?;
        self.cache_integration(&integration).await;
        Ok(integration)
    }

    /// KV-first, DS-fallback read-through, backfilling KV on a DS hit.
    pub async fn get_integration(&self, user_id: &str, tool: &str) -> CoreResult<Option<Integration>> {
        let cache_key = keys::integration(user_id, tool);
        if let Some(cached) = self.cache.get_json::<Integration>(&cache_key).await.ok().flatten() {
            return Ok(Some(cached));
        }
        let integration = self.store.get_integration(user_id, tool).await?;
        if let Some(integration) = &integration {
            self.cache_integration(integration).await;
        }
        Ok(integration)
    }

    async fn cache_integration(&self, integration: &Integration) {
        let key = keys::integration(&integration.user_id, &integration.tool_name);
        let _ = self.cache.set_json(&key, integration, Some(INTEGRATION_TTL)).await;
    }

    /// `{connected:true, ...}` only when `status=active` and unexpired.
    /// Attempts a synchronous refresh on expiry if a refresh token is
    /// present; falls back to not-connected otherwise.
    pub async fn is_connected(&self, user_id: &str, tool: &str) -> CoreResult<ConnectionStatus> {
        let Some(integration) = self.get_integration(user_id, tool).await? else {
            return Ok(ConnectionStatus {
                connected: false,
                expires_at: None,
                scopes: None,
                error: None,
            });
        };

        let now = Utc::now();
        if integration.is_live(now) {
            return Ok(ConnectionStatus {
                connected: true,
                expires_at: integration.expires_at,
                scopes: Some(integration.scopes),
                error: None,
            });
        }

        if integration.status != IntegrationStatus::Active {
            return Ok(ConnectionStatus {
                connected: false,
                expires_at: integration.expires_at,
                scopes: None,
                error: Some(format!("integration status is {:?}", integration.status)),
            });
        }

        if integration.refresh_token.is_none() {
            return Ok(ConnectionStatus {
                connected: false,
                expires_at: integration.expires_at,
                scopes: None,
                error: None,
            });
        }

        match self.refresh_token(&integration).await {
            Ok(refreshed) => Ok(ConnectionStatus {
                connected: true,
                expires_at: refreshed.expires_at,
                scopes: Some(integration.scopes),
                error: None,
            }),
            Err(err) => {
                self.store
                    .set_integration_status(integration.id, IntegrationStatus::Error)
                    .await?;
                self.cache.delete(&keys::integration(user_id, tool)).await.ok();
                Ok(ConnectionStatus {
                    connected: false,
                    expires_at: None,
                    scopes: None,
                    error: Some(err.to_string()),
                })
            }
        }
    }

    /// Refreshes `integration`'s access token, single-flighted per
    /// `(userId, toolName)` so concurrent callers share one in-flight
    /// provider exchange instead of each racing a refresh.
    pub async fn refresh_token(&self, integration: &Integration) -> CoreResult<RefreshedToken> {
        let lock_key = (integration.user_id.clone(), integration.tool_name.clone());
        let guard = {
            let mut inflight = self.inflight.lock().await;
            inflight
                .entry(lock_key)
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        let _permit = guard.lock().await;

        // Re-read: another caller may have refreshed while we waited.
        if let Some(current) = self.store.get_integration(&integration.user_id, &integration.tool_name).await? {
            if current.is_live(Utc::now()) {
                return Ok(RefreshedToken {
                    access_token: current.access_token,
                    refresh_token: current.refresh_token,
                    expires_at: current.expires_at,
                });
            }
        }

        let refresher = self
            .refreshers
            .get(&integration.tool_name)
            .ok_or_else(|| EngineError::TokenRefreshFailed(format!("no refresh strategy registered for {}", integration.tool_name)))?;

        let refreshed = refresher.refresh(integration).await?;
        let updated = self
            .store
            .update_integration_tokens(
                integration.id,
                &refreshed.access_token,
                refreshed.refresh_token.as_deref(),
                refreshed.expires_at,
            )
            .await?;
        self.cache_integration(&updated).await;
        Ok(refreshed)
    }

    /// Soft disconnect: `status := revoked`, KV cleared, row kept for
    /// audit retention. Re-connecting the same pair upserts back to
    /// `active` (§9 open question, resolved).
    pub async fn disconnect(&self, user_id: &str, tool: &str) -> CoreResult<()> {
        if let Some(integration) = self.store.get_integration(user_id, tool).await? {
            self.store
                .set_integration_status(integration.id, IntegrationStatus::Revoked)
                .await?;
        }
        self.cache.delete(&keys::integration(user_id, tool)).await.ok();
        Ok(())
    }

    pub async fn list_integrations(&self, user_id: &str) -> CoreResult<Vec<Integration>> {
        Ok(self.store.list_integrations(user_id).await?)
    }
}
