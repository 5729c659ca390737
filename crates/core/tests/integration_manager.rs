//! Integration tests for §8 invariant 4 (disconnect) and the refresh path.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use pe_cache::memory::InMemoryCache;
use pe_cache::Cache;
use pe_core::error::CoreResult;
use pe_core::integration_manager::{RefreshedToken, TokenRefresher};
use pe_core::IntegrationManager;
use pe_models::{Integration, NewIntegration};
use pe_store::memory::InMemoryStore;

struct AlwaysRefreshes;

#[async_trait]
impl TokenRefresher for AlwaysRefreshes {
    async fn refresh(&self, integration: &Integration) -> CoreResult<RefreshedToken> {
        Ok(RefreshedToken {
            access_token: format!("{}-refreshed", integration.access_token),
            refresh_token: None,
            expires_at: Some(Utc::now() + chrono::Duration::hours(1)),
        })
    }
}

fn manager() -> (Arc<InMemoryCache>, IntegrationManager) {
    let store = Arc::new(InMemoryStore::new());
    let cache = Arc::new(InMemoryCache::new());
    (cache.clone(), IntegrationManager::new(store, cache))
}

/// Invariant 4 — after disconnect, `isConnected` is false and the KV entry
/// is gone.
#[tokio::test]
async fn invariant4_disconnect_clears_cache_and_status() {
    let (cache, manager) = manager();
    manager
        .store_integration(NewIntegration {
            user_id: "u1".to_string(),
            tool_name: "slack".to_string(),
            access_token: "tok".to_string(),
            refresh_token: None,
            expires_at: None,
            scopes: Default::default(),
            metadata: Default::default(),
        })
        .await
        .unwrap();

    assert!(manager.is_connected("u1", "slack").await.unwrap().connected);

    manager.disconnect("u1", "slack").await.unwrap();

    assert!(!manager.is_connected("u1", "slack").await.unwrap().connected);
    assert_eq!(cache.get("integration:u1:slack").await.unwrap(), None);
}

/// Reconnecting a revoked `(user, tool)` pair upserts back to active (§9
/// open question, resolved as upsert-to-active).
#[tokio::test]
async fn reconnect_after_disconnect_upserts_to_active() {
    let (_cache, manager) = manager();
    let new = || NewIntegration {
        user_id: "u1".to_string(),
        tool_name: "slack".to_string(),
        access_token: "tok".to_string(),
        refresh_token: None,
        expires_at: None,
        scopes: Default::default(),
        metadata: Default::default(),
    };
    manager.store_integration(new()).await.unwrap();
    manager.disconnect("u1", "slack").await.unwrap();
    assert!(!manager.is_connected("u1", "slack").await.unwrap().connected);

    manager.store_integration(new()).await.unwrap();
    assert!(manager.is_connected("u1", "slack").await.unwrap().connected);
}

/// An expired integration with a refresh token refreshes transparently and
/// reports connected.
#[tokio::test]
async fn expired_integration_refreshes_transparently() {
    let (_cache, mut manager) = manager();
    manager.register_refresher("slack", Arc::new(AlwaysRefreshes));

    manager
        .store_integration(NewIntegration {
            user_id: "u1".to_string(),
            tool_name: "slack".to_string(),
            access_token: "tok".to_string(),
            refresh_token: Some("rtok".to_string()),
            expires_at: Some(Utc::now() - chrono::Duration::minutes(1)),
            scopes: Default::default(),
            metadata: Default::default(),
        })
        .await
        .unwrap();

    let status = manager.is_connected("u1", "slack").await.unwrap();
    assert!(status.connected);
}

/// No refresh token and an expired integration reports not-connected
/// without error.
#[tokio::test]
async fn expired_integration_without_refresh_token_is_not_connected() {
    let (_cache, manager) = manager();
    manager
        .store_integration(NewIntegration {
            user_id: "u1".to_string(),
            tool_name: "slack".to_string(),
            access_token: "tok".to_string(),
            refresh_token: None,
            expires_at: Some(Utc::now() - chrono::Duration::minutes(1)),
            scopes: Default::default(),
            metadata: Default::default(),
        })
        .await
        .unwrap();

    let status = manager.is_connected("u1", "slack").await.unwrap();
    assert!(!status.connected);
    assert!(status.error.is_none());
}
