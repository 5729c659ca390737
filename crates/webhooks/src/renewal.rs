//! Subscription renewal sweep (§4.7): subscriptions with `expires_at <=
//! now+24h OR status=error` get their OAuth token refreshed first, then the
//! provider subscription itself renewed. Renewal failures set
//! `status=error` and are retried on the next tick.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pe_core::error::CoreResult;
use pe_core::IntegrationManager;
use pe_models::{SubscriptionStatus, WebhookSubscription};
use pe_store::Store;
use tracing::{info, warn};

/// The provider's answer to a renewal request: a (possibly new)
/// subscription id and expiry.
#[derive(Debug, Clone)]
pub struct RenewedSubscription {
    pub subscription_id: String,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Per-provider subscription renewal strategy. Real implementations call
/// the provider's subscribe/renew endpoint; adapters in this workspace
/// register a simulated strategy per the explicit Non-goal on real
/// provider calls.
#[async_trait]
pub trait SubscriptionRenewer: Send + Sync {
    async fn renew(&self, subscription: &WebhookSubscription) -> CoreResult<RenewedSubscription>;
}

pub struct RenewalSweeper {
    store: Arc<dyn Store>,
    integration_manager: Arc<IntegrationManager>,
    renewers: HashMap<String, Arc<dyn SubscriptionRenewer>>,
}

impl RenewalSweeper {
    pub fn new(store: Arc<dyn Store>, integration_manager: Arc<IntegrationManager>) -> Self {
        Self {
            store,
            integration_manager,
            renewers: HashMap::new(),
        }
    }

    pub fn register_renewer(&mut self, provider: impl Into<String>, renewer: Arc<dyn SubscriptionRenewer>) {
        self.renewers.insert(provider.into(), renewer);
    }

    /// One sweep tick: subscriptions due per `now` are refreshed then
    /// renewed; each is handled independently so one failure does not stop
    /// the rest of the batch.
    pub async fn run_once(&self, now: DateTime<Utc>) -> CoreResult<usize> {
        let due = self.store.list_subscriptions_due_for_renewal(now).await?;
        let mut renewed = 0;
        for subscription in due {
            match self.renew_one(&subscription).await {
                Ok(()) => renewed += 1,
                Err(err) => {
                    warn!(
                        subscription_id = %subscription.subscription_id,
                        provider = %subscription.provider,
                        error = %err,
                        "subscription renewal failed"
                    );
                    let mut failed = subscription;
                    failed.status = SubscriptionStatus::Error;
                    let _ = self.store.upsert_webhook_subscription(failed).await;
                }
            }
        }
        Ok(renewed)
    }

    async fn renew_one(&self, subscription: &WebhookSubscription) -> CoreResult<()> {
        if let Some(integration) = self
            .integration_manager
            .get_integration(&subscription.owner_id, &subscription.provider)
            .await?
        {
            // Best-effort: an expired token without a refresh strategy should
            // not block subscription renewal itself from being attempted.
            let _ = self.integration_manager.refresh_token(&integration).await;
        }

        let renewer = self.renewers.get(&subscription.provider).ok_or_else(|| {
            pe_core::error::EngineError::AdapterNotFound {
                tool: subscription.provider.clone(),
            }
        })?;
        let renewed = renewer.renew(subscription).await?;

        let mut updated = subscription.clone();
        updated.subscription_id = renewed.subscription_id;
        updated.expires_at = renewed.expires_at;
        updated.status = SubscriptionStatus::Active;
        self.store.upsert_webhook_subscription(updated).await?;
        info!(provider = %subscription.provider, "subscription renewed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pe_cache::memory::InMemoryCache;
    use pe_models::Id;
    use pe_store::memory::InMemoryStore;

    struct AlwaysRenews;

    #[async_trait]
    impl SubscriptionRenewer for AlwaysRenews {
        async fn renew(&self, _subscription: &WebhookSubscription) -> CoreResult<RenewedSubscription> {
            Ok(RenewedSubscription {
                subscription_id: "renewed-sub".to_string(),
                expires_at: Some(Utc::now() + chrono::Duration::days(7)),
            })
        }
    }

    struct AlwaysFails;

    #[async_trait]
    impl SubscriptionRenewer for AlwaysFails {
        async fn renew(&self, _subscription: &WebhookSubscription) -> CoreResult<RenewedSubscription> {
            Err(pe_core::error::EngineError::NetworkError("unreachable".to_string()))
        }
    }

    fn sample_subscription() -> WebhookSubscription {
        WebhookSubscription {
            id: Id::new(),
            provider: "gmail".to_string(),
            owner_id: "user-1".to_string(),
            resource_id: None,
            subscription_id: "sub-old".to_string(),
            endpoint: "https://example.com/webhooks/gmail".to_string(),
            events: Default::default(),
            status: SubscriptionStatus::Active,
            expires_at: Some(Utc::now()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn due_subscription_is_renewed() {
        let store = Arc::new(InMemoryStore::new());
        let cache = Arc::new(InMemoryCache::new());
        let manager = Arc::new(IntegrationManager::new(store.clone(), cache));
        let mut sweeper = RenewalSweeper::new(store.clone(), manager);
        sweeper.register_renewer("gmail", Arc::new(AlwaysRenews));

        store
            .upsert_webhook_subscription(sample_subscription())
            .await
            .unwrap();

        let renewed = sweeper.run_once(Utc::now()).await.unwrap();
        assert_eq!(renewed, 1);
    }

    #[tokio::test]
    async fn failed_renewal_marks_subscription_error() {
        let store = Arc::new(InMemoryStore::new());
        let cache = Arc::new(InMemoryCache::new());
        let manager = Arc::new(IntegrationManager::new(store.clone(), cache));
        let mut sweeper = RenewalSweeper::new(store.clone(), manager);
        sweeper.register_renewer("gmail", Arc::new(AlwaysFails));

        let stored_initially = store
            .upsert_webhook_subscription(sample_subscription())
            .await
            .unwrap();
        let id = stored_initially.id;

        let renewed = sweeper.run_once(Utc::now()).await.unwrap();
        assert_eq!(renewed, 0);

        let stored = store.get_webhook_subscription(id).await.unwrap().unwrap();
        assert_eq!(stored.status, SubscriptionStatus::Error);
    }
}
