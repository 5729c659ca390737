//! Provider adapters implementing `pe_core::Adapter` (§4.6): one module per
//! integration, each composing a [`base::ProviderBase`] for the shared
//! OAuth-lifecycle plumbing and its own action dispatch for `send`/`fetch`.

pub mod asana;
pub mod base;
pub mod gmail;
pub mod http_client;
pub mod mock;
pub mod notion;
pub mod slack;
pub mod support;
pub mod taskmaster;
pub mod trello;

use std::sync::Arc;

use pe_core::adapter::Adapter;
use pe_core::IntegrationManager;

use http_client::HttpClient;

/// Builds the adapter set wired for production use: every real provider
/// adapter plus the `mock` reference adapter used by tests and local
/// development (§8 scenarios reference it by tool id `mock`).
pub fn build_default_registry(
    integration_manager: Arc<IntegrationManager>,
    http: Arc<dyn HttpClient>,
) -> Vec<Arc<dyn Adapter>> {
    vec![
        Arc::new(gmail::GmailAdapter::new(
            integration_manager.clone(),
            http.clone(),
        )),
        Arc::new(notion::NotionAdapter::new(
            integration_manager.clone(),
            http.clone(),
        )),
        Arc::new(slack::SlackAdapter::new(
            integration_manager.clone(),
            http.clone(),
        )),
        Arc::new(asana::AsanaAdapter::new(
            integration_manager.clone(),
            http.clone(),
        )),
        Arc::new(trello::TrelloAdapter::new(
            integration_manager.clone(),
            http.clone(),
        )),
        Arc::new(taskmaster::TaskMasterAdapter::new(integration_manager, http)),
        Arc::new(mock::MockAdapter::new()),
    ]
}
