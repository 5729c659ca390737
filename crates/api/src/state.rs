use std::sync::Arc;

use pe_cache::Cache;
use pe_core::{ContextMapper, ErrorHandler, IntegrationManager, PluginEngine, Scheduler};
use pe_store::Store;
use pe_webhooks::{RenewalSweeper, WebhookIngestor};

use crate::config::Settings;

/// Everything a handler needs, shared behind an `Arc` per the teacher's
/// `agent::api::App` shape — an explicit value threaded through
/// `State<AppContext>` rather than a process-global singleton (§9
/// "Singletons with hidden state").
#[derive(Clone)]
pub struct AppContext {
    pub engine: Arc<PluginEngine>,
    pub integration_manager: Arc<IntegrationManager>,
    pub error_handler: Arc<ErrorHandler>,
    pub scheduler: Arc<Scheduler>,
    pub context_mapper: Arc<ContextMapper>,
    pub webhook_ingestor: Arc<WebhookIngestor>,
    pub renewal_sweeper: Arc<RenewalSweeper>,
    pub store: Arc<dyn Store>,
    pub cache: Arc<dyn Cache>,
    pub settings: Arc<Settings>,
}
