use async_trait::async_trait;
use serde_json::Value;

use pe_models::{AdapterMetadata, AuthStatus, EngineResult as Result};

use crate::error::CoreResult;

/// The per-tool contract every adapter implements (§4.6). `send`/`fetch`
/// return a structured [`pe_models::EngineResult`] on both success and
/// expected failure; adapters must not propagate exceptions for ordinary
/// failures (invalid payload, upstream 4xx/5xx) — only a programmer error
/// should surface as an `Err` here.
#[async_trait]
pub trait Adapter: Send + Sync {
    /// The registry key this adapter is addressed by (`getMetadata().id`
    /// in the source; split out here so `PluginEngine::register_adapter`
    /// does not need an `await` to learn it).
    fn tool(&self) -> &str;

    async fn connect(&self, user_id: &str) -> CoreResult<AuthStatus>;

    /// Adapter-local connectivity check, backed by `IntegrationManager`.
    /// The dispatcher must not bypass this by reading integrations
    /// directly (§4.1 step 4).
    async fn is_connected(&self, user_id: &str) -> bool;

    async fn send(&self, agent_id: &str, user_id: &str, payload: Value) -> Result;

    async fn fetch(&self, agent_id: &str, user_id: &str, query: Option<Value>) -> Result;

    async fn disconnect(&self, user_id: &str) -> CoreResult<()>;

    fn get_metadata(&self) -> AdapterMetadata;
}
