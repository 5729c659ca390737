use std::collections::HashMap;
use std::sync::Arc;
use std::sync::RwLock;

use chrono::{Duration, Utc};

use pe_cache::Cache;
use pe_models::{
    ErrorCodeStat, ErrorLog, ErrorTrendPoint, FallbackMessage, Id, NewErrorLog, ToolErrorStat,
    DEFAULT_FALLBACK_MESSAGE,
};
use pe_store::Store;

use crate::error::CoreResult;
use crate::keys;

const DEFAULT_RETRY_LIMIT: i32 = 2;
const DISABLE_THRESHOLD: i64 = 10;
const COUNTER_TTL: std::time::Duration = std::time::Duration::from_secs(3600);

/// Error accounting, circuit breaking, and fallback-message resolution
/// (§4.3). The retry-limit and fallback-message tables are read-heavy and
/// held behind a `std::sync::RwLock` rather than an async lock — no
/// `.await` happens while either is held, matching the teacher's
/// reader-friendly posture for in-memory config tables.
pub struct ErrorHandler {
    store: Arc<dyn Store>,
    cache: Arc<dyn Cache>,
    retry_limits: RwLock<HashMap<String, i32>>,
    fallback_messages: RwLock<HashMap<String, String>>,
}

impl ErrorHandler {
    /// Constructs the handler and reloads persisted fallback messages
    /// from the Store, resolving the §9 open question that the source
    /// only mirrored `setFallbackMessage` to memory.
    pub async fn load(store: Arc<dyn Store>, cache: Arc<dyn Cache>) -> CoreResult<Self> {
        let persisted = store.list_fallback_messages().await?;
        let mut fallback_messages = HashMap::new();
        for entry in persisted {
            let key = FallbackMessage::scope_key(&entry.tool, entry.agent_id.as_deref());
            fallback_messages.insert(key, entry.message);
        }
        Ok(Self {
            store,
            cache,
            retry_limits: RwLock::new(HashMap::new()),
            fallback_messages: RwLock::new(fallback_messages),
        })
    }

    /// Overrides the default retry limit for `tool`, normally set once at
    /// startup from configuration.
    pub fn set_retry_limit(&self, tool: impl Into<String>, limit: i32) {
        self.retry_limits.write().unwrap().insert(tool.into(), limit);
    }

    /// Writes an `ErrorLog` row, then increments both the action-scoped
    /// and tool-scoped counters in KV. Never throws: a Store failure is
    /// logged and an empty string returned, per the contract that
    /// `logError` is not on the hot failure path of its own callers.
    pub async fn log_error(&self, new: NewErrorLog) -> String {
        let agent_id = new.agent_id.clone();
        let tool = new.tool.clone();
        let action = new.action.clone();

        let id = match self.store.insert_error_log(new).await {
            Ok(id) => id,
            Err(err) => {
                tracing::error!(?err, "failed to persist error log");
                return String::new();
            }
        };

        let tool_key = keys::error_count_tool(&agent_id, &tool);
        let action_key = keys::error_count_action(&agent_id, &tool, &action);
        if let Err(err) = self.cache.incr(&tool_key, COUNTER_TTL).await {
            tracing::warn!(?err, key = %tool_key, "failed to increment tool error counter");
        }
        if let Err(err) = self.cache.incr(&action_key, COUNTER_TTL).await {
            tracing::warn!(?err, key = %action_key, "failed to increment action error counter");
        }

        id.to_string()
    }

    /// True once the sliding (TTL'd) error count for `(agent, tool)`
    /// exceeds the disable threshold.
    pub async fn should_disable_tool(&self, agent_id: &str, tool: &str) -> bool {
        let key = keys::error_count_tool(agent_id, tool);
        match self.cache.get_counter(&key).await {
            Ok(count) => count > DISABLE_THRESHOLD,
            Err(err) => {
                tracing::warn!(?err, key = %key, "failed to read tool error counter, allowing dispatch");
                false
            }
        }
    }

    /// True while the action-scoped count stays under the configured (or
    /// default) retry limit for `tool`. Used by callers implementing
    /// their own retry loops, not by the dispatcher itself.
    pub async fn should_retry(&self, agent_id: &str, tool: &str, action: &str) -> bool {
        let limit = self
            .retry_limits
            .read()
            .unwrap()
            .get(tool)
            .copied()
            .unwrap_or(DEFAULT_RETRY_LIMIT);
        let key = keys::error_count_action(agent_id, tool, action);
        match self.cache.get_counter(&key).await {
            Ok(count) => count < limit as i64,
            Err(_) => true,
        }
    }

    /// Agent-scoped entry -> tool-scoped entry -> built-in `default`
    /// entry -> the hard-coded last-resort constant.
    pub fn get_fallback_message(&self, tool: &str, agent_id: Option<&str>) -> String {
        let table = self.fallback_messages.read().unwrap();
        if let Some(agent_id) = agent_id {
            if let Some(msg) = table.get(&FallbackMessage::scope_key(tool, Some(agent_id))) {
                return msg.clone();
            }
        }
        if let Some(msg) = table.get(&FallbackMessage::scope_key(tool, None)) {
            return msg.clone();
        }
        if let Some(msg) = table.get("default") {
            return msg.clone();
        }
        DEFAULT_FALLBACK_MESSAGE.to_string()
    }

    /// Persists to the Store and mirrors into the in-memory map in the
    /// same call, so a restart reloads exactly what was last set.
    pub async fn set_fallback_message(
        &self,
        tool: &str,
        agent_id: Option<&str>,
        message: &str,
    ) -> CoreResult<()> {
        let entry = FallbackMessage {
            tool: tool.to_string(),
            agent_id: agent_id.map(|a| a.to_string()),
            message: message.to_string(),
        };
        self.store.upsert_fallback_message(entry.clone()).await?;
        let key = FallbackMessage::scope_key(tool, agent_id);
        self.fallback_messages.write().unwrap().insert(key, message.to_string());
        Ok(())
    }

    pub async fn resolve_error(&self, id: Id) -> CoreResult<bool> {
        Ok(self.store.resolve_error(id).await?)
    }

    /// `bulkResolveErrors([])` short-circuits before touching the Store.
    pub async fn bulk_resolve_errors(&self, ids: &[Id]) -> CoreResult<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let mut resolved = 0;
        for id in ids {
            if self.store.resolve_error(*id).await? {
                resolved += 1;
            }
        }
        Ok(resolved)
    }

    pub async fn get_agent_errors(&self, agent_id: &str, limit: Option<i64>) -> CoreResult<Vec<ErrorLog>> {
        Ok(self.store.list_agent_errors(agent_id, limit.unwrap_or(10)).await?)
    }

    pub async fn get_error_stats_by_tool(&self, days: Option<i64>) -> CoreResult<Vec<ToolErrorStat>> {
        let since = Utc::now() - Duration::days(days.unwrap_or(7));
        Ok(self.store.error_stats_by_tool(since).await?)
    }

    /// Every day in `[today-N+1, today]` is present, zero-filled if the
    /// Store has no rows for it (§4.3 "every day in the window is
    /// present").
    pub async fn get_error_trends(
        &self,
        days: Option<i64>,
        tool: Option<&str>,
    ) -> CoreResult<Vec<ErrorTrendPoint>> {
        let days = days.unwrap_or(30).max(1);
        let today = Utc::now().date_naive();
        let start = today - Duration::days(days - 1);
        let raw = self.store.error_trends(tool, start, today).await?;
        let counts: HashMap<_, _> = raw.into_iter().collect();

        let mut points = Vec::with_capacity(days as usize);
        let mut date = start;
        while date <= today {
            points.push(ErrorTrendPoint {
                date,
                count: counts.get(&date).copied().unwrap_or(0),
            });
            date += Duration::days(1);
        }
        Ok(points)
    }

    pub async fn get_most_frequent_error_codes(
        &self,
        limit: Option<i64>,
        days: Option<i64>,
    ) -> CoreResult<Vec<ErrorCodeStat>> {
        let since = Utc::now() - Duration::days(days.unwrap_or(7));
        Ok(self
            .store
            .most_frequent_error_codes(since, limit.unwrap_or(5))
            .await?)
    }
}
