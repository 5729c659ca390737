//! An in-memory [`Store`] used for unit tests and `PLUGIN_ENGINE_ENV=development`,
//! mirroring the teacher's `NODE_ENV=development` in-memory stub note (§6
//! environment, spec.md).
//!
//! A single `std::sync::Mutex` per table is enough here: every critical
//! section is pure data manipulation with no `.await` inside the lock, so
//! there is no contention risk worth a more exotic structure. The claim
//! step in particular relies on the whole table being locked for the
//! filter-then-transition sequence to be exactly-once under concurrent
//! callers (§9 "Scheduler claim atomicity").

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use pe_models::{
    ContextMapping, ContextMappingPatch, ErrorCode, ErrorCodeStat, ErrorDetail, ErrorLog,
    FallbackMessage, Id, Integration, IntegrationStatus, NewContextMapping, NewErrorLog,
    NewIntegration, NewScheduledTask, ScheduledTask, TaskStatus, ToolErrorStat, WebhookEvent,
    WebhookEventStatus, WebhookSubscription,
};

use crate::{ClaimedTask, Store, StoreError, StoreResult};

#[derive(Default)]
pub struct InMemoryStore {
    integrations: Mutex<HashMap<(String, String), Integration>>,
    tasks: Mutex<HashMap<Id, ScheduledTask>>,
    error_logs: Mutex<HashMap<Id, ErrorLog>>,
    fallback_messages: Mutex<HashMap<String, FallbackMessage>>,
    context_mappings: Mutex<HashMap<Id, ContextMapping>>,
    webhook_subscriptions: Mutex<HashMap<Id, WebhookSubscription>>,
    webhook_events: Mutex<HashMap<(String, String), Id>>,
    webhook_event_rows: Mutex<HashMap<Id, WebhookEvent>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn upsert_integration(&self, new: NewIntegration) -> StoreResult<Integration> {
        let mut table = self.integrations.lock().unwrap();
        let now = Utc::now();
        let key = (new.user_id.clone(), new.tool_name.clone());
        let integration = if let Some(existing) = table.get(&key) {
            Integration {
                access_token: new.access_token,
                refresh_token: new.refresh_token,
                expires_at: new.expires_at,
                status: IntegrationStatus::Active,
                scopes: new.scopes,
                metadata: new.metadata,
                updated_at: now,
                ..existing.clone()
            }
        } else {
            Integration {
                id: Id::new(),
                user_id: new.user_id,
                tool_name: new.tool_name,
                access_token: new.access_token,
                refresh_token: new.refresh_token,
                expires_at: new.expires_at,
                status: IntegrationStatus::Active,
                scopes: new.scopes,
                metadata: new.metadata,
                created_at: now,
                updated_at: now,
            }
        };
        table.insert(key, integration.clone());
        Ok(integration)
    }

    async fn get_integration(&self, user_id: &str, tool: &str) -> StoreResult<Option<Integration>> {
        let table = self.integrations.lock().unwrap();
        Ok(table.get(&(user_id.to_string(), tool.to_string())).cloned())
    }

    async fn update_integration_tokens(
        &self,
        id: Id,
        access_token: &str,
        refresh_token: Option<&str>,
        expires_at: Option<DateTime<Utc>>,
    ) -> StoreResult<Integration> {
        let mut table = self.integrations.lock().unwrap();
        let entry = table
            .values_mut()
            .find(|i| i.id == id)
            .ok_or(StoreError::NotFound)?;
        entry.access_token = access_token.to_string();
        if let Some(rt) = refresh_token {
            entry.refresh_token = Some(rt.to_string());
        }
        entry.expires_at = expires_at;
        entry.status = IntegrationStatus::Active;
        entry.updated_at = Utc::now();
        Ok(entry.clone())
    }

    async fn set_integration_status(
        &self,
        id: Id,
        status: IntegrationStatus,
    ) -> StoreResult<Integration> {
        let mut table = self.integrations.lock().unwrap();
        let entry = table
            .values_mut()
            .find(|i| i.id == id)
            .ok_or(StoreError::NotFound)?;
        entry.status = status;
        entry.updated_at = Utc::now();
        Ok(entry.clone())
    }

    async fn list_integrations(&self, user_id: &str) -> StoreResult<Vec<Integration>> {
        let table = self.integrations.lock().unwrap();
        Ok(table
            .values()
            .filter(|i| i.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn insert_scheduled_task(&self, new: NewScheduledTask) -> StoreResult<ScheduledTask> {
        let mut table = self.tasks.lock().unwrap();
        let now = Utc::now();
        let task = ScheduledTask {
            id: Id::new(),
            agent_id: new.agent_id,
            user_id: new.user_id,
            tool: new.tool,
            action: new.action,
            payload: new.payload,
            execute_at: new.execute_at,
            status: TaskStatus::Scheduled,
            attempts: 0,
            result: None,
            error: None,
            created_at: now,
            updated_at: now,
        };
        table.insert(task.id, task.clone());
        Ok(task)
    }

    async fn get_scheduled_task(&self, id: Id) -> StoreResult<Option<ScheduledTask>> {
        Ok(self.tasks.lock().unwrap().get(&id).cloned())
    }

    async fn list_scheduled_tasks(&self, user_id: &str) -> StoreResult<Vec<ScheduledTask>> {
        Ok(self
            .tasks
            .lock()
            .unwrap()
            .values()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn claim_due_tasks(
        &self,
        limit: i64,
        now: DateTime<Utc>,
    ) -> StoreResult<Vec<ClaimedTask>> {
        let mut table = self.tasks.lock().unwrap();
        let mut due: Vec<Id> = table
            .values()
            .filter(|t| t.status == TaskStatus::Scheduled && t.execute_at <= now)
            .map(|t| t.id)
            .collect();
        due.sort_by_key(|id| {
            let t = &table[id];
            (t.execute_at, t.created_at)
        });
        due.truncate(limit.max(0) as usize);

        let mut claimed = Vec::with_capacity(due.len());
        for id in due {
            let task = table.get_mut(&id).expect("id came from this table");
            task.status = TaskStatus::Processing;
            task.attempts += 1;
            task.updated_at = now;
            claimed.push(task.clone());
        }
        Ok(claimed)
    }

    async fn complete_task(
        &self,
        id: Id,
        result: Option<serde_json::Value>,
    ) -> StoreResult<ScheduledTask> {
        let mut table = self.tasks.lock().unwrap();
        let task = table.get_mut(&id).ok_or(StoreError::NotFound)?;
        task.status = TaskStatus::Completed;
        task.result = result;
        task.error = None;
        task.updated_at = Utc::now();
        Ok(task.clone())
    }

    async fn fail_task(&self, id: Id, error: ErrorDetail) -> StoreResult<ScheduledTask> {
        let mut table = self.tasks.lock().unwrap();
        let task = table.get_mut(&id).ok_or(StoreError::NotFound)?;
        task.status = TaskStatus::Failed;
        task.error = Some(error);
        task.updated_at = Utc::now();
        Ok(task.clone())
    }

    async fn cancel_task(&self, id: Id) -> StoreResult<ScheduledTask> {
        let mut table = self.tasks.lock().unwrap();
        let task = table.get_mut(&id).ok_or(StoreError::NotFound)?;
        if task.status == TaskStatus::Cancelled {
            return Ok(task.clone());
        }
        if task.status != TaskStatus::Scheduled {
            return Err(StoreError::Conflict(format!(
                "task {id} is not in the scheduled state"
            )));
        }
        task.status = TaskStatus::Cancelled;
        task.updated_at = Utc::now();
        Ok(task.clone())
    }

    async fn reschedule_task(
        &self,
        id: Id,
        execute_at: DateTime<Utc>,
        max_attempts: i32,
    ) -> StoreResult<Option<ScheduledTask>> {
        let mut table = self.tasks.lock().unwrap();
        let task = table.get_mut(&id).ok_or(StoreError::NotFound)?;
        if task.attempts >= max_attempts {
            return Ok(None);
        }
        task.status = TaskStatus::Scheduled;
        task.execute_at = execute_at;
        task.updated_at = Utc::now();
        Ok(Some(task.clone()))
    }

    async fn cleanup_completed_tasks(&self, cutoff: DateTime<Utc>) -> StoreResult<u64> {
        let mut table = self.tasks.lock().unwrap();
        let before = table.len();
        table.retain(|_, t| !(t.status.is_terminal() && t.updated_at < cutoff));
        Ok((before - table.len()) as u64)
    }

    async fn insert_error_log(&self, new: NewErrorLog) -> StoreResult<Id> {
        let mut table = self.error_logs.lock().unwrap();
        let id = Id::new();
        table.insert(
            id,
            ErrorLog {
                id,
                agent_id: new.agent_id,
                user_id: new.user_id,
                tool: new.tool,
                action: new.action,
                error_code: new.error_code,
                error_message: new.error_message,
                payload: new.payload,
                timestamp: new.timestamp,
                resolved: false,
                resolved_at: None,
            },
        );
        Ok(id)
    }

    async fn resolve_error(&self, id: Id) -> StoreResult<bool> {
        let mut table = self.error_logs.lock().unwrap();
        match table.get_mut(&id) {
            Some(row) => {
                row.resolved = true;
                row.resolved_at = Some(Utc::now());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list_agent_errors(&self, agent_id: &str, limit: i64) -> StoreResult<Vec<ErrorLog>> {
        let table = self.error_logs.lock().unwrap();
        let mut rows: Vec<ErrorLog> = table
            .values()
            .filter(|e| e.agent_id == agent_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        rows.truncate(limit.max(0) as usize);
        Ok(rows)
    }

    async fn error_stats_by_tool(&self, since: DateTime<Utc>) -> StoreResult<Vec<ToolErrorStat>> {
        let table = self.error_logs.lock().unwrap();
        let mut counts: HashMap<String, i64> = HashMap::new();
        for row in table.values().filter(|e| e.timestamp >= since) {
            *counts.entry(row.tool.clone()).or_default() += 1;
        }
        let mut stats: Vec<ToolErrorStat> = counts
            .into_iter()
            .map(|(tool, count)| ToolErrorStat { tool, count })
            .collect();
        stats.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.tool.cmp(&b.tool)));
        Ok(stats)
    }

    async fn error_trends(
        &self,
        tool: Option<&str>,
        start: NaiveDate,
        end: NaiveDate,
    ) -> StoreResult<Vec<(NaiveDate, i64)>> {
        let table = self.error_logs.lock().unwrap();
        let mut counts: HashMap<NaiveDate, i64> = HashMap::new();
        for row in table.values() {
            let date = row.timestamp.date_naive();
            if date < start || date > end {
                continue;
            }
            if let Some(t) = tool {
                if row.tool != t {
                    continue;
                }
            }
            *counts.entry(date).or_default() += 1;
        }
        let mut out: Vec<(NaiveDate, i64)> = counts.into_iter().collect();
        out.sort_by_key(|(d, _)| *d);
        Ok(out)
    }

    async fn most_frequent_error_codes(
        &self,
        since: DateTime<Utc>,
        limit: i64,
    ) -> StoreResult<Vec<ErrorCodeStat>> {
        let table = self.error_logs.lock().unwrap();
        let mut counts: HashMap<ErrorCode, i64> = HashMap::new();
        for row in table.values().filter(|e| e.timestamp >= since) {
            *counts.entry(row.error_code).or_default() += 1;
        }
        let mut stats: Vec<ErrorCodeStat> = counts
            .into_iter()
            .map(|(error_code, count)| ErrorCodeStat { error_code, count })
            .collect();
        stats.sort_by(|a, b| b.count.cmp(&a.count));
        stats.truncate(limit.max(0) as usize);
        Ok(stats)
    }

    async fn upsert_fallback_message(&self, entry: FallbackMessage) -> StoreResult<()> {
        let key = FallbackMessage::scope_key(&entry.tool, entry.agent_id.as_deref());
        self.fallback_messages.lock().unwrap().insert(key, entry);
        Ok(())
    }

    async fn list_fallback_messages(&self) -> StoreResult<Vec<FallbackMessage>> {
        Ok(self.fallback_messages.lock().unwrap().values().cloned().collect())
    }

    async fn upsert_context_mapping(
        &self,
        new: NewContextMapping,
    ) -> StoreResult<ContextMapping> {
        let mut table = self.context_mappings.lock().unwrap();
        let now = Utc::now();
        let existing_id = table
            .values()
            .find(|m| {
                m.agent_id == new.agent_id && m.tool == new.tool && m.context_key == new.context_key
            })
            .map(|m| m.id);

        let mapping = if let Some(id) = existing_id {
            let row = table.get_mut(&id).expect("id came from this table");
            row.external_id = new.external_id;
            row.metadata = new.metadata;
            row.expires_at = new.expires_at;
            row.updated_at = now;
            row.clone()
        } else {
            let row = ContextMapping {
                id: Id::new(),
                agent_id: new.agent_id,
                user_id: new.user_id,
                tool: new.tool,
                context_key: new.context_key,
                external_id: new.external_id,
                metadata: new.metadata,
                expires_at: new.expires_at,
                created_at: now,
                updated_at: now,
            };
            table.insert(row.id, row.clone());
            row
        };
        Ok(mapping)
    }

    async fn get_context_mapping_by_id(&self, id: Id) -> StoreResult<Option<ContextMapping>> {
        Ok(self.context_mappings.lock().unwrap().get(&id).cloned())
    }

    async fn get_context_mapping(
        &self,
        agent_id: &str,
        tool: &str,
        context_key: &str,
    ) -> StoreResult<Option<ContextMapping>> {
        let table = self.context_mappings.lock().unwrap();
        Ok(table
            .values()
            .find(|m| m.agent_id == agent_id && m.tool == tool && m.context_key == context_key)
            .cloned())
    }

    async fn get_context_mapping_by_external_id(
        &self,
        agent_id: &str,
        tool: &str,
        external_id: &str,
    ) -> StoreResult<Option<ContextMapping>> {
        let table = self.context_mappings.lock().unwrap();
        Ok(table
            .values()
            .find(|m| m.agent_id == agent_id && m.tool == tool && m.external_id == external_id)
            .cloned())
    }

    async fn update_context_mapping(
        &self,
        id: Id,
        patch: ContextMappingPatch,
    ) -> StoreResult<Option<ContextMapping>> {
        let mut table = self.context_mappings.lock().unwrap();
        let Some(row) = table.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(external_id) = patch.external_id {
            row.external_id = external_id;
        }
        if patch.metadata.is_some() {
            row.metadata = patch.metadata;
        }
        if patch.expires_at.is_some() {
            row.expires_at = patch.expires_at;
        }
        row.updated_at = Utc::now();
        Ok(Some(row.clone()))
    }

    async fn delete_context_mapping_by_id(&self, id: Id) -> StoreResult<bool> {
        Ok(self.context_mappings.lock().unwrap().remove(&id).is_some())
    }

    async fn delete_context_mapping_by_key(
        &self,
        agent_id: &str,
        tool: &str,
        context_key: &str,
    ) -> StoreResult<bool> {
        let mut table = self.context_mappings.lock().unwrap();
        let id = table
            .values()
            .find(|m| m.agent_id == agent_id && m.tool == tool && m.context_key == context_key)
            .map(|m| m.id);
        match id {
            Some(id) => {
                table.remove(&id);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list_context_mappings(
        &self,
        agent_id: &str,
        tool: &str,
    ) -> StoreResult<Vec<ContextMapping>> {
        let table = self.context_mappings.lock().unwrap();
        Ok(table
            .values()
            .filter(|m| m.agent_id == agent_id && m.tool == tool)
            .cloned()
            .collect())
    }

    async fn upsert_webhook_subscription(
        &self,
        mut subscription: WebhookSubscription,
    ) -> StoreResult<WebhookSubscription> {
        let mut table = self.webhook_subscriptions.lock().unwrap();
        if subscription.id == Id::nil() || !table.contains_key(&subscription.id) {
            subscription.id = Id::new();
        }
        subscription.updated_at = Utc::now();
        table.insert(subscription.id, subscription.clone());
        Ok(subscription)
    }

    async fn list_subscriptions_due_for_renewal(
        &self,
        now: DateTime<Utc>,
    ) -> StoreResult<Vec<WebhookSubscription>> {
        let table = self.webhook_subscriptions.lock().unwrap();
        let horizon = now + Duration::hours(24);
        Ok(table
            .values()
            .filter(|s| {
                s.status == pe_models::SubscriptionStatus::Error
                    || s.expires_at.map(|e| e <= horizon).unwrap_or(false)
            })
            .cloned()
            .collect())
    }

    async fn get_webhook_subscription(&self, id: Id) -> StoreResult<Option<WebhookSubscription>> {
        Ok(self.webhook_subscriptions.lock().unwrap().get(&id).cloned())
    }

    async fn insert_webhook_event(
        &self,
        provider: &str,
        event_id: &str,
        event_type: &str,
        payload: serde_json::Value,
    ) -> StoreResult<WebhookEvent> {
        let dedupe_key = (provider.to_string(), event_id.to_string());
        let mut index = self.webhook_events.lock().unwrap();
        let mut rows = self.webhook_event_rows.lock().unwrap();
        if let Some(existing_id) = index.get(&dedupe_key) {
            return Ok(rows[existing_id].clone());
        }
        let event = WebhookEvent {
            id: Id::new(),
            provider: provider.to_string(),
            event_id: event_id.to_string(),
            event_type: event_type.to_string(),
            payload,
            status: WebhookEventStatus::Pending,
            created_at: Utc::now(),
        };
        index.insert(dedupe_key, event.id);
        rows.insert(event.id, event.clone());
        Ok(event)
    }

    async fn update_webhook_event_status(
        &self,
        id: Id,
        status: WebhookEventStatus,
    ) -> StoreResult<Option<WebhookEvent>> {
        let mut rows = self.webhook_event_rows.lock().unwrap();
        let Some(row) = rows.get_mut(&id) else {
            return Ok(None);
        };
        row.status = status;
        Ok(Some(row.clone()))
    }
}
