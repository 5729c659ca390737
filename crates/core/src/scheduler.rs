use std::sync::Arc;

use chrono::{DateTime, Utc};

use pe_cache::{Cache, CacheExt};
use pe_models::{ErrorDetail, Id, NewScheduledTask, ScheduledTask};
use pe_store::Store;

use crate::error::CoreResult;
use crate::keys;

const DEFAULT_CLAIM_BATCH: i64 = 10;

/// Persists future tasks, sweeps due ones, and accounts retries (§4.4).
/// Execution of a claimed task is the caller's job (`PluginEngine`'s
/// sweeper loop) — the Scheduler only owns the claim/terminal-state
/// transitions, keeping adapter dispatch out of this module per the §9
/// cyclic-risk note.
pub struct Scheduler {
    store: Arc<dyn Store>,
    cache: Arc<dyn Cache>,
}

impl Scheduler {
    pub fn new(store: Arc<dyn Store>, cache: Arc<dyn Cache>) -> Self {
        Self { store, cache }
    }

    /// Inserts the task and mirrors it into KV with a TTL equal to the
    /// seconds until `execute_at` (minimum 1).
    pub async fn schedule_task(&self, new: NewScheduledTask) -> CoreResult<ScheduledTask> {
        let execute_at = new.execute_at;
        let task = self.store.insert_scheduled_task(new).await?;

        let seconds_until = (execute_at - Utc::now()).num_seconds().max(1) as u64;
        let key = keys::scheduled_task(task.id);
        let _ = self
            .cache
            .set_json(&key, &task, Some(std::time::Duration::from_secs(seconds_until)))
            .await;

        Ok(task)
    }

    pub async fn get_task(&self, id: Id) -> CoreResult<Option<ScheduledTask>> {
        Ok(self.store.get_scheduled_task(id).await?)
    }

    pub async fn list_tasks(&self, user_id: &str) -> CoreResult<Vec<ScheduledTask>> {
        Ok(self.store.list_scheduled_tasks(user_id).await?)
    }

    /// Atomically claims up to `limit` (default 10) due rows, transitioning
    /// each to `processing` with `attempts` incremented in the same
    /// statement (§5 "Locking/transactions").
    pub async fn claim_due_tasks(&self, limit: Option<i64>, now: DateTime<Utc>) -> CoreResult<Vec<ScheduledTask>> {
        Ok(self
            .store
            .claim_due_tasks(limit.unwrap_or(DEFAULT_CLAIM_BATCH), now)
            .await?)
    }

    pub async fn complete_task(&self, id: Id, result: Option<serde_json::Value>) -> CoreResult<ScheduledTask> {
        let task = self.store.complete_task(id, result).await?;
        self.cache.delete(&keys::scheduled_task(id)).await.ok();
        Ok(task)
    }

    pub async fn fail_task(&self, id: Id, error: ErrorDetail) -> CoreResult<ScheduledTask> {
        let task = self.store.fail_task(id, error).await?;
        self.cache.delete(&keys::scheduled_task(id)).await.ok();
        Ok(task)
    }

    /// Only valid from `scheduled`; idempotent.
    pub async fn cancel_task(&self, id: Id) -> CoreResult<ScheduledTask> {
        let task = self.store.cancel_task(id).await?;
        self.cache.delete(&keys::scheduled_task(id)).await.ok();
        Ok(task)
    }

    /// Resets a failed task to `scheduled` at `now + delay`, subject to
    /// `attempts < max_attempts`. Retry is never automatic — only a
    /// caller-initiated `retryTask` re-enqueues (§4.4).
    pub async fn retry_task(
        &self,
        id: Id,
        delay: chrono::Duration,
        max_attempts: i32,
    ) -> CoreResult<Option<ScheduledTask>> {
        let execute_at = Utc::now() + delay;
        let task = self.store.reschedule_task(id, execute_at, max_attempts).await?;
        if let Some(task) = &task {
            let seconds_until = (task.execute_at - Utc::now()).num_seconds().max(1) as u64;
            let key = keys::scheduled_task(id);
            let _ = self
                .cache
                .set_json(&key, task, Some(std::time::Duration::from_secs(seconds_until)))
                .await;
        }
        Ok(task)
    }

    pub async fn cleanup_completed_tasks(&self, older_than: chrono::Duration) -> CoreResult<u64> {
        let cutoff = Utc::now() - older_than;
        Ok(self.store.cleanup_completed_tasks(cutoff).await?)
    }
}
