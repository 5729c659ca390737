//! The production [`Store`]: Postgres via `sqlx`, following the teacher's
//! `repo/*.rs` shape (one row struct per table, a thin query per
//! operation) but using runtime `query_as` rather than the compile-time
//! `query_as!` macro, since this workspace has no live database to check
//! query metadata against at build time.

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde_json::Value;
use sqlx::{postgres::PgPoolOptions, PgPool, Row};

use pe_models::{
    ContextMapping, ContextMappingPatch, ErrorCodeStat, ErrorDetail, ErrorLog, FallbackMessage,
    Id, Integration, IntegrationStatus, NewContextMapping, NewErrorLog, NewIntegration,
    NewScheduledTask, ScheduledTask, TaskStatus, ToolErrorStat, WebhookEvent, WebhookEventStatus,
    WebhookSubscription,
};

use crate::{ClaimedTask, Store, StoreError, StoreResult};

pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .min_connections(1)
            .max_connections(10)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn run_schema(&self) -> anyhow::Result<()> {
        sqlx::raw_sql(include_str!("../schema.sql"))
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

fn map_sqlx(err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::RowNotFound => StoreError::NotFound,
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            StoreError::Conflict(db.message().to_string())
        }
        other => StoreError::Backend(other.into()),
    }
}

fn integration_from_row(row: sqlx::postgres::PgRow) -> anyhow::Result<Integration> {
    let status: String = row.try_get("status")?;
    let scopes: Value = row.try_get("scopes")?;
    let metadata: Value = row.try_get("metadata")?;
    Ok(Integration {
        id: Id(row.try_get("id")?),
        user_id: row.try_get("user_id")?,
        tool_name: row.try_get("tool_name")?,
        access_token: row.try_get("access_token")?,
        refresh_token: row.try_get("refresh_token")?,
        expires_at: row.try_get("expires_at")?,
        status: serde_json::from_value(Value::String(status))?,
        scopes: serde_json::from_value(scopes).unwrap_or_default(),
        metadata: serde_json::from_value(metadata).unwrap_or_default(),
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn task_from_row(row: sqlx::postgres::PgRow) -> anyhow::Result<ScheduledTask> {
    let status: String = row.try_get("status")?;
    let error: Option<Value> = row.try_get("error")?;
    Ok(ScheduledTask {
        id: Id(row.try_get("id")?),
        agent_id: row.try_get("agent_id")?,
        user_id: row.try_get("user_id")?,
        tool: row.try_get("tool")?,
        action: row.try_get("action")?,
        payload: {
            let v: Value = row.try_get("payload")?;
            match v {
                Value::Object(m) => m,
                _ => Default::default(),
            }
        },
        execute_at: row.try_get("execute_at")?,
        status: serde_json::from_value(Value::String(status))?,
        attempts: row.try_get("attempts")?,
        result: row.try_get("result")?,
        error: error.map(serde_json::from_value).transpose()?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn error_log_from_row(row: sqlx::postgres::PgRow) -> anyhow::Result<ErrorLog> {
    let error_code: String = row.try_get("error_code")?;
    let payload: Option<Value> = row.try_get("payload")?;
    Ok(ErrorLog {
        id: Id(row.try_get("id")?),
        agent_id: row.try_get("agent_id")?,
        user_id: row.try_get("user_id")?,
        tool: row.try_get("tool")?,
        action: row.try_get("action")?,
        error_code: serde_json::from_value(Value::String(error_code))?,
        error_message: row.try_get("error_message")?,
        payload: payload.map(|v| match v {
            Value::Object(m) => m,
            _ => Default::default(),
        }),
        timestamp: row.try_get("timestamp")?,
        resolved: row.try_get("resolved")?,
        resolved_at: row.try_get("resolved_at")?,
    })
}

fn context_mapping_from_row(row: sqlx::postgres::PgRow) -> anyhow::Result<ContextMapping> {
    Ok(ContextMapping {
        id: Id(row.try_get("id")?),
        agent_id: row.try_get("agent_id")?,
        user_id: row.try_get("user_id")?,
        tool: row.try_get("tool")?,
        context_key: row.try_get("context_key")?,
        external_id: row.try_get("external_id")?,
        metadata: row.try_get("metadata")?,
        expires_at: row.try_get("expires_at")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn subscription_from_row(row: sqlx::postgres::PgRow) -> anyhow::Result<WebhookSubscription> {
    let status: String = row.try_get("status")?;
    let events: Value = row.try_get("events")?;
    Ok(WebhookSubscription {
        id: Id(row.try_get("id")?),
        provider: row.try_get("provider")?,
        owner_id: row.try_get("owner_id")?,
        resource_id: row.try_get("resource_id")?,
        subscription_id: row.try_get("subscription_id")?,
        endpoint: row.try_get("endpoint")?,
        events: serde_json::from_value(events).unwrap_or_default(),
        status: serde_json::from_value(Value::String(status))?,
        expires_at: row.try_get("expires_at")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn webhook_event_from_row(row: sqlx::postgres::PgRow) -> anyhow::Result<WebhookEvent> {
    let status: String = row.try_get("status")?;
    Ok(WebhookEvent {
        id: Id(row.try_get("id")?),
        provider: row.try_get("provider")?,
        event_id: row.try_get("event_id")?,
        event_type: row.try_get("event_type")?,
        payload: row.try_get("payload")?,
        status: serde_json::from_value(Value::String(status))?,
        created_at: row.try_get("created_at")?,
    })
}

#[async_trait]
impl Store for PostgresStore {
    async fn upsert_integration(&self, new: NewIntegration) -> StoreResult<Integration> {
        let scopes = serde_json::to_value(&new.scopes).unwrap();
        let metadata = serde_json::to_value(&new.metadata).unwrap();
        let row = sqlx::query(
            r#"
            INSERT INTO integrations
                (id, user_id, tool_name, access_token, refresh_token, expires_at, status, scopes, metadata, created_at, updated_at)
            VALUES
                ($1, $2, $3, $4, $5, $6, 'active', $7, $8, now(), now())
            ON CONFLICT (user_id, tool_name) DO UPDATE SET
                access_token = EXCLUDED.access_token,
                refresh_token = EXCLUDED.refresh_token,
                expires_at = EXCLUDED.expires_at,
                status = 'active',
                scopes = EXCLUDED.scopes,
                metadata = EXCLUDED.metadata,
                updated_at = now()
            RETURNING *
            "#,
        )
        .bind(Id::new().0)
        .bind(&new.user_id)
        .bind(&new.tool_name)
        .bind(&new.access_token)
        .bind(&new.refresh_token)
        .bind(new.expires_at)
        .bind(scopes)
        .bind(metadata)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx)?;
        integration_from_row(row).map_err(StoreError::Backend)
    }

    async fn get_integration(&self, user_id: &str, tool: &str) -> StoreResult<Option<Integration>> {
        let row = sqlx::query("SELECT * FROM integrations WHERE user_id = $1 AND tool_name = $2")
            .bind(user_id)
            .bind(tool)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)?;
        row.map(integration_from_row).transpose().map_err(StoreError::Backend)
    }

    async fn update_integration_tokens(
        &self,
        id: Id,
        access_token: &str,
        refresh_token: Option<&str>,
        expires_at: Option<DateTime<Utc>>,
    ) -> StoreResult<Integration> {
        let row = sqlx::query(
            r#"
            UPDATE integrations SET
                access_token = $2,
                refresh_token = COALESCE($3, refresh_token),
                expires_at = $4,
                status = 'active',
                updated_at = now()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id.0)
        .bind(access_token)
        .bind(refresh_token)
        .bind(expires_at)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx)?;
        integration_from_row(row).map_err(StoreError::Backend)
    }

    async fn set_integration_status(
        &self,
        id: Id,
        status: IntegrationStatus,
    ) -> StoreResult<Integration> {
        let status_str = serde_json::to_value(status).unwrap().as_str().unwrap().to_string();
        let row = sqlx::query(
            "UPDATE integrations SET status = $2, updated_at = now() WHERE id = $1 RETURNING *",
        )
        .bind(id.0)
        .bind(status_str)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx)?;
        integration_from_row(row).map_err(StoreError::Backend)
    }

    async fn list_integrations(&self, user_id: &str) -> StoreResult<Vec<Integration>> {
        let rows = sqlx::query("SELECT * FROM integrations WHERE user_id = $1")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx)?;
        rows.into_iter()
            .map(integration_from_row)
            .collect::<anyhow::Result<Vec<_>>>()
            .map_err(StoreError::Backend)
    }

    async fn insert_scheduled_task(&self, new: NewScheduledTask) -> StoreResult<ScheduledTask> {
        let payload = Value::Object(new.payload);
        let row = sqlx::query(
            r#"
            INSERT INTO scheduled_tasks
                (id, agent_id, user_id, tool, action, payload, execute_at, status, attempts, created_at, updated_at)
            VALUES
                ($1, $2, $3, $4, $5, $6, $7, 'scheduled', 0, now(), now())
            RETURNING *
            "#,
        )
        .bind(Id::new().0)
        .bind(&new.agent_id)
        .bind(&new.user_id)
        .bind(&new.tool)
        .bind(&new.action)
        .bind(payload)
        .bind(new.execute_at)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx)?;
        task_from_row(row).map_err(StoreError::Backend)
    }

    async fn get_scheduled_task(&self, id: Id) -> StoreResult<Option<ScheduledTask>> {
        let row = sqlx::query("SELECT * FROM scheduled_tasks WHERE id = $1")
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)?;
        row.map(task_from_row).transpose().map_err(StoreError::Backend)
    }

    async fn list_scheduled_tasks(&self, user_id: &str) -> StoreResult<Vec<ScheduledTask>> {
        let rows = sqlx::query("SELECT * FROM scheduled_tasks WHERE user_id = $1")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx)?;
        rows.into_iter()
            .map(task_from_row)
            .collect::<anyhow::Result<Vec<_>>>()
            .map_err(StoreError::Backend)
    }

    async fn claim_due_tasks(
        &self,
        limit: i64,
        now: DateTime<Utc>,
    ) -> StoreResult<Vec<ClaimedTask>> {
        // A single statement selects and transitions the batch, giving
        // exactly-once claim semantics under parallel sweepers (§9
        // "Scheduler claim atomicity") without an explicit transaction.
        let rows = sqlx::query(
            r#"
            UPDATE scheduled_tasks
            SET status = 'processing', attempts = attempts + 1, updated_at = $2
            WHERE id IN (
                SELECT id FROM scheduled_tasks
                WHERE status = 'scheduled' AND execute_at <= $2
                ORDER BY execute_at ASC, created_at ASC
                LIMIT $1
                FOR UPDATE SKIP LOCKED
            )
            RETURNING *
            "#,
        )
        .bind(limit)
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)?;
        rows.into_iter()
            .map(task_from_row)
            .collect::<anyhow::Result<Vec<_>>>()
            .map_err(StoreError::Backend)
    }

    async fn complete_task(
        &self,
        id: Id,
        result: Option<Value>,
    ) -> StoreResult<ScheduledTask> {
        let row = sqlx::query(
            "UPDATE scheduled_tasks SET status = 'completed', result = $2, error = NULL, updated_at = now() WHERE id = $1 RETURNING *",
        )
        .bind(id.0)
        .bind(result)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx)?;
        task_from_row(row).map_err(StoreError::Backend)
    }

    async fn fail_task(&self, id: Id, error: ErrorDetail) -> StoreResult<ScheduledTask> {
        let error_json = serde_json::to_value(error).unwrap();
        let row = sqlx::query(
            "UPDATE scheduled_tasks SET status = 'failed', error = $2, updated_at = now() WHERE id = $1 RETURNING *",
        )
        .bind(id.0)
        .bind(error_json)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx)?;
        task_from_row(row).map_err(StoreError::Backend)
    }

    async fn cancel_task(&self, id: Id) -> StoreResult<ScheduledTask> {
        let row = sqlx::query(
            r#"
            UPDATE scheduled_tasks
            SET status = 'cancelled', updated_at = now()
            WHERE id = $1 AND status = 'scheduled'
            RETURNING *
            "#,
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)?;
        match row {
            Some(row) => task_from_row(row).map_err(StoreError::Backend),
            None => {
                let existing = self.get_scheduled_task(id).await?.ok_or(StoreError::NotFound)?;
                if existing.status == TaskStatus::Cancelled {
                    Ok(existing)
                } else {
                    Err(StoreError::Conflict(format!(
                        "task {id} is not in the scheduled state"
                    )))
                }
            }
        }
    }

    async fn reschedule_task(
        &self,
        id: Id,
        execute_at: DateTime<Utc>,
        max_attempts: i32,
    ) -> StoreResult<Option<ScheduledTask>> {
        let row = sqlx::query(
            r#"
            UPDATE scheduled_tasks
            SET status = 'scheduled', execute_at = $2, updated_at = now()
            WHERE id = $1 AND attempts < $3
            RETURNING *
            "#,
        )
        .bind(id.0)
        .bind(execute_at)
        .bind(max_attempts)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)?;
        row.map(task_from_row).transpose().map_err(StoreError::Backend)
    }

    async fn cleanup_completed_tasks(&self, cutoff: DateTime<Utc>) -> StoreResult<u64> {
        let result = sqlx::query(
            "DELETE FROM scheduled_tasks WHERE status IN ('completed','failed','cancelled') AND updated_at < $1",
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(result.rows_affected())
    }

    async fn insert_error_log(&self, new: NewErrorLog) -> StoreResult<Id> {
        let payload = new.payload.map(Value::Object);
        let error_code = new.error_code.as_str();
        let row = sqlx::query(
            r#"
            INSERT INTO error_logs
                (id, agent_id, user_id, tool, action, error_code, error_message, payload, timestamp, resolved)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, false)
            RETURNING id
            "#,
        )
        .bind(Id::new().0)
        .bind(&new.agent_id)
        .bind(&new.user_id)
        .bind(&new.tool)
        .bind(&new.action)
        .bind(error_code)
        .bind(&new.error_message)
        .bind(payload)
        .bind(new.timestamp)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(Id(row.try_get("id").map_err(|e| StoreError::Backend(e.into()))?))
    }

    async fn resolve_error(&self, id: Id) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE error_logs SET resolved = true, resolved_at = now() WHERE id = $1",
        )
        .bind(id.0)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_agent_errors(&self, agent_id: &str, limit: i64) -> StoreResult<Vec<ErrorLog>> {
        let rows = sqlx::query(
            "SELECT * FROM error_logs WHERE agent_id = $1 ORDER BY timestamp DESC LIMIT $2",
        )
        .bind(agent_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)?;
        rows.into_iter()
            .map(error_log_from_row)
            .collect::<anyhow::Result<Vec<_>>>()
            .map_err(StoreError::Backend)
    }

    async fn error_stats_by_tool(&self, since: DateTime<Utc>) -> StoreResult<Vec<ToolErrorStat>> {
        let rows = sqlx::query(
            "SELECT tool, COUNT(*) AS count FROM error_logs WHERE timestamp >= $1 GROUP BY tool ORDER BY count DESC",
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)?;
        rows.into_iter()
            .map(|row| -> anyhow::Result<ToolErrorStat> {
                Ok(ToolErrorStat {
                    tool: row.try_get("tool")?,
                    count: row.try_get("count")?,
                })
            })
            .collect::<anyhow::Result<Vec<_>>>()
            .map_err(StoreError::Backend)
    }

    async fn error_trends(
        &self,
        tool: Option<&str>,
        start: NaiveDate,
        end: NaiveDate,
    ) -> StoreResult<Vec<(NaiveDate, i64)>> {
        let rows = sqlx::query(
            r#"
            SELECT DATE(timestamp) AS day, COUNT(*) AS count
            FROM error_logs
            WHERE timestamp >= $1 AND timestamp < $2
              AND ($3::text IS NULL OR tool = $3)
            GROUP BY day
            ORDER BY day ASC
            "#,
        )
        .bind(start.and_hms_opt(0, 0, 0).unwrap().and_utc())
        .bind((end + Duration::days(1)).and_hms_opt(0, 0, 0).unwrap().and_utc())
        .bind(tool)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)?;
        rows.into_iter()
            .map(|row| -> anyhow::Result<(NaiveDate, i64)> {
                Ok((row.try_get("day")?, row.try_get("count")?))
            })
            .collect::<anyhow::Result<Vec<_>>>()
            .map_err(StoreError::Backend)
    }

    async fn most_frequent_error_codes(
        &self,
        since: DateTime<Utc>,
        limit: i64,
    ) -> StoreResult<Vec<ErrorCodeStat>> {
        let rows = sqlx::query(
            "SELECT error_code, COUNT(*) AS count FROM error_logs WHERE timestamp >= $1 GROUP BY error_code ORDER BY count DESC LIMIT $2",
        )
        .bind(since)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)?;
        rows.into_iter()
            .map(|row| -> anyhow::Result<ErrorCodeStat> {
                let code: String = row.try_get("error_code")?;
                Ok(ErrorCodeStat {
                    error_code: serde_json::from_value(Value::String(code))?,
                    count: row.try_get("count")?,
                })
            })
            .collect::<anyhow::Result<Vec<_>>>()
            .map_err(StoreError::Backend)
    }

    async fn upsert_fallback_message(&self, entry: FallbackMessage) -> StoreResult<()> {
        let scope_key = FallbackMessage::scope_key(&entry.tool, entry.agent_id.as_deref());
        sqlx::query(
            r#"
            INSERT INTO fallback_messages (scope_key, tool, agent_id, message)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (scope_key) DO UPDATE SET message = EXCLUDED.message
            "#,
        )
        .bind(scope_key)
        .bind(entry.tool)
        .bind(entry.agent_id)
        .bind(entry.message)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(())
    }

    async fn list_fallback_messages(&self) -> StoreResult<Vec<FallbackMessage>> {
        let rows = sqlx::query("SELECT tool, agent_id, message FROM fallback_messages")
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx)?;
        rows.into_iter()
            .map(|row| -> anyhow::Result<FallbackMessage> {
                Ok(FallbackMessage {
                    tool: row.try_get("tool")?,
                    agent_id: row.try_get("agent_id")?,
                    message: row.try_get("message")?,
                })
            })
            .collect::<anyhow::Result<Vec<_>>>()
            .map_err(StoreError::Backend)
    }

    async fn upsert_context_mapping(
        &self,
        new: NewContextMapping,
    ) -> StoreResult<ContextMapping> {
        let row = sqlx::query(
            r#"
            INSERT INTO context_mappings
                (id, agent_id, user_id, tool, context_key, external_id, metadata, expires_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, now(), now())
            ON CONFLICT (agent_id, tool, context_key) DO UPDATE SET
                external_id = EXCLUDED.external_id,
                metadata = EXCLUDED.metadata,
                expires_at = EXCLUDED.expires_at,
                updated_at = now()
            RETURNING *
            "#,
        )
        .bind(Id::new().0)
        .bind(&new.agent_id)
        .bind(&new.user_id)
        .bind(&new.tool)
        .bind(&new.context_key)
        .bind(&new.external_id)
        .bind(&new.metadata)
        .bind(new.expires_at)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx)?;
        context_mapping_from_row(row).map_err(StoreError::Backend)
    }

    async fn get_context_mapping_by_id(&self, id: Id) -> StoreResult<Option<ContextMapping>> {
        let row = sqlx::query("SELECT * FROM context_mappings WHERE id = $1")
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)?;
        row.map(context_mapping_from_row).transpose().map_err(StoreError::Backend)
    }

    async fn get_context_mapping(
        &self,
        agent_id: &str,
        tool: &str,
        context_key: &str,
    ) -> StoreResult<Option<ContextMapping>> {
        let row = sqlx::query(
            "SELECT * FROM context_mappings WHERE agent_id = $1 AND tool = $2 AND context_key = $3",
        )
        .bind(agent_id)
        .bind(tool)
        .bind(context_key)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)?;
        row.map(context_mapping_from_row).transpose().map_err(StoreError::Backend)
    }

    async fn get_context_mapping_by_external_id(
        &self,
        agent_id: &str,
        tool: &str,
        external_id: &str,
    ) -> StoreResult<Option<ContextMapping>> {
        let row = sqlx::query(
            "SELECT * FROM context_mappings WHERE agent_id = $1 AND tool = $2 AND external_id = $3",
        )
        .bind(agent_id)
        .bind(tool)
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)?;
        row.map(context_mapping_from_row).transpose().map_err(StoreError::Backend)
    }

    async fn update_context_mapping(
        &self,
        id: Id,
        patch: ContextMappingPatch,
    ) -> StoreResult<Option<ContextMapping>> {
        let row = sqlx::query(
            r#"
            UPDATE context_mappings SET
                external_id = COALESCE($2, external_id),
                metadata = COALESCE($3, metadata),
                expires_at = COALESCE($4, expires_at),
                updated_at = now()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id.0)
        .bind(patch.external_id)
        .bind(patch.metadata)
        .bind(patch.expires_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)?;
        row.map(context_mapping_from_row).transpose().map_err(StoreError::Backend)
    }

    async fn delete_context_mapping_by_id(&self, id: Id) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM context_mappings WHERE id = $1")
            .bind(id.0)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx)?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_context_mapping_by_key(
        &self,
        agent_id: &str,
        tool: &str,
        context_key: &str,
    ) -> StoreResult<bool> {
        let result = sqlx::query(
            "DELETE FROM context_mappings WHERE agent_id = $1 AND tool = $2 AND context_key = $3",
        )
        .bind(agent_id)
        .bind(tool)
        .bind(context_key)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_context_mappings(
        &self,
        agent_id: &str,
        tool: &str,
    ) -> StoreResult<Vec<ContextMapping>> {
        let rows = sqlx::query("SELECT * FROM context_mappings WHERE agent_id = $1 AND tool = $2")
            .bind(agent_id)
            .bind(tool)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx)?;
        rows.into_iter()
            .map(context_mapping_from_row)
            .collect::<anyhow::Result<Vec<_>>>()
            .map_err(StoreError::Backend)
    }

    async fn upsert_webhook_subscription(
        &self,
        subscription: WebhookSubscription,
    ) -> StoreResult<WebhookSubscription> {
        let events = serde_json::to_value(&subscription.events).unwrap();
        let status_str = serde_json::to_value(subscription.status)
            .unwrap()
            .as_str()
            .unwrap()
            .to_string();
        let id = if subscription.id == Id::nil() {
            Id::new()
        } else {
            subscription.id
        };
        let row = sqlx::query(
            r#"
            INSERT INTO webhook_subscriptions
                (id, provider, owner_id, resource_id, subscription_id, endpoint, events, status, expires_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, now(), now())
            ON CONFLICT (id) DO UPDATE SET
                subscription_id = EXCLUDED.subscription_id,
                events = EXCLUDED.events,
                status = EXCLUDED.status,
                expires_at = EXCLUDED.expires_at,
                updated_at = now()
            RETURNING *
            "#,
        )
        .bind(id.0)
        .bind(&subscription.provider)
        .bind(&subscription.owner_id)
        .bind(&subscription.resource_id)
        .bind(&subscription.subscription_id)
        .bind(&subscription.endpoint)
        .bind(events)
        .bind(status_str)
        .bind(subscription.expires_at)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx)?;
        subscription_from_row(row).map_err(StoreError::Backend)
    }

    async fn list_subscriptions_due_for_renewal(
        &self,
        now: DateTime<Utc>,
    ) -> StoreResult<Vec<WebhookSubscription>> {
        let horizon = now + Duration::hours(24);
        let rows = sqlx::query(
            "SELECT * FROM webhook_subscriptions WHERE status = 'error' OR expires_at <= $1",
        )
        .bind(horizon)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)?;
        rows.into_iter()
            .map(subscription_from_row)
            .collect::<anyhow::Result<Vec<_>>>()
            .map_err(StoreError::Backend)
    }

    async fn get_webhook_subscription(&self, id: Id) -> StoreResult<Option<WebhookSubscription>> {
        let row = sqlx::query("SELECT * FROM webhook_subscriptions WHERE id = $1")
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)?;
        row.map(subscription_from_row).transpose().map_err(StoreError::Backend)
    }

    async fn insert_webhook_event(
        &self,
        provider: &str,
        event_id: &str,
        event_type: &str,
        payload: Value,
    ) -> StoreResult<WebhookEvent> {
        let row = sqlx::query(
            r#"
            INSERT INTO webhook_events (id, provider, event_id, event_type, payload, status, created_at)
            VALUES ($1, $2, $3, $4, $5, 'pending', now())
            ON CONFLICT (provider, event_id) DO UPDATE SET provider = EXCLUDED.provider
            RETURNING *
            "#,
        )
        .bind(Id::new().0)
        .bind(provider)
        .bind(event_id)
        .bind(event_type)
        .bind(payload)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx)?;
        webhook_event_from_row(row).map_err(StoreError::Backend)
    }

    async fn update_webhook_event_status(
        &self,
        id: Id,
        status: WebhookEventStatus,
    ) -> StoreResult<Option<WebhookEvent>> {
        let status_str = serde_json::to_value(status).unwrap().as_str().unwrap().to_string();
        let row = sqlx::query("UPDATE webhook_events SET status = $2 WHERE id = $1 RETURNING *")
            .bind(id.0)
            .bind(status_str)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)?;
        row.map(webhook_event_from_row).transpose().map_err(StoreError::Backend)
    }
}

