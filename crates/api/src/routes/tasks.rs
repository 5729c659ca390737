use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::Duration;
use serde::Deserialize;

use pe_models::{Id, ScheduledTask};

use crate::error::ApiError;
use crate::state::AppContext;

#[derive(Debug, Deserialize)]
pub struct UserIdQuery {
    #[serde(rename = "userId")]
    user_id: String,
}

const DEFAULT_RETRY_DELAY_SECONDS: i64 = 60;
const DEFAULT_MAX_ATTEMPTS: i32 = 3;

/// `GET /plugin-engine/tasks?userId`.
pub async fn list_tasks(
    State(ctx): State<AppContext>,
    Query(query): Query<UserIdQuery>,
) -> Result<Json<Vec<ScheduledTask>>, ApiError> {
    Ok(Json(ctx.scheduler.list_tasks(&query.user_id).await?))
}

/// `DELETE /plugin-engine/tasks/:id`.
pub async fn cancel_task(
    State(ctx): State<AppContext>,
    Path(id): Path<Id>,
) -> Result<Json<ScheduledTask>, ApiError> {
    Ok(Json(ctx.scheduler.cancel_task(id).await?))
}

#[derive(Debug, Default, Deserialize)]
pub struct RetryTaskBody {
    #[serde(default)]
    delay_seconds: Option<i64>,
    #[serde(default)]
    max_attempts: Option<i32>,
}

/// `POST /plugin-engine/tasks/:id/retry`.
pub async fn retry_task(
    State(ctx): State<AppContext>,
    Path(id): Path<Id>,
    body: Option<Json<RetryTaskBody>>,
) -> Result<Json<Option<ScheduledTask>>, ApiError> {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    let delay = Duration::seconds(body.delay_seconds.unwrap_or(DEFAULT_RETRY_DELAY_SECONDS));
    let max_attempts = body.max_attempts.unwrap_or(DEFAULT_MAX_ATTEMPTS);
    Ok(Json(ctx.scheduler.retry_task(id, delay, max_attempts).await?))
}
