use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::Serialize;

use crate::error::ApiError;
use crate::state::AppContext;

const CRON_HEADER: &str = "x-cron-secret";

fn check_cron_secret(ctx: &AppContext, headers: &HeaderMap) -> Result<(), ApiError> {
    let provided = headers
        .get(CRON_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if provided != ctx.settings.guards.cron_secret_token {
        return Err(ApiError::unauthorized("invalid cron secret"));
    }
    Ok(())
}

#[derive(Serialize)]
pub struct CronResponse {
    processed: usize,
}

/// `POST /plugin-engine/cron`, guarded by `CRON_SECRET_TOKEN` (§6).
pub async fn run_cron(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
) -> Result<Json<CronResponse>, ApiError> {
    check_cron_secret(&ctx, &headers)?;
    let processed = ctx.engine.process_due_tasks(None).await?;
    Ok(Json(CronResponse {
        processed: processed.len(),
    }))
}
