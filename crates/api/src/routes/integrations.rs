use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;

use pe_models::IntegrationSummary;

use crate::error::ApiError;
use crate::state::AppContext;

#[derive(Debug, Deserialize)]
pub struct UserIdQuery {
    #[serde(rename = "userId")]
    user_id: String,
}

/// `GET /plugin-engine/integrations?userId`.
pub async fn list_integrations(
    State(ctx): State<AppContext>,
    Query(query): Query<UserIdQuery>,
) -> Result<Json<Vec<IntegrationSummary>>, ApiError> {
    let integrations = ctx.integration_manager.list_integrations(&query.user_id).await?;
    Ok(Json(integrations.into_iter().map(IntegrationSummary::from).collect()))
}

/// `DELETE /plugin-engine/integrations/:tool?userId`.
pub async fn disconnect_integration(
    State(ctx): State<AppContext>,
    Path(tool): Path<String>,
    Query(query): Query<UserIdQuery>,
) -> Result<(), ApiError> {
    ctx.integration_manager.disconnect(&query.user_id, &tool).await?;
    Ok(())
}
