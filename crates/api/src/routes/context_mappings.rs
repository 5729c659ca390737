use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;

use pe_models::{ContextMapping, ContextMappingPatch, Id, NewContextMapping};

use crate::error::ApiError;
use crate::state::AppContext;

#[derive(Debug, Deserialize)]
pub struct AgentToolQuery {
    #[serde(rename = "agentId")]
    agent_id: String,
    tool: String,
}

/// `GET /plugin-engine/context-mappings?agentId&tool`.
pub async fn list_mappings(
    State(ctx): State<AppContext>,
    Query(query): Query<AgentToolQuery>,
) -> Result<Json<Vec<ContextMapping>>, ApiError> {
    Ok(Json(ctx.context_mapper.list_mappings(&query.agent_id, &query.tool).await?))
}

/// `POST /plugin-engine/context-mappings` — upsert.
pub async fn upsert_mapping(
    State(ctx): State<AppContext>,
    Json(new): Json<NewContextMapping>,
) -> Result<Json<ContextMapping>, ApiError> {
    Ok(Json(ctx.context_mapper.upsert_mapping(new).await?))
}

/// `PUT /plugin-engine/context-mappings/:id` — update by id.
pub async fn update_mapping(
    State(ctx): State<AppContext>,
    Path(id): Path<Id>,
    Json(patch): Json<ContextMappingPatch>,
) -> Result<Json<Option<ContextMapping>>, ApiError> {
    Ok(Json(ctx.context_mapper.update_mapping(id, patch).await?))
}

#[derive(Debug, Deserialize)]
pub struct MappingIdQuery {
    id: Id,
}

/// `DELETE /plugin-engine/context-mappings?id`.
pub async fn delete_mapping(
    State(ctx): State<AppContext>,
    Query(query): Query<MappingIdQuery>,
) -> Result<Json<bool>, ApiError> {
    Ok(Json(ctx.context_mapper.delete_mapping_by_id(query.id).await?))
}

/// `POST /plugin-engine/context-mappings/bulk` — bulk upsert.
pub async fn bulk_upsert_mappings(
    State(ctx): State<AppContext>,
    Json(mappings): Json<Vec<NewContextMapping>>,
) -> Result<Json<usize>, ApiError> {
    Ok(Json(ctx.context_mapper.bulk_upsert_mappings(mappings).await?))
}

/// `DELETE /plugin-engine/context-mappings/bulk` — bulk delete.
pub async fn bulk_delete_mappings(
    State(ctx): State<AppContext>,
    Json(ids): Json<Vec<Id>>,
) -> Result<Json<usize>, ApiError> {
    Ok(Json(ctx.context_mapper.bulk_delete_mappings(ids).await?))
}

#[derive(Debug, Deserialize)]
pub struct LookupQuery {
    #[serde(rename = "agentId")]
    agent_id: String,
    tool: String,
    #[serde(default, rename = "contextKey")]
    context_key: Option<String>,
    #[serde(default, rename = "externalId")]
    external_id: Option<String>,
}

/// `GET /plugin-engine/context-mappings/lookup?agentId&tool&(contextKey|externalId)`.
pub async fn lookup_mapping(
    State(ctx): State<AppContext>,
    Query(query): Query<LookupQuery>,
) -> Result<Json<Option<String>>, ApiError> {
    if let Some(context_key) = query.context_key {
        let external_id = ctx
            .context_mapper
            .get_external_id(&query.agent_id, &query.tool, &context_key)
            .await?;
        return Ok(Json(external_id));
    }
    if let Some(external_id) = query.external_id {
        let context_key = ctx
            .context_mapper
            .get_context_key(&query.agent_id, &query.tool, &external_id)
            .await?;
        return Ok(Json(context_key));
    }
    Err(ApiError::bad_request("lookup requires contextKey or externalId"))
}
