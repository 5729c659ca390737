use axum::extract::State;
use axum::Json;

use pe_models::AdapterMetadata;

use crate::state::AppContext;

/// `GET /plugin-engine/adapters`.
pub async fn list_adapters(State(ctx): State<AppContext>) -> Json<Vec<AdapterMetadata>> {
    let metadata = ctx
        .engine
        .list_adapters()
        .into_iter()
        .filter_map(|tool| ctx.engine.get_adapter(&tool))
        .map(|adapter| adapter.get_metadata())
        .collect();
    Json(metadata)
}
