use axum::extract::State;
use axum::Json;

use pe_models::{EngineResult, TaskIntent};

use crate::state::AppContext;

/// `POST /plugin-engine/intents`.
pub async fn process_intent(
    State(ctx): State<AppContext>,
    Json(intent): Json<TaskIntent>,
) -> Json<EngineResult> {
    Json(ctx.engine.process_intent(intent).await)
}
