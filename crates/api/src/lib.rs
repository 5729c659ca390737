//! The HTTP surface (§6): `axum::Router` over the dispatcher, integration
//! store, scheduler, context mapper, and webhook ingestor, all reached
//! through `State<AppContext>` extractors per the teacher's
//! `agent::api::build_router` shape.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;
pub mod sweep;

use axum::routing::{delete, get, post, put};
use axum::Router;
use tower_http::trace::TraceLayer;

pub use state::AppContext;

pub fn build_router(ctx: AppContext) -> Router {
    Router::new()
        .route("/plugin-engine/intents", post(routes::intents::process_intent))
        .route("/plugin-engine/adapters", get(routes::adapters::list_adapters))
        .route(
            "/plugin-engine/integrations",
            get(routes::integrations::list_integrations),
        )
        .route(
            "/plugin-engine/integrations/:tool",
            delete(routes::integrations::disconnect_integration),
        )
        .route("/plugin-engine/tasks", get(routes::tasks::list_tasks))
        .route("/plugin-engine/tasks/:id", delete(routes::tasks::cancel_task))
        .route("/plugin-engine/tasks/:id/retry", post(routes::tasks::retry_task))
        .route(
            "/plugin-engine/context-mappings",
            get(routes::context_mappings::list_mappings)
                .post(routes::context_mappings::upsert_mapping)
                .delete(routes::context_mappings::delete_mapping),
        )
        .route(
            "/plugin-engine/context-mappings/:id",
            put(routes::context_mappings::update_mapping),
        )
        .route(
            "/plugin-engine/context-mappings/bulk",
            post(routes::context_mappings::bulk_upsert_mappings)
                .delete(routes::context_mappings::bulk_delete_mappings),
        )
        .route(
            "/plugin-engine/context-mappings/lookup",
            get(routes::context_mappings::lookup_mapping),
        )
        .route("/plugin-engine/cron", post(routes::cron::run_cron))
        .route("/plugin-engine/webhooks/slack", post(routes::webhooks::slack_webhook))
        .route("/plugin-engine/webhooks/gmail", post(routes::webhooks::gmail_webhook))
        .route("/plugin-engine/webhooks/asana", post(routes::webhooks::asana_webhook))
        .route(
            "/plugin-engine/webhooks/refresh",
            post(routes::webhooks::renew_subscriptions),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}
