use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde::Serialize;

use pe_webhooks::IngestOutcome;

use crate::error::ApiError;
use crate::state::AppContext;

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn outcome_response(outcome: IngestOutcome) -> Response {
    match outcome {
        IngestOutcome::Challenge(challenge) => challenge.into_response(),
        IngestOutcome::Acknowledged(event) => {
            (StatusCode::OK, Json(serde_json::json!({ "eventId": event.id.to_string() }))).into_response()
        }
    }
}

/// `POST /plugin-engine/webhooks/slack`.
pub async fn slack_webhook(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let secret = ctx
        .settings
        .webhooks
        .slack_signing_secret
        .as_deref()
        .ok_or_else(|| ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "slack signing secret not configured"))?;
    let timestamp = header(&headers, "x-slack-request-timestamp")
        .ok_or_else(|| ApiError::bad_request("missing X-Slack-Request-Timestamp"))?;
    let signature = header(&headers, "x-slack-signature")
        .ok_or_else(|| ApiError::bad_request("missing X-Slack-Signature"))?;

    let outcome = ctx
        .webhook_ingestor
        .ingest_slack(secret, timestamp, &body, signature)
        .await
        .map_err(|err| ApiError::bad_request(err.to_string()))?;
    Ok(outcome_response(outcome))
}

/// `POST /plugin-engine/webhooks/asana`.
pub async fn asana_webhook(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let hook_secret_header = header(&headers, "x-hook-secret");
    let signature_header = header(&headers, "x-hook-signature");
    let configured_secret = ctx.settings.webhooks.asana_webhook_secret.as_deref();

    let outcome = ctx
        .webhook_ingestor
        .ingest_asana(configured_secret, hook_secret_header, &body, signature_header)
        .await
        .map_err(|err| ApiError::bad_request(err.to_string()))?;
    Ok(outcome_response(outcome))
}

/// `POST /plugin-engine/webhooks/gmail`.
pub async fn gmail_webhook(
    State(ctx): State<AppContext>,
    Json(body): Json<serde_json::Value>,
) -> Result<Response, ApiError> {
    let outcome = ctx
        .webhook_ingestor
        .ingest_gmail(&body)
        .await
        .map_err(|err| ApiError::bad_request(err.to_string()))?;
    Ok(outcome_response(outcome))
}

#[derive(Serialize)]
pub struct RenewalResponse {
    renewed: usize,
}

/// `POST /plugin-engine/webhooks/refresh`, guarded by
/// `WEBHOOK_REFRESH_API_KEY` (§6).
pub async fn renew_subscriptions(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
) -> Result<Json<RenewalResponse>, ApiError> {
    let provided = header(&headers, "x-webhook-refresh-api-key").unwrap_or_default();
    if provided != ctx.settings.guards.webhook_refresh_api_key {
        return Err(ApiError::unauthorized("invalid webhook refresh api key"));
    }
    let renewed = ctx
        .renewal_sweeper
        .run_once(Utc::now())
        .await
        .map_err(ApiError::from)?;
    Ok(Json(RenewalResponse { renewed }))
}
