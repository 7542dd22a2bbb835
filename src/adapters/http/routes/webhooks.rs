use axum::{
    Json, Router,
    body::to_bytes,
    extract::{Path, Query, Request, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::{
    adapters::http::{app_error_impl::error_resp, app_state::AppState, middleware::client_ip},
    app_error::{AppError, AppResult, ErrorCode},
    application::ports::payment_gateway::WebhookHeaders,
    domain::entities::webhook::{WebhookStatus, WebhookStep},
    use_cases::webhook_ingestion::{InboundWebhook, IngestionResult},
};

/// Provider payloads are small; anything larger is not a webhook.
const MAX_WEBHOOK_BODY_BYTES: usize = 256 * 1024;

/// Public provider callbacks.
pub fn router() -> Router<AppState> {
    Router::new().route("/webhooks/{provider}", post(receive))
}

/// Operator views over stored events.
pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/webhooks/events", get(list_events))
        .route("/webhooks/events/{event_id}/replay", post(replay_event))
}

async fn receive(
    State(app_state): State<AppState>,
    Path(provider): Path<String>,
    request: Request,
) -> Response {
    let headers: WebhookHeaders = request
        .headers()
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|value| (name.as_str().to_ascii_lowercase(), value.to_string()))
        })
        .collect();
    let source_ip = client_ip(
        request.headers(),
        request.extensions(),
        app_state.config.trust_proxy,
    );

    let body = match to_bytes(request.into_body(), MAX_WEBHOOK_BODY_BYTES).await {
        Ok(bytes) => bytes.to_vec(),
        Err(err) => {
            tracing::warn!(provider = %provider, error = %err, "Unreadable webhook body");
            return error_resp(
                StatusCode::BAD_REQUEST,
                ErrorCode::InvalidInput,
                Some("unreadable body".into()),
            );
        }
    };

    let result = app_state
        .webhooks
        .ingest(InboundWebhook {
            provider,
            body,
            headers,
            source_ip,
        })
        .await;
    ingestion_response(result)
}

/// Providers retry on non-2xx, so only failures a retry can fix get a 5xx.
/// Bad payloads and failed verification are acknowledged with `processed: false`.
fn ingestion_response(result: IngestionResult) -> Response {
    match result {
        IngestionResult::GatewayNotFound => {
            error_resp(StatusCode::NOT_FOUND, ErrorCode::NotFound, None)
        }
        IngestionResult::Duplicate { event_id, .. } => Json(json!({
            "received": true,
            "processed": true,
            "duplicate": true,
            "event_id": event_id,
        }))
        .into_response(),
        IngestionResult::Processed { event_id, .. } => Json(json!({
            "received": true,
            "processed": true,
            "event_id": event_id,
        }))
        .into_response(),
        IngestionResult::Failed {
            event_id,
            step,
            error,
        } => {
            let status = if step == WebhookStep::Persist || error.is_retryable() {
                StatusCode::INTERNAL_SERVER_ERROR
            } else {
                StatusCode::OK
            };
            let body = json!({
                "received": event_id.is_some(),
                "processed": false,
                "event_id": event_id,
                "step": step,
                "message": AppError::WebhookProcessing(error.to_string()).to_string(),
            });
            (status, Json(body)).into_response()
        }
    }
}

#[derive(Deserialize)]
struct ListEventsQuery {
    #[serde(default = "default_status")]
    status: WebhookStatus,
    #[serde(default = "default_limit")]
    limit: i64,
}

fn default_status() -> WebhookStatus {
    WebhookStatus::Failed
}

fn default_limit() -> i64 {
    50
}

async fn list_events(
    State(app_state): State<AppState>,
    Query(query): Query<ListEventsQuery>,
) -> AppResult<impl IntoResponse> {
    let events = app_state.webhooks.list_events(query.status, query.limit).await?;
    Ok(Json(events))
}

async fn replay_event(
    State(app_state): State<AppState>,
    Path(event_id): Path<Uuid>,
) -> AppResult<Response> {
    let result = app_state.webhooks.replay(event_id).await?;
    Ok(ingestion_response(result))
}
