use axum::{
    Json, Router,
    extract::{Path, State},
    response::IntoResponse,
    routing::{get, post},
};
use serde_json::json;
use uuid::Uuid;

use crate::{adapters::http::app_state::AppState, app_error::AppResult};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{payment_id}", get(get_payment))
        .route("/{payment_id}/status", get(check_status))
        .route("/{payment_id}/cancel", post(cancel_payment))
}

async fn get_payment(
    State(app_state): State<AppState>,
    Path(payment_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let payment = app_state.orchestrator.get_payment(payment_id).await?;
    Ok(Json(payment))
}

/// Polls the provider before answering.
async fn check_status(
    State(app_state): State<AppState>,
    Path(payment_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let payment = app_state.orchestrator.check_payment_status(payment_id).await?;
    Ok(Json(payment))
}

async fn cancel_payment(
    State(app_state): State<AppState>,
    Path(payment_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let (cancelled, payment) = app_state.orchestrator.cancel_payment(payment_id).await?;
    Ok(Json(json!({ "cancelled": cancelled, "payment": payment })))
}
