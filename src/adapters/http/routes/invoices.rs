use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    adapters::http::app_state::AppState,
    app_error::AppResult,
    domain::entities::payment_method::PaymentMethod,
    use_cases::gateway_service::PaymentOptions,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{invoice_id}", get(get_invoice))
        .route("/{invoice_id}/payments", get(list_payments))
        .route("/{invoice_id}/payments", post(create_payment))
        .route("/{invoice_id}/mark-paid", post(mark_paid))
        .route("/{invoice_id}/cancel", post(cancel_invoice))
}

#[derive(Deserialize)]
struct CreatePaymentPayload {
    method: PaymentMethod,
    #[serde(default)]
    gateway_id: Option<Uuid>,
    #[serde(default)]
    card_token: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

async fn get_invoice(
    State(app_state): State<AppState>,
    Path(invoice_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let invoice = app_state.invoices.get(invoice_id).await?;
    Ok(Json(invoice))
}

async fn list_payments(
    State(app_state): State<AppState>,
    Path(invoice_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    // 404 for unknown invoices rather than an empty list
    app_state.invoices.get(invoice_id).await?;
    let payments = app_state.orchestrator.list_payments(invoice_id).await?;
    Ok(Json(payments))
}

async fn create_payment(
    State(app_state): State<AppState>,
    Path(invoice_id): Path<Uuid>,
    Json(payload): Json<CreatePaymentPayload>,
) -> AppResult<impl IntoResponse> {
    let options = PaymentOptions {
        card_token: payload.card_token,
        description: payload.description,
    };
    let payment = app_state
        .orchestrator
        .create_payment(invoice_id, payload.method, payload.gateway_id, options)
        .await?;
    Ok((StatusCode::CREATED, Json(payment)))
}

async fn mark_paid(
    State(app_state): State<AppState>,
    Path(invoice_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let invoice = app_state.invoices.mark_paid_manually(invoice_id).await?;
    Ok(Json(invoice))
}

async fn cancel_invoice(
    State(app_state): State<AppState>,
    Path(invoice_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let invoice = app_state.invoices.cancel(invoice_id).await?;
    Ok(Json(invoice))
}
