use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    adapters::http::app_state::AppState,
    app_error::AppResult,
    domain::entities::{
        gateway_environment::GatewayEnvironment, gateway_provider::GatewayProvider,
        money::FeeModel, payment_method::PaymentMethod,
    },
    use_cases::gateway_registry::{GatewayCredentials, GatewayInput},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_gateways))
        .route("/", post(create_gateway))
        .route("/{gateway_id}", put(update_gateway))
        .route("/{gateway_id}/default", post(set_default))
}

#[derive(Deserialize)]
struct GatewayPayload {
    name: String,
    provider: GatewayProvider,
    #[serde(default)]
    environment: GatewayEnvironment,
    #[serde(default)]
    credentials: Option<GatewayCredentials>,
    supported_methods: Vec<PaymentMethod>,
    #[serde(default)]
    fee_percent_bps: i64,
    #[serde(default)]
    fee_fixed_cents: i64,
    #[serde(default = "default_true")]
    is_active: bool,
    #[serde(default)]
    is_default: bool,
}

fn default_true() -> bool {
    true
}

impl From<GatewayPayload> for GatewayInput {
    fn from(payload: GatewayPayload) -> Self {
        GatewayInput {
            name: payload.name,
            provider: payload.provider,
            environment: payload.environment,
            credentials: payload.credentials,
            supported_methods: payload.supported_methods,
            fee_model: FeeModel::new(payload.fee_percent_bps, payload.fee_fixed_cents),
            is_active: payload.is_active,
            is_default: payload.is_default,
        }
    }
}

async fn list_gateways(State(app_state): State<AppState>) -> AppResult<impl IntoResponse> {
    let gateways = app_state.registry.list().await?;
    Ok(Json(gateways))
}

async fn create_gateway(
    State(app_state): State<AppState>,
    Json(payload): Json<GatewayPayload>,
) -> AppResult<impl IntoResponse> {
    let gateway = app_state.registry.create_gateway(payload.into()).await?;
    Ok((StatusCode::CREATED, Json(gateway)))
}

/// Omitting `credentials` keeps the stored ones.
async fn update_gateway(
    State(app_state): State<AppState>,
    Path(gateway_id): Path<Uuid>,
    Json(payload): Json<GatewayPayload>,
) -> AppResult<impl IntoResponse> {
    let gateway = app_state
        .registry
        .update_gateway(gateway_id, payload.into())
        .await?;
    Ok(Json(gateway))
}

async fn set_default(
    State(app_state): State<AppState>,
    Path(gateway_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let gateway = app_state.registry.set_default(gateway_id).await?;
    Ok(Json(gateway))
}
