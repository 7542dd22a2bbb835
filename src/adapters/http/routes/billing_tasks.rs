use axum::{
    Json, Router,
    extract::{Path, State},
    response::IntoResponse,
    routing::post,
};
use chrono::Utc;
use serde_json::json;
use tracing::info;

use crate::{
    adapters::http::app_state::AppState,
    app_error::{AppError, AppResult},
    use_cases::billing_automation::BillingTask,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/tasks/{task}/run", post(run_task))
}

/// Runs one scheduled task on demand, outside the scheduler's cadence.
async fn run_task(
    State(app_state): State<AppState>,
    Path(task): Path<String>,
) -> AppResult<impl IntoResponse> {
    let task = task
        .parse::<BillingTask>()
        .map_err(|_| AppError::InvalidInput(format!("unknown billing task: {task}")))?;

    info!(task = %task, "Billing task triggered manually");
    let report = app_state.billing.run_task(task, Utc::now()).await?;
    Ok(Json(json!({ "task": task, "report": report })))
}
