use crate::app_error::{AppError, ErrorCode};
use axum::Json;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Log the error before it gets converted into a status response.
        tracing::error!(error = ?self, "Request failed");

        let code = ErrorCode::from(&self);
        match self {
            AppError::Database(_) => error_resp(StatusCode::INTERNAL_SERVER_ERROR, code, None),
            AppError::InvalidInput(msg) => error_resp(StatusCode::BAD_REQUEST, code, Some(msg)),
            AppError::NotFound => error_resp(StatusCode::NOT_FOUND, code, None),
            AppError::Unauthorized => error_resp(StatusCode::UNAUTHORIZED, code, None),
            AppError::Gateway(msg) => error_resp(StatusCode::BAD_GATEWAY, code, Some(msg)),
            AppError::GatewayTimeout => error_resp(StatusCode::GATEWAY_TIMEOUT, code, None),
            AppError::UnsupportedMethod(method) => error_resp(
                StatusCode::UNPROCESSABLE_ENTITY,
                code,
                Some(format!("{} is not supported by this gateway", method.display_name())),
            ),
            AppError::NoDefaultGateway => error_resp(StatusCode::CONFLICT, code, None),
            AppError::GatewayInactive => error_resp(StatusCode::CONFLICT, code, None),
            AppError::InvalidTransition(msg) => error_resp(StatusCode::CONFLICT, code, Some(msg)),
            AppError::WebhookProcessing(msg) => {
                error_resp(StatusCode::UNPROCESSABLE_ENTITY, code, Some(msg))
            }
            AppError::Internal(_) => error_resp(StatusCode::INTERNAL_SERVER_ERROR, code, None),
        }
    }
}

pub(crate) fn error_resp(status: StatusCode, code: ErrorCode, message: Option<String>) -> Response {
    let body = match message {
        Some(msg) => serde_json::json!({ "code": code.as_str(), "message": msg }),
        None => serde_json::json!({ "code": code.as_str() }),
    };
    (status, Json(body)).into_response()
}
