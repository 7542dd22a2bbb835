use thiserror::Error;

use crate::domain::entities::payment_method::PaymentMethod;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found")]
    NotFound,

    #[error("Unauthorized")]
    Unauthorized,

    /// Provider rejected the request (network, auth or business rule).
    #[error("Gateway error: {0}")]
    Gateway(String),

    /// Provider call timed out; the charge may or may not exist upstream.
    #[error("Gateway timeout: outcome unknown")]
    GatewayTimeout,

    #[error("Gateway does not support payment method {0}")]
    UnsupportedMethod(PaymentMethod),

    #[error("No active default payment gateway configured")]
    NoDefaultGateway,

    #[error("Payment gateway is inactive")]
    GatewayInactive,

    #[error("Invalid status transition: {0}")]
    InvalidTransition(String),

    #[error("Webhook processing failed: {0}")]
    WebhookProcessing(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Whether redelivering the same input may succeed later.
    ///
    /// Drives the webhook response: retryable failures answer 5xx so the
    /// provider redelivers, the rest answer 2xx and stay queryable for replay.
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::Database(_)
            | AppError::Internal(_)
            | AppError::Gateway(_)
            | AppError::GatewayTimeout => true,

            AppError::InvalidInput(_)
            | AppError::NotFound
            | AppError::Unauthorized
            | AppError::UnsupportedMethod(_)
            | AppError::NoDefaultGateway
            | AppError::GatewayInactive
            | AppError::InvalidTransition(_)
            | AppError::WebhookProcessing(_) => false,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub enum ErrorCode {
    DatabaseError,
    InvalidInput,
    NotFound,
    Unauthorized,
    GatewayError,
    GatewayTimeout,
    UnsupportedMethod,
    NoDefaultGateway,
    GatewayInactive,
    InvalidTransition,
    WebhookProcessingError,
    InternalError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::DatabaseError => "DATABASE_ERROR",
            ErrorCode::InvalidInput => "INVALID_INPUT",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::Unauthorized => "UNAUTHORIZED",
            ErrorCode::GatewayError => "GATEWAY_ERROR",
            ErrorCode::GatewayTimeout => "GATEWAY_TIMEOUT",
            ErrorCode::UnsupportedMethod => "UNSUPPORTED_METHOD",
            ErrorCode::NoDefaultGateway => "NO_DEFAULT_GATEWAY",
            ErrorCode::GatewayInactive => "GATEWAY_INACTIVE",
            ErrorCode::InvalidTransition => "INVALID_TRANSITION",
            ErrorCode::WebhookProcessingError => "WEBHOOK_PROCESSING_ERROR",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        }
    }
}

impl From<&AppError> for ErrorCode {
    fn from(err: &AppError) -> Self {
        match err {
            AppError::Database(_) => ErrorCode::DatabaseError,
            AppError::InvalidInput(_) => ErrorCode::InvalidInput,
            AppError::NotFound => ErrorCode::NotFound,
            AppError::Unauthorized => ErrorCode::Unauthorized,
            AppError::Gateway(_) => ErrorCode::GatewayError,
            AppError::GatewayTimeout => ErrorCode::GatewayTimeout,
            AppError::UnsupportedMethod(_) => ErrorCode::UnsupportedMethod,
            AppError::NoDefaultGateway => ErrorCode::NoDefaultGateway,
            AppError::GatewayInactive => ErrorCode::GatewayInactive,
            AppError::InvalidTransition(_) => ErrorCode::InvalidTransition,
            AppError::WebhookProcessing(_) => ErrorCode::WebhookProcessingError,
            AppError::Internal(_) => ErrorCode::InternalError,
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
