//! Outbound HTTP client factory.
//!
//! Provider adapters, the email sender and the messaging sender all share one
//! client built here, so every outbound call is bounded by the same connect
//! and request timeouts.

use reqwest::Client;
use std::time::Duration;

use crate::app_error::AppError;

/// TCP handshake + TLS.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Total request/response time, used when no override is configured.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Build a client whose requests fail with a timeout error after `request_timeout`.
pub fn build_client(request_timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .connect_timeout(DEFAULT_CONNECT_TIMEOUT.min(request_timeout))
        .timeout(request_timeout)
        .build()
}

/// Classify a failed outbound call. A timeout leaves the remote outcome
/// unknown; anything else is a plain provider failure.
pub fn request_error(service: &str, err: reqwest::Error) -> AppError {
    if err.is_timeout() {
        tracing::warn!(service = %service, error = %err, "Outbound request timed out");
        AppError::GatewayTimeout
    } else {
        tracing::error!(service = %service, error = %err, "Outbound request failed");
        AppError::Gateway(format!("{service} request failed: {err}"))
    }
}
