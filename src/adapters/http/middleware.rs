use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, Extensions, header::AUTHORIZATION},
    middleware::Next,
    response::Response,
};
use secrecy::ExposeSecret;

use crate::{
    adapters::http::app_state::AppState, app_error::AppError,
    infra::webhook_signature::constant_time_eq,
};

/// Guards the internal billing routes with `Authorization: Bearer <ADMIN_API_TOKEN>`.
pub async fn require_admin_token(
    State(app_state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .ok_or(AppError::Unauthorized)?;

    if !constant_time_eq(token, app_state.config.admin_api_token.expose_secret()) {
        tracing::warn!(
            path = %request.uri().path(),
            "Rejected request with invalid admin token"
        );
        return Err(AppError::Unauthorized);
    }

    Ok(next.run(request).await)
}

/// Caller address for audit records. Forwarded headers are only trusted
/// when explicitly configured (behind a reverse proxy).
pub fn client_ip(headers: &HeaderMap, extensions: &Extensions, trust_proxy: bool) -> Option<String> {
    let connect_ip = extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string());

    if trust_proxy {
        forwarded_ip(headers).or(connect_ip)
    } else {
        connect_ip
    }
}

fn forwarded_ip(headers: &HeaderMap) -> Option<String> {
    // Extract IP from X-Forwarded-For or X-Real-IP headers
    let first_forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    if let Some(ip) = first_forwarded {
        return Some(ip.to_string());
    }

    headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
