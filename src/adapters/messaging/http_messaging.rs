use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use url::Url;

use crate::{
    app_error::{AppError, AppResult},
    application::ports::notifications::MessagingSender,
    infra::http_client::request_error,
};

/// SMS/WhatsApp relay reached over a single JSON endpoint.
#[derive(Clone)]
pub struct HttpMessagingSender {
    client: Client,
    endpoint: Url,
    token: SecretString,
}

impl HttpMessagingSender {
    pub fn new(client: Client, endpoint: Url, token: SecretString) -> Self {
        Self {
            client,
            endpoint,
            token,
        }
    }
}

#[derive(Debug, Serialize)]
struct OutboundText<'a> {
    to: String,
    text: &'a str,
}

/// Keep the leading `+` and digits only.
fn normalize_phone(phone: &str) -> String {
    let trimmed = phone.trim();
    let digits: String = trimmed.chars().filter(char::is_ascii_digit).collect();
    if trimmed.starts_with('+') {
        format!("+{digits}")
    } else {
        digits
    }
}

#[async_trait]
impl MessagingSender for HttpMessagingSender {
    async fn send_text(&self, phone: &str, text: &str) -> AppResult<()> {
        let to = normalize_phone(phone);
        if to.trim_start_matches('+').is_empty() {
            return Err(AppError::InvalidInput(format!("invalid phone number: {phone}")));
        }

        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(self.token.expose_secret())
            .json(&OutboundText { to, text })
            .send()
            .await
            .map_err(|e| request_error("Messaging", e))?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(status = %status, "Messaging relay rejected message");
            return Err(AppError::Internal(format!("Messaging relay error: {status}")));
        }
        Ok(())
    }
}
