use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;

use crate::{
    app_error::{AppError, AppResult},
    application::ports::notifications::{EmailMessage, EmailSender, NotificationPriority},
    infra::http_client::request_error,
};

const RESEND_API_URL: &str = "https://api.resend.com/emails";

/// Email delivery through the Resend HTTP API.
#[derive(Clone)]
pub struct ResendEmailSender {
    client: Client,
    api_key: SecretString,
    from: String,
}

impl ResendEmailSender {
    pub fn new(client: Client, api_key: SecretString, from: String) -> Self {
        Self {
            client,
            api_key,
            from,
        }
    }
}

#[derive(Serialize)]
struct ResendReq<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    html: &'a str,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    headers: HashMap<&'static str, &'static str>,
}

fn resend_request<'a>(from: &'a str, message: &'a EmailMessage) -> ResendReq<'a> {
    let mut headers = HashMap::new();
    if message.priority == NotificationPriority::High {
        headers.insert("X-Priority", "1");
        headers.insert("Importance", "high");
    }
    ResendReq {
        from,
        to: [message.to.as_str()],
        subject: &message.subject,
        html: &message.html,
        headers,
    }
}

#[async_trait]
impl EmailSender for ResendEmailSender {
    async fn send(&self, message: &EmailMessage) -> AppResult<()> {
        let body = resend_request(&self.from, message);
        let response = self
            .client
            .post(RESEND_API_URL)
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| request_error("Resend", e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %text, "Resend API error");
            return Err(AppError::Internal(format!("Resend API error: {status}")));
        }

        tracing::debug!(subject = %message.subject, "Email sent");
        Ok(())
    }
}
