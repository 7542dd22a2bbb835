use async_trait::async_trait;

use crate::app_error::AppResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NotificationPriority {
    #[default]
    Normal,
    High,
}

#[derive(Debug, Clone)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html: String,
    pub priority: NotificationPriority,
}

/// Primary notification channel. Required.
#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> AppResult<()>;
}

/// Optional SMS/WhatsApp channel. Failures here never block email delivery.
#[async_trait]
pub trait MessagingSender: Send + Sync {
    async fn send_text(&self, phone: &str, text: &str) -> AppResult<()>;
}
