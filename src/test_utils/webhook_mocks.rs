//! In-memory webhook event store and recording notification senders.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::{
    Mutex,
    atomic::{AtomicBool, Ordering},
};
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::ports::notifications::{EmailMessage, EmailSender, MessagingSender},
    domain::entities::webhook::{WebhookStatus, WebhookStep},
    use_cases::webhook_ingestion::{NewWebhookEvent, WebhookEventProfile, WebhookEventRepoTrait},
};

// ============================================================================
// InMemoryWebhookEventRepo
// ============================================================================

#[derive(Default)]
pub struct InMemoryWebhookEventRepo {
    pub events: Mutex<Vec<WebhookEventProfile>>,
    fail_inserts: AtomicBool,
}

impl InMemoryWebhookEventRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> Vec<WebhookEventProfile> {
        self.events.lock().unwrap().clone()
    }

    pub fn get(&self, id: Uuid) -> Option<WebhookEventProfile> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .find(|e| e.id == id)
            .cloned()
    }

    /// Every later `create` fails with a database error.
    pub fn fail_inserts(&self) {
        self.fail_inserts.store(true, Ordering::SeqCst);
    }

    fn update(&self, id: Uuid, apply: impl FnOnce(&mut WebhookEventProfile)) -> AppResult<()> {
        let mut events = self.events.lock().unwrap();
        let event = events
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or(AppError::NotFound)?;
        apply(event);
        event.updated_at = Some(Utc::now());
        Ok(())
    }
}

#[async_trait]
impl WebhookEventRepoTrait for InMemoryWebhookEventRepo {
    async fn create(&self, event: &NewWebhookEvent) -> AppResult<WebhookEventProfile> {
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(AppError::Database("insert failed".into()));
        }
        let now = Utc::now();
        let profile = WebhookEventProfile {
            id: Uuid::new_v4(),
            gateway_id: event.gateway_id,
            provider_event_id: event.provider_event_id.clone(),
            event_type: event.event_type.clone(),
            payload: event.payload.clone(),
            payload_raw: event.payload_raw.clone(),
            status: WebhookStatus::Pending,
            attempts: 0,
            error_step: None,
            error_message: None,
            source_ip: event.source_ip.clone(),
            headers: event.headers.clone(),
            processed_at: None,
            created_at: Some(now),
            updated_at: Some(now),
        };
        self.events.lock().unwrap().push(profile.clone());
        Ok(profile)
    }

    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<WebhookEventProfile>> {
        Ok(self.get(id))
    }

    async fn find_processed(
        &self,
        gateway_id: Uuid,
        provider_event_id: &str,
        exclude_id: Uuid,
    ) -> AppResult<Option<WebhookEventProfile>> {
        Ok(self
            .events
            .lock()
            .unwrap()
            .iter()
            .find(|e| {
                e.id != exclude_id
                    && e.gateway_id == gateway_id
                    && e.status == WebhookStatus::Processed
                    && e.provider_event_id.as_deref() == Some(provider_event_id)
            })
            .cloned())
    }

    async fn begin_attempt(&self, id: Uuid) -> AppResult<i32> {
        let mut attempts = 0;
        self.update(id, |e| {
            e.attempts += 1;
            attempts = e.attempts;
        })?;
        Ok(attempts)
    }

    async fn mark_processed(&self, id: Uuid, note: Option<&str>) -> AppResult<()> {
        self.update(id, |e| {
            e.status = WebhookStatus::Processed;
            e.error_step = None;
            e.error_message = note.map(str::to_string);
            e.processed_at = Some(Utc::now());
        })
    }

    async fn mark_failed(&self, id: Uuid, step: WebhookStep, message: &str) -> AppResult<()> {
        self.update(id, |e| {
            e.status = WebhookStatus::Failed;
            e.error_step = Some(step.as_str().to_string());
            e.error_message = Some(message.to_string());
        })
    }

    async fn list_by_status(
        &self,
        status: WebhookStatus,
        limit: i64,
    ) -> AppResult<Vec<WebhookEventProfile>> {
        Ok(self
            .events
            .lock()
            .unwrap()
            .iter()
            .rev()
            .filter(|e| e.status == status)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }
}

// ============================================================================
// Notification senders
// ============================================================================

#[derive(Default)]
pub struct InMemoryEmailSender {
    sent: Mutex<Vec<EmailMessage>>,
    fail_next: AtomicBool,
}

impl InMemoryEmailSender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().unwrap().clone()
    }

    /// The next send fails and records nothing.
    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl EmailSender for InMemoryEmailSender {
    async fn send(&self, message: &EmailMessage) -> AppResult<()> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(AppError::Internal("email provider unavailable".into()));
        }
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryMessagingSender {
    sent: Mutex<Vec<(String, String)>>,
    fail_all: AtomicBool,
}

impl InMemoryMessagingSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// `(phone, text)` pairs in send order.
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn fail_all(&self) {
        self.fail_all.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl MessagingSender for InMemoryMessagingSender {
    async fn send_text(&self, phone: &str, text: &str) -> AppResult<()> {
        if self.fail_all.load(Ordering::SeqCst) {
            return Err(AppError::Internal("messaging provider unavailable".into()));
        }
        self.sent
            .lock()
            .unwrap()
            .push((phone.to_string(), text.to_string()));
        Ok(())
    }
}
