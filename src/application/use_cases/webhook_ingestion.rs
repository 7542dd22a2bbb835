use std::sync::Arc;

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use serde_json::Value as JsonValue;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::ports::payment_gateway::{WebhookFields, WebhookHeaders},
    domain::entities::{
        gateway_provider::GatewayProvider,
        webhook::{WebhookStatus, WebhookStep},
    },
};

use super::{
    gateway_registry::{GatewayRegistry, PaymentGatewayProfile},
    gateway_service::WebhookOutcome,
    payment_orchestrator::PaymentOrchestrator,
};

/// Headers whose values are credentials and never reach storage.
const REDACTED_HEADERS: &[&str] = &["asaas-access-token", "authorization", "cookie"];

fn serialize_base64<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&STANDARD.encode(bytes))
}

// ============================================================================
// Profile Types
// ============================================================================

/// Stored provider callback. Written before any processing and never deleted.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookEventProfile {
    pub id: Uuid,
    pub gateway_id: Uuid,
    pub provider_event_id: Option<String>,
    pub event_type: Option<String>,
    pub payload: JsonValue,
    /// Body bytes exactly as received, base64 in JSON views.
    #[serde(serialize_with = "serialize_base64")]
    pub payload_raw: Vec<u8>,
    pub status: WebhookStatus,
    pub attempts: i32,
    pub error_step: Option<String>,
    pub error_message: Option<String>,
    pub source_ip: Option<String>,
    pub headers: JsonValue,
    pub processed_at: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewWebhookEvent {
    pub gateway_id: Uuid,
    pub provider_event_id: Option<String>,
    pub event_type: Option<String>,
    pub payload: JsonValue,
    pub payload_raw: Vec<u8>,
    pub source_ip: Option<String>,
    pub headers: JsonValue,
}

// ============================================================================
// Repository Trait
// ============================================================================

#[async_trait]
pub trait WebhookEventRepoTrait: Send + Sync {
    async fn create(&self, event: &NewWebhookEvent) -> AppResult<WebhookEventProfile>;

    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<WebhookEventProfile>>;

    /// A `processed` event for the same `(gateway, provider event id)`, other than `exclude_id`.
    async fn find_processed(
        &self,
        gateway_id: Uuid,
        provider_event_id: &str,
        exclude_id: Uuid,
    ) -> AppResult<Option<WebhookEventProfile>>;

    /// Increment the attempt counter and return the new value.
    async fn begin_attempt(&self, id: Uuid) -> AppResult<i32>;

    async fn mark_processed(&self, id: Uuid, note: Option<&str>) -> AppResult<()>;

    async fn mark_failed(&self, id: Uuid, step: WebhookStep, message: &str) -> AppResult<()>;

    async fn list_by_status(
        &self,
        status: WebhookStatus,
        limit: i64,
    ) -> AppResult<Vec<WebhookEventProfile>>;
}

// ============================================================================
// Pipeline
// ============================================================================

/// One HTTP delivery as received.
#[derive(Debug, Clone)]
pub struct InboundWebhook {
    /// Path segment naming the provider, e.g. `asaas`.
    pub provider: String,
    pub body: Vec<u8>,
    /// Lower-cased header names.
    pub headers: WebhookHeaders,
    pub source_ip: Option<String>,
}

#[derive(Debug)]
pub enum IngestionResult {
    /// No active gateway for the provider; nothing was stored.
    GatewayNotFound,
    Processed {
        event_id: Uuid,
        outcome: WebhookOutcome,
    },
    Duplicate {
        event_id: Uuid,
        original_event_id: Uuid,
    },
    Failed {
        /// `None` when the event could not be stored.
        event_id: Option<Uuid>,
        step: WebhookStep,
        error: AppError,
    },
}

#[derive(Clone)]
pub struct WebhookIngestion {
    registry: Arc<GatewayRegistry>,
    orchestrator: PaymentOrchestrator,
    events: Arc<dyn WebhookEventRepoTrait>,
}

impl WebhookIngestion {
    pub fn new(
        registry: Arc<GatewayRegistry>,
        orchestrator: PaymentOrchestrator,
        events: Arc<dyn WebhookEventRepoTrait>,
    ) -> Self {
        Self {
            registry,
            orchestrator,
            events,
        }
    }

    /// Resolve, persist, verify, short-circuit duplicates, process, record.
    pub async fn ingest(&self, inbound: InboundWebhook) -> IngestionResult {
        let Ok(provider) = inbound.provider.parse::<GatewayProvider>() else {
            warn!(provider = %inbound.provider, "Webhook for unknown provider");
            return IngestionResult::GatewayNotFound;
        };

        let gateway = match self.registry.active_for_provider(provider).await {
            Ok(Some(gateway)) => gateway,
            Ok(None) => {
                warn!(provider = %provider, "Webhook for provider without active gateway");
                return IngestionResult::GatewayNotFound;
            }
            Err(err) => {
                error!(provider = %provider, error = %err, "Failed to resolve webhook gateway");
                return IngestionResult::Failed {
                    event_id: None,
                    step: WebhookStep::Resolve,
                    error: err,
                };
            }
        };

        let payload = serde_json::from_slice::<JsonValue>(&inbound.body)
            .unwrap_or_else(|_| JsonValue::String(String::from_utf8_lossy(&inbound.body).into_owned()));

        let port = self.registry.port_for(&gateway);
        let fields = port
            .as_ref()
            .ok()
            .and_then(|port| port.parse_webhook(&payload).ok())
            .unwrap_or_else(WebhookFields::default);

        let event = match self
            .events
            .create(&NewWebhookEvent {
                gateway_id: gateway.id,
                provider_event_id: fields.event_id.clone(),
                event_type: fields.event_type.clone(),
                payload,
                payload_raw: inbound.body.clone(),
                source_ip: inbound.source_ip.clone(),
                headers: redacted_headers(&inbound.headers),
            })
            .await
        {
            Ok(event) => event,
            Err(err) => {
                error!(
                    gateway_id = %gateway.id,
                    provider_event_id = ?fields.event_id,
                    error = %err,
                    "Failed to persist webhook event"
                );
                return IngestionResult::Failed {
                    event_id: None,
                    step: WebhookStep::Persist,
                    error: err,
                };
            }
        };

        info!(
            event_id = %event.id,
            gateway_id = %gateway.id,
            provider = %provider,
            provider_event_id = ?event.provider_event_id,
            event_type = ?event.event_type,
            "Webhook event stored"
        );

        let port = match port {
            Ok(port) => port,
            Err(err) => return self.fail(&event, WebhookStep::Process, err).await,
        };
        if let Err(err) = port.verify_webhook(&inbound.headers, &inbound.body) {
            return self.fail(&event, WebhookStep::Verify, err).await;
        }

        if let Some(result) = self.short_circuit_duplicate(&event).await {
            return result;
        }

        self.process(&event, &gateway).await
    }

    /// Re-run processing for a stored `pending` or `failed` event.
    /// Authenticity was checked on receipt, so verification is skipped.
    pub async fn replay(&self, event_id: Uuid) -> AppResult<IngestionResult> {
        let event = self
            .events
            .get_by_id(event_id)
            .await?
            .ok_or(AppError::NotFound)?;
        if !event.status.is_replayable() {
            return Err(AppError::InvalidInput(format!(
                "webhook event is already {}",
                event.status
            )));
        }

        let gateway = self.registry.get(event.gateway_id).await?;
        info!(event_id = %event.id, attempts = event.attempts, "Replaying webhook event");

        if let Some(result) = self.short_circuit_duplicate(&event).await {
            return Ok(result);
        }
        Ok(self.process(&event, &gateway).await)
    }

    pub async fn list_events(
        &self,
        status: WebhookStatus,
        limit: i64,
    ) -> AppResult<Vec<WebhookEventProfile>> {
        self.events.list_by_status(status, limit.clamp(1, 500)).await
    }

    async fn process(
        &self,
        event: &WebhookEventProfile,
        gateway: &PaymentGatewayProfile,
    ) -> IngestionResult {
        if let Err(err) = self.events.begin_attempt(event.id).await {
            return self.fail(event, WebhookStep::Process, err).await;
        }

        match self.orchestrator.process_webhook(gateway, &event.payload).await {
            Ok(outcome) => {
                let note = match &outcome {
                    WebhookOutcome::Ignored(reason) => Some(*reason),
                    WebhookOutcome::Applied | WebhookOutcome::NoOp => None,
                };
                if let Err(err) = self.events.mark_processed(event.id, note).await {
                    // State change is already committed; the row stays pending for replay
                    error!(event_id = %event.id, error = %err, "Failed to mark webhook processed");
                    return IngestionResult::Failed {
                        event_id: Some(event.id),
                        step: WebhookStep::Process,
                        error: err,
                    };
                }
                info!(event_id = %event.id, outcome = ?outcome, "Webhook event processed");
                IngestionResult::Processed {
                    event_id: event.id,
                    outcome,
                }
            }
            Err(err) => self.fail(event, WebhookStep::Process, err).await,
        }
    }

    async fn short_circuit_duplicate(&self, event: &WebhookEventProfile) -> Option<IngestionResult> {
        let provider_event_id = event.provider_event_id.as_deref()?;

        match self
            .events
            .find_processed(event.gateway_id, provider_event_id, event.id)
            .await
        {
            Ok(Some(original)) => {
                let note = format!("duplicate of {}", original.id);
                if let Err(err) = self.events.mark_processed(event.id, Some(&note)).await {
                    warn!(event_id = %event.id, error = %err, "Failed to mark duplicate webhook");
                }
                info!(
                    event_id = %event.id,
                    original_event_id = %original.id,
                    provider_event_id = %provider_event_id,
                    "Duplicate webhook delivery skipped"
                );
                Some(IngestionResult::Duplicate {
                    event_id: event.id,
                    original_event_id: original.id,
                })
            }
            Ok(None) => None,
            Err(err) => Some(self.fail(event, WebhookStep::Process, err).await),
        }
    }

    async fn fail(
        &self,
        event: &WebhookEventProfile,
        step: WebhookStep,
        err: AppError,
    ) -> IngestionResult {
        warn!(
            event_id = %event.id,
            step = step.as_str(),
            retryable = err.is_retryable(),
            error = %err,
            "Webhook processing failed"
        );
        let message = AppError::WebhookProcessing(err.to_string()).to_string();
        if let Err(mark_err) = self.events.mark_failed(event.id, step, &message).await {
            error!(event_id = %event.id, error = %mark_err, "Failed to record webhook failure");
        }
        IngestionResult::Failed {
            event_id: Some(event.id),
            step,
            error: err,
        }
    }
}

fn redacted_headers(headers: &WebhookHeaders) -> JsonValue {
    let map = headers
        .iter()
        .map(|(name, value)| {
            let value = if REDACTED_HEADERS.contains(&name.as_str()) {
                "[redacted]".to_string()
            } else {
                value.clone()
            };
            (name.clone(), JsonValue::String(value))
        })
        .collect();
    JsonValue::Object(map)
}
