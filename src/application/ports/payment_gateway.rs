use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::{
    app_error::AppResult,
    domain::entities::{
        gateway_environment::GatewayEnvironment, gateway_provider::GatewayProvider,
        payment_method::PaymentMethod, payment_status::PaymentStatus,
    },
};

// ============================================================================
// Port Types - Provider-agnostic domain types
// ============================================================================

/// Customer record id on the provider side
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProviderCustomerId(pub String);

impl ProviderCustomerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ProviderCustomerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Billing contact data sent when registering a tenant with a provider
#[derive(Debug, Clone)]
pub struct CustomerData {
    pub tenant_id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    /// CPF/CNPJ, required by Brazilian providers for boleto
    pub tax_id: Option<String>,
}

/// A charge to be created at the provider
#[derive(Debug, Clone)]
pub struct ChargeRequest {
    pub customer: ProviderCustomerId,
    pub method: PaymentMethod,
    pub amount_cents: i64,
    pub due_date: NaiveDate,
    pub description: String,
    /// Our invoice id, echoed back by providers that support it
    pub external_reference: String,
    /// Deterministic key so a retried request cannot create a second charge
    pub idempotency_key: String,
    pub payer_email: String,
    /// Tokenized card for credit card charges
    pub card_token: Option<String>,
}

/// Result of creating a charge
#[derive(Debug, Clone, Default)]
pub struct ChargeResult {
    pub transaction_id: String,
    pub state: Option<ChargeState>,
    pub boleto_url: Option<String>,
    pub boleto_barcode: Option<String>,
    pub boleto_digit_line: Option<String>,
    /// Base64 PNG of the PIX QR code
    pub pix_qr_code_image: Option<String>,
    /// PIX copy-and-paste payload
    pub pix_payload: Option<String>,
    pub pix_expires_at: Option<DateTime<Utc>>,
    pub raw: JsonValue,
}

/// Provider state translated into the engine's vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChargeState {
    Status(PaymentStatus),
    /// Charge passed its due date; the invoice goes overdue, the payment is untouched
    Overdue,
    /// Charge deleted at the provider: refunded when settled, cancelled otherwise
    Removed,
}

#[derive(Debug, Clone)]
pub struct ChargeStatusReport {
    pub state: ChargeState,
    pub raw: JsonValue,
}

/// Identifiers extracted from an inbound provider callback.
/// Everything else in the body is stored verbatim and treated as opaque.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WebhookFields {
    pub event_id: Option<String>,
    pub event_type: Option<String>,
    pub transaction_id: Option<String>,
}

/// Lower-cased request headers of a webhook delivery
pub type WebhookHeaders = HashMap<String, String>;

// ============================================================================
// Payment Gateway Port
// ============================================================================

/// One implementation per provider. Implementations are stateless apart from
/// the gateway configuration they were built with.
#[async_trait]
pub trait PaymentGatewayPort: Send + Sync {
    fn provider(&self) -> GatewayProvider;

    fn environment(&self) -> GatewayEnvironment;

    /// Register the tenant with the provider and return its customer id.
    async fn create_customer(&self, customer: &CustomerData) -> AppResult<ProviderCustomerId>;

    /// Create a charge.
    ///
    /// # Errors
    /// - `GatewayTimeout` when the provider did not answer in time; the charge
    ///   may exist, so callers retry with the same idempotency key
    /// - `Gateway` when the provider rejected the request
    async fn create_charge(&self, request: &ChargeRequest) -> AppResult<ChargeResult>;

    async fn fetch_charge_status(&self, transaction_id: &str) -> AppResult<ChargeStatusReport>;

    /// Cancel an unsettled charge; returns the raw provider response.
    async fn cancel_charge(&self, transaction_id: &str) -> AppResult<JsonValue>;

    /// Refund a settled charge; returns the raw provider response.
    async fn refund_charge(&self, transaction_id: &str) -> AppResult<JsonValue>;

    /// Extract event id, type and referenced transaction id from a callback body.
    fn parse_webhook(&self, payload: &JsonValue) -> AppResult<WebhookFields>;

    /// Translate a parsed callback into a charge state.
    /// `None` means the event type does not affect payment state.
    async fn interpret_webhook(
        &self,
        fields: &WebhookFields,
        payload: &JsonValue,
    ) -> AppResult<Option<ChargeState>>;

    /// Check that the delivery came from the provider. Providers without a
    /// configured secret accept every delivery.
    fn verify_webhook(&self, _headers: &WebhookHeaders, _raw_body: &[u8]) -> AppResult<()> {
        Ok(())
    }
}
