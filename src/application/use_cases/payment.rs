use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::{
    app_error::AppResult,
    application::ports::payment_gateway::ProviderCustomerId,
    domain::entities::{
        gateway_environment::GatewayEnvironment, gateway_provider::GatewayProvider,
        payment_method::PaymentMethod, payment_status::PaymentStatus,
    },
};

use super::invoice::InvoiceProfile;

/// Deterministic provider idempotency key for a charge attempt.
///
/// Hashes invoice id, tenant id, method, invoice number, issue date and the
/// day of the request, so retries on the same day reuse the provider charge
/// while a new day produces a fresh one.
pub fn payment_idempotency_key(
    invoice: &InvoiceProfile,
    method: PaymentMethod,
    request_day: NaiveDate,
) -> String {
    let material = format!(
        "{}|{}|{}|{}|{}|{}",
        invoice.id, invoice.tenant_id, method, invoice.number, invoice.issue_date, request_day
    );
    hex::encode(Sha256::digest(material.as_bytes()))
}

// ============================================================================
// Profile Types
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct PaymentProfile {
    pub id: Uuid,
    pub payment_number: i64,
    pub invoice_id: Uuid,
    pub tenant_id: Uuid,
    pub gateway_id: Uuid,
    pub method: PaymentMethod,
    pub transaction_id: Option<String>,
    pub idempotency_key: String,
    pub amount_cents: i64,
    pub fee_cents: i64,
    pub net_amount_cents: i64,
    pub status: PaymentStatus,
    pub boleto_url: Option<String>,
    pub boleto_barcode: Option<String>,
    pub boleto_digit_line: Option<String>,
    pub pix_qr_code_image: Option<String>,
    pub pix_payload: Option<String>,
    pub pix_expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing)]
    pub raw_response: Option<JsonValue>,
    pub failure_reason: Option<String>,
    pub authorized_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub refunded_at: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl PaymentProfile {
    /// Set `status` and stamp the lifecycle timestamp that belongs to it.
    /// Callers check `can_transition_to` first.
    pub fn apply_status(&mut self, target: PaymentStatus, at: DateTime<Utc>) {
        self.status = target;
        let stamp = match target {
            PaymentStatus::Approved => &mut self.authorized_at,
            PaymentStatus::Completed => &mut self.completed_at,
            PaymentStatus::Failed => &mut self.failed_at,
            PaymentStatus::Cancelled => &mut self.cancelled_at,
            PaymentStatus::Refunded => &mut self.refunded_at,
            PaymentStatus::Pending | PaymentStatus::Processing | PaymentStatus::Chargeback => {
                self.updated_at = Some(at);
                return;
            }
        };
        stamp.get_or_insert(at);
        self.updated_at = Some(at);
    }
}

#[derive(Debug, Clone)]
pub struct NewPaymentInput {
    pub invoice_id: Uuid,
    pub tenant_id: Uuid,
    pub gateway_id: Uuid,
    pub method: PaymentMethod,
    pub idempotency_key: String,
    pub amount_cents: i64,
    pub fee_cents: i64,
    pub net_amount_cents: i64,
}

/// Provider data recorded once a charge exists upstream.
#[derive(Debug, Clone, Default)]
pub struct ChargeAttachment {
    pub transaction_id: String,
    pub boleto_url: Option<String>,
    pub boleto_barcode: Option<String>,
    pub boleto_digit_line: Option<String>,
    pub pix_qr_code_image: Option<String>,
    pub pix_payload: Option<String>,
    pub pix_expires_at: Option<DateTime<Utc>>,
    pub raw_response: JsonValue,
}

#[derive(Debug, Clone)]
pub struct PaymentTransition {
    pub target: PaymentStatus,
    pub raw_response: Option<JsonValue>,
    pub failure_reason: Option<String>,
    pub at: DateTime<Utc>,
}

impl PaymentTransition {
    pub fn to(target: PaymentStatus) -> Self {
        Self {
            target,
            raw_response: None,
            failure_reason: None,
            at: Utc::now(),
        }
    }

    pub fn with_raw(mut self, raw: JsonValue) -> Self {
        self.raw_response = Some(raw);
        self
    }

    pub fn with_failure(mut self, reason: impl Into<String>) -> Self {
        self.failure_reason = Some(reason.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionResult {
    Applied,
    /// Already in the target status; only the raw response was refreshed.
    Unchanged,
    /// Not allowed from the current status; nothing was written.
    Rejected,
}

#[derive(Debug, Clone)]
pub struct PaymentTransitionOutcome {
    pub payment: PaymentProfile,
    pub result: TransitionResult,
    /// The owning invoice moved to `paid` in the same transaction.
    pub invoice_paid: bool,
}

/// Result of [`PaymentRepoTrait::claim_pending`].
#[derive(Debug, Clone)]
pub enum PendingClaim {
    Created(PaymentProfile),
    Existing(PaymentProfile),
}

impl PendingClaim {
    pub fn into_payment(self) -> PaymentProfile {
        match self {
            Self::Created(payment) | Self::Existing(payment) => payment,
        }
    }
}

impl PaymentTransitionOutcome {
    pub fn is_applied(&self) -> bool {
        self.result == TransitionResult::Applied
    }
}

// ============================================================================
// Repository Traits
// ============================================================================

#[async_trait]
pub trait PaymentRepoTrait: Send + Sync {
    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<PaymentProfile>>;

    async fn get_by_transaction_id(
        &self,
        gateway_id: Uuid,
        transaction_id: &str,
    ) -> AppResult<Option<PaymentProfile>>;

    async fn list_by_invoice(&self, invoice_id: Uuid) -> AppResult<Vec<PaymentProfile>>;

    /// Atomic insert-or-reuse serialized per invoice: returns the most recent
    /// unsettled attempt (`pending`, `approved`, `processing`) on the same
    /// gateway with the same idempotency key, or inserts a `pending` row with
    /// the next sequential payment number.
    async fn claim_pending(&self, input: &NewPaymentInput) -> AppResult<PendingClaim>;

    async fn attach_charge(
        &self,
        id: Uuid,
        attachment: &ChargeAttachment,
    ) -> AppResult<PaymentProfile>;

    /// Atomic read-modify-write keyed by the payment row. A move into
    /// `completed` marks the invoice `paid` in the same transaction when the
    /// invoice state machine allows it.
    async fn apply_transition(
        &self,
        id: Uuid,
        transition: &PaymentTransition,
    ) -> AppResult<PaymentTransitionOutcome>;
}

/// Typed cache of provider-side customer ids, keyed by tenant, provider and
/// environment.
#[async_trait]
pub trait GatewayCustomerRepoTrait: Send + Sync {
    async fn get(
        &self,
        tenant_id: Uuid,
        provider: GatewayProvider,
        environment: GatewayEnvironment,
    ) -> AppResult<Option<ProviderCustomerId>>;

    async fn upsert(
        &self,
        tenant_id: Uuid,
        provider: GatewayProvider,
        environment: GatewayEnvironment,
        customer_id: &ProviderCustomerId,
    ) -> AppResult<()>;
}
