use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    domain::entities::invoice::{InvoiceAmounts, InvoiceLineItem, InvoiceStatus},
};

// ============================================================================
// Profile Types
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct InvoiceProfile {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub subscription_id: Uuid,
    pub number: String,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub line_items: Vec<InvoiceLineItem>,
    pub subtotal_cents: i64,
    pub discount_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub status: InvoiceStatus,
    pub paid_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub payment_attempts: i32,
    pub reminder_count: i32,
    pub last_reminder_at: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl InvoiceProfile {
    pub fn amounts(&self) -> InvoiceAmounts {
        InvoiceAmounts {
            subtotal_cents: self.subtotal_cents,
            discount_cents: self.discount_cents,
            tax_cents: self.tax_cents,
            total_cents: self.total_cents,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CreateInvoiceInput {
    pub tenant_id: Uuid,
    pub subscription_id: Uuid,
    pub number: String,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub line_items: Vec<InvoiceLineItem>,
    pub amounts: InvoiceAmounts,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
}

/// Result of an atomic status change on one invoice row.
#[derive(Debug, Clone)]
pub enum InvoiceTransition {
    Applied(InvoiceProfile),
    /// Already in the requested status.
    Unchanged(InvoiceProfile),
    /// The state machine forbids the move from the current status.
    Rejected(InvoiceProfile),
}

impl InvoiceTransition {
    pub fn invoice(&self) -> &InvoiceProfile {
        match self {
            InvoiceTransition::Applied(inv)
            | InvoiceTransition::Unchanged(inv)
            | InvoiceTransition::Rejected(inv) => inv,
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, InvoiceTransition::Applied(_))
    }
}

// ============================================================================
// Repository Trait
// ============================================================================

#[async_trait]
pub trait InvoiceRepoTrait: Send + Sync {
    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<InvoiceProfile>>;

    /// Insert unless an invoice already exists for
    /// `(subscription_id, period_start, period_end)`. Returns `None` on conflict.
    async fn create_if_absent(&self, input: &CreateInvoiceInput)
    -> AppResult<Option<InvoiceProfile>>;

    async fn increment_payment_attempts(&self, id: Uuid) -> AppResult<()>;

    /// Lock the row, check the state machine, apply. Stamps `paid_at` or
    /// `cancelled_at` when moving into those states.
    async fn transition_status(
        &self,
        id: Uuid,
        target: InvoiceStatus,
        at: DateTime<Utc>,
    ) -> AppResult<InvoiceTransition>;

    /// Open invoices (`pending` or `overdue`) with `due_date < today`.
    async fn list_past_due(&self, today: NaiveDate) -> AppResult<Vec<InvoiceProfile>>;

    /// All `pending` and `overdue` invoices.
    async fn list_open(&self) -> AppResult<Vec<InvoiceProfile>>;

    async fn record_reminder_sent(&self, id: Uuid, at: DateTime<Utc>) -> AppResult<()>;
}

// ============================================================================
// Use Cases
// ============================================================================

/// Operator overrides on invoices. Automatic transitions live in payment
/// settlement and billing automation.
#[derive(Clone)]
pub struct InvoiceUseCases {
    repo: Arc<dyn InvoiceRepoTrait>,
}

impl InvoiceUseCases {
    pub fn new(repo: Arc<dyn InvoiceRepoTrait>) -> Self {
        Self { repo }
    }

    pub async fn get(&self, id: Uuid) -> AppResult<InvoiceProfile> {
        self.repo.get_by_id(id).await?.ok_or(AppError::NotFound)
    }

    /// Settle an invoice outside any gateway (bank transfer, cash).
    pub async fn mark_paid_manually(&self, id: Uuid) -> AppResult<InvoiceProfile> {
        self.apply(id, InvoiceStatus::Paid).await
    }

    /// Cancel an invoice that was never paid.
    pub async fn cancel(&self, id: Uuid) -> AppResult<InvoiceProfile> {
        self.apply(id, InvoiceStatus::Cancelled).await
    }

    async fn apply(&self, id: Uuid, target: InvoiceStatus) -> AppResult<InvoiceProfile> {
        match self.repo.transition_status(id, target, Utc::now()).await? {
            InvoiceTransition::Applied(invoice) => {
                info!(invoice_id = %id, status = %target, "Invoice status changed manually");
                Ok(invoice)
            }
            InvoiceTransition::Unchanged(invoice) => Ok(invoice),
            InvoiceTransition::Rejected(invoice) => Err(AppError::InvalidTransition(format!(
                "invoice {} -> {}",
                invoice.status, target
            ))),
        }
    }
}
