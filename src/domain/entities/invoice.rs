use serde::{Deserialize, Serialize};

use super::money::percent_of;

/// Invoice lifecycle.
///
/// `pending -> paid | overdue | cancelled`, `overdue -> paid | cancelled`.
/// `paid` and `cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, Default)]
#[sqlx(type_name = "invoice_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    #[default]
    Pending,
    Paid,
    Overdue,
    Cancelled,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Pending => "pending",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Overdue => "overdue",
            InvoiceStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, InvoiceStatus::Paid | InvoiceStatus::Cancelled)
    }

    /// Still collectable: reminders and payment attempts apply.
    pub fn is_open(&self) -> bool {
        matches!(self, InvoiceStatus::Pending | InvoiceStatus::Overdue)
    }

    pub fn can_transition_to(&self, next: InvoiceStatus) -> bool {
        use InvoiceStatus::*;
        matches!(
            (self, next),
            (Pending, Paid | Overdue | Cancelled) | (Overdue, Paid | Cancelled)
        )
    }
}

impl std::fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceLineItem {
    pub description: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub total_cents: i64,
}

impl InvoiceLineItem {
    pub fn new(description: impl Into<String>, quantity: i64, unit_price_cents: i64) -> Self {
        Self {
            description: description.into(),
            quantity,
            unit_price_cents,
            total_cents: quantity * unit_price_cents,
        }
    }
}

/// Monetary breakdown of an invoice, in cents.
///
/// Invariant: `total = subtotal - discount + tax` and `total >= 0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct InvoiceAmounts {
    pub subtotal_cents: i64,
    pub discount_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
}

impl InvoiceAmounts {
    /// Discounts are capped at the subtotal so the total never goes negative.
    pub fn compute(line_items: &[InvoiceLineItem], discount_percent_bps: i64, tax_cents: i64) -> Self {
        let subtotal_cents: i64 = line_items.iter().map(|item| item.total_cents).sum::<i64>().max(0);
        let discount_cents = percent_of(subtotal_cents, discount_percent_bps).clamp(0, subtotal_cents);
        let tax_cents = tax_cents.max(0);
        Self {
            subtotal_cents,
            discount_cents,
            tax_cents,
            total_cents: subtotal_cents - discount_cents + tax_cents,
        }
    }

    pub fn is_consistent(&self) -> bool {
        self.total_cents == self.subtotal_cents - self.discount_cents + self.tax_cents
            && self.total_cents >= 0
    }
}
