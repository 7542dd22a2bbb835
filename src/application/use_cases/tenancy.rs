use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    app_error::AppResult,
    domain::entities::subscription::{BillingCycle, SubscriptionStatus},
};

// ============================================================================
// Profile Types
// ============================================================================

/// A billed customer organization. Owned by the tenant directory; this crate
/// only reads contact data and flips `is_active` during suspension.
#[derive(Debug, Clone, Serialize)]
pub struct TenantProfile {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub tax_id: Option<String>,
    pub is_active: bool,
    pub deactivated_at: Option<DateTime<Utc>>,
    pub deactivation_reason: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlanProfile {
    pub id: Uuid,
    pub name: String,
    pub price_cents: i64,
    pub billing_cycle: BillingCycle,
    pub trial_days: i32,
}

/// One extra line billed on top of the plan price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtraCharge {
    pub description: String,
    #[serde(default = "default_quantity")]
    pub quantity: i64,
    pub unit_price_cents: i64,
}

fn default_quantity() -> i64 {
    1
}

/// Typed view over the free-form subscription metadata keys this crate reads.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionMetadata {
    #[serde(default)]
    pub due_day: Option<u32>,
    #[serde(default)]
    pub promotional_discount_percent: Option<f64>,
    #[serde(default)]
    pub extra_charges: Vec<ExtraCharge>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionProfile {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub plan_id: Uuid,
    pub status: SubscriptionStatus,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub custom_price_cents: Option<i64>,
    pub metadata: SubscriptionMetadata,
    pub suspended_at: Option<DateTime<Utc>>,
    pub suspension_reason: Option<String>,
    /// Set once the suspension notice went out; cleared on every new suspension.
    pub suspension_notified_at: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl SubscriptionProfile {
    /// Active and inside its `[start_date, end_date]` window on `today`.
    pub fn is_billable_on(&self, today: NaiveDate) -> bool {
        self.status == SubscriptionStatus::Active
            && self.start_date <= today
            && self.end_date.is_none_or(|end| end >= today)
    }

    /// Plan price unless the subscription carries a negotiated override.
    pub fn effective_price_cents(&self, plan: &PlanProfile) -> i64 {
        self.custom_price_cents.unwrap_or(plan.price_cents)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionWithPlan {
    pub subscription: SubscriptionProfile,
    pub plan: PlanProfile,
}

// ============================================================================
// Repository Traits
// ============================================================================

#[async_trait]
pub trait TenantRepoTrait: Send + Sync {
    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<TenantProfile>>;

    /// Deactivate an active tenant. Returns `false` when it was already inactive.
    async fn deactivate(&self, id: Uuid, reason: &str, at: DateTime<Utc>) -> AppResult<bool>;
}

#[async_trait]
pub trait SubscriptionRepoTrait: Send + Sync {
    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<SubscriptionProfile>>;

    /// Active subscriptions with their plans whose date window contains `today`.
    async fn list_billable(&self, today: NaiveDate) -> AppResult<Vec<SubscriptionWithPlan>>;

    /// Suspend a subscription that is still active or trialing.
    /// Returns `false` when the status did not change.
    async fn suspend(&self, id: Uuid, reason: &str, at: DateTime<Utc>) -> AppResult<bool>;

    /// Stamp `suspension_notified_at` if it is still unset.
    async fn mark_suspension_notified(&self, id: Uuid, at: DateTime<Utc>) -> AppResult<()>;
}
