use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::Row;
use uuid::Uuid;

use crate::{
    adapters::persistence::{PostgresPersistence, parse_json_with_fallback},
    app_error::{AppError, AppResult},
    application::use_cases::tenancy::{
        PlanProfile, SubscriptionMetadata, SubscriptionProfile, SubscriptionRepoTrait,
        SubscriptionWithPlan,
    },
    domain::entities::subscription::SubscriptionStatus,
};

fn row_to_profile(row: &sqlx::postgres::PgRow) -> SubscriptionProfile {
    let id: Uuid = row.get("id");
    let metadata_json: serde_json::Value = row.get("metadata");
    let metadata: SubscriptionMetadata =
        parse_json_with_fallback(&metadata_json, "metadata", "subscription", &id.to_string());

    SubscriptionProfile {
        id,
        tenant_id: row.get("tenant_id"),
        plan_id: row.get("plan_id"),
        status: row.get("status"),
        start_date: row.get("start_date"),
        end_date: row.get("end_date"),
        custom_price_cents: row.get("custom_price_cents"),
        metadata,
        suspended_at: row.get("suspended_at"),
        suspension_reason: row.get("suspension_reason"),
        suspension_notified_at: row.get("suspension_notified_at"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn row_to_with_plan(row: sqlx::postgres::PgRow) -> SubscriptionWithPlan {
    SubscriptionWithPlan {
        subscription: row_to_profile(&row),
        plan: PlanProfile {
            id: row.get("plan_id"),
            name: row.get("plan_name"),
            price_cents: row.get("plan_price_cents"),
            billing_cycle: row.get("plan_billing_cycle"),
            trial_days: row.get("plan_trial_days"),
        },
    }
}

const SELECT_COLS: &str = r#"
    s.id, s.tenant_id, s.plan_id, s.status, s.start_date, s.end_date,
    s.custom_price_cents, s.metadata, s.suspended_at, s.suspension_reason,
    s.suspension_notified_at, s.created_at, s.updated_at
"#;

#[async_trait]
impl SubscriptionRepoTrait for PostgresPersistence {
    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<SubscriptionProfile>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM subscriptions s WHERE s.id = $1",
            SELECT_COLS
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(AppError::from)?;

        Ok(row.as_ref().map(row_to_profile))
    }

    async fn list_billable(&self, today: NaiveDate) -> AppResult<Vec<SubscriptionWithPlan>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {},
                p.name AS plan_name,
                p.price_cents AS plan_price_cents,
                p.billing_cycle AS plan_billing_cycle,
                p.trial_days AS plan_trial_days
            FROM subscriptions s
            JOIN plans p ON p.id = s.plan_id
            WHERE s.status = $1
              AND s.start_date <= $2
              AND (s.end_date IS NULL OR s.end_date >= $2)
            ORDER BY s.created_at
            "#,
            SELECT_COLS
        ))
        .bind(SubscriptionStatus::Active)
        .bind(today)
        .fetch_all(self.pool())
        .await
        .map_err(AppError::from)?;

        Ok(rows.into_iter().map(row_to_with_plan).collect())
    }

    async fn suspend(&self, id: Uuid, reason: &str, at: DateTime<Utc>) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE subscriptions
            SET status = $2,
                suspended_at = $3,
                suspension_reason = $4,
                suspension_notified_at = NULL,
                updated_at = $3
            WHERE id = $1 AND status IN ($5, $6)
            "#,
        )
        .bind(id)
        .bind(SubscriptionStatus::Suspended)
        .bind(at)
        .bind(reason)
        .bind(SubscriptionStatus::Active)
        .bind(SubscriptionStatus::Trialing)
        .execute(self.pool())
        .await
        .map_err(AppError::from)?;

        Ok(result.rows_affected() > 0)
    }

    async fn mark_suspension_notified(&self, id: Uuid, at: DateTime<Utc>) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE subscriptions
            SET suspension_notified_at = $2, updated_at = $2
            WHERE id = $1 AND suspension_notified_at IS NULL
            "#,
        )
        .bind(id)
        .bind(at)
        .execute(self.pool())
        .await
        .map_err(AppError::from)?;

        Ok(())
    }
}
