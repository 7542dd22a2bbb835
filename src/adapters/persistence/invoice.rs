use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{Postgres, Row, Transaction};
use uuid::Uuid;

use crate::{
    adapters::persistence::{PostgresPersistence, parse_json_with_fallback},
    app_error::{AppError, AppResult},
    application::use_cases::invoice::{
        CreateInvoiceInput, InvoiceProfile, InvoiceRepoTrait, InvoiceTransition,
    },
    domain::entities::invoice::{InvoiceLineItem, InvoiceStatus},
};

pub(super) fn row_to_profile(row: sqlx::postgres::PgRow) -> InvoiceProfile {
    let id: Uuid = row.get("id");
    let line_items_json: serde_json::Value = row.get("line_items");
    let line_items: Vec<InvoiceLineItem> =
        parse_json_with_fallback(&line_items_json, "line_items", "invoice", &id.to_string());

    InvoiceProfile {
        id,
        tenant_id: row.get("tenant_id"),
        subscription_id: row.get("subscription_id"),
        number: row.get("number"),
        period_start: row.get("period_start"),
        period_end: row.get("period_end"),
        line_items,
        subtotal_cents: row.get("subtotal_cents"),
        discount_cents: row.get("discount_cents"),
        tax_cents: row.get("tax_cents"),
        total_cents: row.get("total_cents"),
        issue_date: row.get("issue_date"),
        due_date: row.get("due_date"),
        status: row.get("status"),
        paid_at: row.get("paid_at"),
        cancelled_at: row.get("cancelled_at"),
        payment_attempts: row.get("payment_attempts"),
        reminder_count: row.get("reminder_count"),
        last_reminder_at: row.get("last_reminder_at"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

pub(super) const SELECT_COLS: &str = r#"
    id, tenant_id, subscription_id, number, period_start, period_end, line_items,
    subtotal_cents, discount_cents, tax_cents, total_cents, issue_date, due_date,
    status, paid_at, cancelled_at, payment_attempts, reminder_count, last_reminder_at,
    created_at, updated_at
"#;

/// Lock an invoice row inside `tx` and move it to `target` if the state
/// machine allows it.
pub(super) async fn transition_locked(
    tx: &mut Transaction<'_, Postgres>,
    id: Uuid,
    target: InvoiceStatus,
    at: DateTime<Utc>,
) -> AppResult<InvoiceTransition> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM invoices WHERE id = $1 FOR UPDATE",
        SELECT_COLS
    ))
    .bind(id)
    .fetch_optional(&mut **tx)
    .await
    .map_err(AppError::from)?
    .ok_or(AppError::NotFound)?;
    let current = row_to_profile(row);

    if current.status == target {
        return Ok(InvoiceTransition::Unchanged(current));
    }
    if !current.status.can_transition_to(target) {
        return Ok(InvoiceTransition::Rejected(current));
    }

    let row = sqlx::query(&format!(
        r#"
        UPDATE invoices
        SET status = $2,
            paid_at = CASE WHEN $2 = 'paid'::invoice_status THEN COALESCE(paid_at, $3) ELSE paid_at END,
            cancelled_at = CASE WHEN $2 = 'cancelled'::invoice_status THEN COALESCE(cancelled_at, $3) ELSE cancelled_at END,
            updated_at = $3
        WHERE id = $1
        RETURNING {}
        "#,
        SELECT_COLS
    ))
    .bind(id)
    .bind(target)
    .bind(at)
    .fetch_one(&mut **tx)
    .await
    .map_err(AppError::from)?;

    Ok(InvoiceTransition::Applied(row_to_profile(row)))
}

#[async_trait]
impl InvoiceRepoTrait for PostgresPersistence {
    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<InvoiceProfile>> {
        let row = sqlx::query(&format!("SELECT {} FROM invoices WHERE id = $1", SELECT_COLS))
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(AppError::from)?;

        Ok(row.map(row_to_profile))
    }

    async fn create_if_absent(
        &self,
        input: &CreateInvoiceInput,
    ) -> AppResult<Option<InvoiceProfile>> {
        let line_items = serde_json::to_value(&input.line_items)
            .map_err(|e| AppError::Internal(format!("serialize line items: {e}")))?;

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO invoices (
                id, tenant_id, subscription_id, number, period_start, period_end, line_items,
                subtotal_cents, discount_cents, tax_cents, total_cents, issue_date, due_date, status
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            ON CONFLICT (subscription_id, period_start, period_end) DO NOTHING
            RETURNING {}
            "#,
            SELECT_COLS
        ))
        .bind(Uuid::new_v4())
        .bind(input.tenant_id)
        .bind(input.subscription_id)
        .bind(&input.number)
        .bind(input.period_start)
        .bind(input.period_end)
        .bind(line_items)
        .bind(input.amounts.subtotal_cents)
        .bind(input.amounts.discount_cents)
        .bind(input.amounts.tax_cents)
        .bind(input.amounts.total_cents)
        .bind(input.issue_date)
        .bind(input.due_date)
        .bind(InvoiceStatus::Pending)
        .fetch_optional(self.pool())
        .await
        .map_err(AppError::from)?;

        Ok(row.map(row_to_profile))
    }

    async fn increment_payment_attempts(&self, id: Uuid) -> AppResult<()> {
        sqlx::query(
            "UPDATE invoices SET payment_attempts = payment_attempts + 1, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .execute(self.pool())
        .await
        .map_err(AppError::from)?;
        Ok(())
    }

    async fn transition_status(
        &self,
        id: Uuid,
        target: InvoiceStatus,
        at: DateTime<Utc>,
    ) -> AppResult<InvoiceTransition> {
        let mut tx = self.pool().begin().await.map_err(AppError::from)?;
        let transition = transition_locked(&mut tx, id, target, at).await?;
        tx.commit().await.map_err(AppError::from)?;
        Ok(transition)
    }

    async fn list_past_due(&self, today: NaiveDate) -> AppResult<Vec<InvoiceProfile>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {} FROM invoices
            WHERE status IN ($1, $2) AND due_date < $3
            ORDER BY due_date
            "#,
            SELECT_COLS
        ))
        .bind(InvoiceStatus::Pending)
        .bind(InvoiceStatus::Overdue)
        .bind(today)
        .fetch_all(self.pool())
        .await
        .map_err(AppError::from)?;

        Ok(rows.into_iter().map(row_to_profile).collect())
    }

    async fn list_open(&self) -> AppResult<Vec<InvoiceProfile>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM invoices WHERE status IN ($1, $2) ORDER BY due_date",
            SELECT_COLS
        ))
        .bind(InvoiceStatus::Pending)
        .bind(InvoiceStatus::Overdue)
        .fetch_all(self.pool())
        .await
        .map_err(AppError::from)?;

        Ok(rows.into_iter().map(row_to_profile).collect())
    }

    async fn record_reminder_sent(&self, id: Uuid, at: DateTime<Utc>) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE invoices
            SET reminder_count = reminder_count + 1,
                last_reminder_at = $2,
                updated_at = $2
            WHERE id = $1
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
