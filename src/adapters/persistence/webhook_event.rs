use async_trait::async_trait;
use sqlx::Row;
use uuid::Uuid;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    application::use_cases::webhook_ingestion::{
        NewWebhookEvent, WebhookEventProfile, WebhookEventRepoTrait,
    },
    domain::entities::webhook::{WebhookStatus, WebhookStep},
};

fn row_to_profile(row: sqlx::postgres::PgRow) -> WebhookEventProfile {
    WebhookEventProfile {
        id: row.get("id"),
        gateway_id: row.get("gateway_id"),
        provider_event_id: row.get("provider_event_id"),
        event_type: row.get("event_type"),
        payload: row.get("payload"),
        payload_raw: row.get("payload_raw"),
        status: row.get("status"),
        attempts: row.get("attempts"),
        error_step: row.get("error_step"),
        error_message: row.get("error_message"),
        source_ip: row.get("source_ip"),
        headers: row.get("headers"),
        processed_at: row.get("processed_at"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

const SELECT_COLS: &str = r#"
    id, gateway_id, provider_event_id, event_type, payload, payload_raw, status,
    attempts, error_step, error_message, source_ip, headers, processed_at,
    created_at, updated_at
"#;

#[async_trait]
impl WebhookEventRepoTrait for PostgresPersistence {
    async fn create(&self, event: &NewWebhookEvent) -> AppResult<WebhookEventProfile> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO payment_webhooks (
                id, gateway_id, provider_event_id, event_type, payload, payload_raw,
                status, attempts, source_ip, headers
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, 0, $8, $9)
            RETURNING {}
            "#,
            SELECT_COLS
        ))
        .bind(Uuid::new_v4())
        .bind(event.gateway_id)
        .bind(&event.provider_event_id)
        .bind(&event.event_type)
        .bind(&event.payload)
        .bind(&event.payload_raw)
        .bind(WebhookStatus::Pending)
        .bind(&event.source_ip)
        .bind(&event.headers)
        .fetch_one(self.pool())
        .await
        .map_err(AppError::from)?;

        Ok(row_to_profile(row))
    }

    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<WebhookEventProfile>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM payment_webhooks WHERE id = $1",
            SELECT_COLS
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(AppError::from)?;

        Ok(row.map(row_to_profile))
    }

    async fn find_processed(
        &self,
        gateway_id: Uuid,
        provider_event_id: &str,
        exclude_id: Uuid,
    ) -> AppResult<Option<WebhookEventProfile>> {
        let row = sqlx::query(&format!(
            r#"
            SELECT {} FROM payment_webhooks
            WHERE gateway_id = $1
              AND provider_event_id = $2
              AND status = $3
              AND id <> $4
            ORDER BY created_at
            LIMIT 1
            "#,
            SELECT_COLS
        ))
        .bind(gateway_id)
        .bind(provider_event_id)
        .bind(WebhookStatus::Processed)
        .bind(exclude_id)
        .fetch_optional(self.pool())
        .await
        .map_err(AppError::from)?;

        Ok(row.map(row_to_profile))
    }

    async fn begin_attempt(&self, id: Uuid) -> AppResult<i32> {
        let attempts: i32 = sqlx::query_scalar(
            r#"
            UPDATE payment_webhooks
            SET attempts = attempts + 1, updated_at = NOW()
            WHERE id = $1
            RETURNING attempts
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(AppError::from)?
        .ok_or(AppError::NotFound)?;
        Ok(attempts)
    }

    async fn mark_processed(&self, id: Uuid, note: Option<&str>) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE payment_webhooks
            SET status = $2,
                error_step = NULL,
                error_message = $3,
                processed_at = NOW(),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(WebhookStatus::Processed)
        .bind(note)
        .execute(self.pool())
        .await
        .map_err(AppError::from)?;
        Ok(())
    }

    async fn mark_failed(&self, id: Uuid, step: WebhookStep, message: &str) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE payment_webhooks
            SET status = $2,
                error_step = $3,
                error_message = $4,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(WebhookStatus::Failed)
        .bind(step.as_str())
        .bind(message)
        .execute(self.pool())
        .await
        .map_err(AppError::from)?;
        Ok(())
    }

    async fn list_by_status(
        &self,
        status: WebhookStatus,
        limit: i64,
    ) -> AppResult<Vec<WebhookEventProfile>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {} FROM payment_webhooks
            WHERE status = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
            SELECT_COLS
        ))
        .bind(status)
        .bind(limit)
        .fetch_all(self.pool())
        .await
        .map_err(AppError::from)?;

        Ok(rows.into_iter().map(row_to_profile).collect())
    }
}
