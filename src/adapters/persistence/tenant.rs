use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use uuid::Uuid;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    application::use_cases::tenancy::{TenantProfile, TenantRepoTrait},
};

fn row_to_profile(row: sqlx::postgres::PgRow) -> TenantProfile {
    TenantProfile {
        id: row.get("id"),
        name: row.get("name"),
        email: row.get("email"),
        phone: row.get("phone"),
        tax_id: row.get("tax_id"),
        is_active: row.get("is_active"),
        deactivated_at: row.get("deactivated_at"),
        deactivation_reason: row.get("deactivation_reason"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

const SELECT_COLS: &str = r#"
    id, name, email, phone, tax_id, is_active,
    deactivated_at, deactivation_reason, created_at, updated_at
"#;

#[async_trait]
impl TenantRepoTrait for PostgresPersistence {
    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<TenantProfile>> {
        let row = sqlx::query(&format!("SELECT {} FROM tenants WHERE id = $1", SELECT_COLS))
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(AppError::from)?;

        Ok(row.map(row_to_profile))
    }

    async fn deactivate(&self, id: Uuid, reason: &str, at: DateTime<Utc>) -> AppResult<bool> {
        // Conditional update: concurrent runs deactivate exactly once
        let result = sqlx::query(
            r#"
            UPDATE tenants
            SET is_active = false,
                deactivated_at = $2,
                deactivation_reason = $3,
                updated_at = $2
            WHERE id = $1 AND is_active = true
            "#,
        )
        .bind(id)
        .bind(at)
        .bind(reason)
        .execute(self.pool())
        .await
        .map_err(AppError::from)?;

        Ok(result.rows_affected() > 0)
    }
}
