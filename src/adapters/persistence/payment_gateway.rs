use async_trait::async_trait;
use sqlx::Row;
use uuid::Uuid;

use crate::{
    adapters::persistence::{PostgresPersistence, parse_json_with_fallback},
    app_error::{AppError, AppResult},
    application::use_cases::gateway_registry::{
        GatewayRecord, PaymentGatewayProfile, PaymentGatewayRepoTrait,
    },
    domain::entities::{
        gateway_provider::GatewayProvider, money::FeeModel, payment_method::PaymentMethod,
    },
};

fn row_to_profile(row: sqlx::postgres::PgRow) -> PaymentGatewayProfile {
    let id: Uuid = row.get("id");
    let methods_json: serde_json::Value = row.get("supported_methods");
    let supported_methods: Vec<PaymentMethod> = parse_json_with_fallback(
        &methods_json,
        "supported_methods",
        "payment_gateway",
        &id.to_string(),
    );

    PaymentGatewayProfile {
        id,
        name: row.get("name"),
        provider: row.get("provider"),
        environment: row.get("environment"),
        credentials_encrypted: row.get("credentials_encrypted"),
        supported_methods,
        fee_model: FeeModel::new(row.get("fee_percent_bps"), row.get("fee_fixed_cents")),
        is_active: row.get("is_active"),
        is_default: row.get("is_default"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

const SELECT_COLS: &str = r#"
    id, name, provider, environment, credentials_encrypted, supported_methods,
    fee_percent_bps, fee_fixed_cents, is_active, is_default, created_at, updated_at
"#;

fn methods_json(record: &GatewayRecord) -> AppResult<serde_json::Value> {
    serde_json::to_value(&record.supported_methods)
        .map_err(|e| AppError::Internal(format!("serialize supported methods: {e}")))
}

/// Serializes every default swap against the whole gateway set. The mode
/// conflicts with itself and with row writes but not with plain reads, so a
/// second swap waits until the first commits and then sees its default.
/// `payment_gateways_single_default ON payment_gateways ((true)) WHERE is_default`
/// is the partial unique index that backs the invariant in the schema.
const LOCK_GATEWAY_SET: &str = "LOCK TABLE payment_gateways IN SHARE ROW EXCLUSIVE MODE";

async fn lock_gateway_set(tx: &mut sqlx::Transaction<'_, sqlx::Postgres>) -> AppResult<()> {
    sqlx::query(LOCK_GATEWAY_SET)
        .execute(&mut **tx)
        .await
        .map_err(AppError::from)?;
    Ok(())
}

#[async_trait]
impl PaymentGatewayRepoTrait for PostgresPersistence {
    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<PaymentGatewayProfile>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM payment_gateways WHERE id = $1",
            SELECT_COLS
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(AppError::from)?;

        Ok(row.map(row_to_profile))
    }

    async fn get_default_active(&self) -> AppResult<Option<PaymentGatewayProfile>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM payment_gateways WHERE is_default = true AND is_active = true LIMIT 1",
            SELECT_COLS
        ))
        .fetch_optional(self.pool())
        .await
        .map_err(AppError::from)?;

        Ok(row.map(row_to_profile))
    }

    async fn list_active_by_provider(
        &self,
        provider: GatewayProvider,
    ) -> AppResult<Vec<PaymentGatewayProfile>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {} FROM payment_gateways
            WHERE provider = $1 AND is_active = true
            ORDER BY is_default DESC, created_at DESC
            "#,
            SELECT_COLS
        ))
        .bind(provider)
        .fetch_all(self.pool())
        .await
        .map_err(AppError::from)?;

        Ok(rows.into_iter().map(row_to_profile).collect())
    }

    async fn list_all(&self) -> AppResult<Vec<PaymentGatewayProfile>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM payment_gateways ORDER BY is_default DESC, created_at",
            SELECT_COLS
        ))
        .fetch_all(self.pool())
        .await
        .map_err(AppError::from)?;

        Ok(rows.into_iter().map(row_to_profile).collect())
    }

    async fn create(&self, record: &GatewayRecord) -> AppResult<PaymentGatewayProfile> {
        let methods = methods_json(record)?;
        let mut tx = self.pool().begin().await.map_err(AppError::from)?;

        if record.is_default {
            lock_gateway_set(&mut tx).await?;
            sqlx::query("UPDATE payment_gateways SET is_default = false, updated_at = NOW() WHERE is_default = true")
                .execute(&mut *tx)
                .await
                .map_err(AppError::from)?;
        }

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO payment_gateways (
                id, name, provider, environment, credentials_encrypted, supported_methods,
                fee_percent_bps, fee_fixed_cents, is_active, is_default
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {}
            "#,
            SELECT_COLS
        ))
        .bind(Uuid::new_v4())
        .bind(&record.name)
        .bind(record.provider)
        .bind(record.environment)
        .bind(&record.credentials_encrypted)
        .bind(methods)
        .bind(record.fee_model.percent_bps)
        .bind(record.fee_model.fixed_cents)
        .bind(record.is_active)
        .bind(record.is_default)
        .fetch_one(&mut *tx)
        .await
        .map_err(AppError::from)?;

        tx.commit().await.map_err(AppError::from)?;
        Ok(row_to_profile(row))
    }

    async fn update(&self, id: Uuid, record: &GatewayRecord) -> AppResult<PaymentGatewayProfile> {
        let methods = methods_json(record)?;
        let mut tx = self.pool().begin().await.map_err(AppError::from)?;

        if record.is_default {
            lock_gateway_set(&mut tx).await?;
            sqlx::query(
                "UPDATE payment_gateways SET is_default = false, updated_at = NOW() WHERE is_default = true AND id <> $1",
            )
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(AppError::from)?;
        }

        let row = sqlx::query(&format!(
            r#"
            UPDATE payment_gateways
            SET name = $2,
                provider = $3,
                environment = $4,
                credentials_encrypted = $5,
                supported_methods = $6,
                fee_percent_bps = $7,
                fee_fixed_cents = $8,
                is_active = $9,
                is_default = $10,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            SELECT_COLS
        ))
        .bind(id)
        .bind(&record.name)
        .bind(record.provider)
        .bind(record.environment)
        .bind(&record.credentials_encrypted)
        .bind(methods)
        .bind(record.fee_model.percent_bps)
        .bind(record.fee_model.fixed_cents)
        .bind(record.is_active)
        .bind(record.is_default)
        .fetch_optional(&mut *tx)
        .await
        .map_err(AppError::from)?
        .ok_or(AppError::NotFound)?;

        tx.commit().await.map_err(AppError::from)?;
        Ok(row_to_profile(row))
    }

    async fn set_default(&self, id: Uuid) -> AppResult<PaymentGatewayProfile> {
        let mut tx = self.pool().begin().await.map_err(AppError::from)?;
        lock_gateway_set(&mut tx).await?;

        sqlx::query(
            "UPDATE payment_gateways SET is_default = false, updated_at = NOW() WHERE is_default = true AND id <> $1",
        )
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(AppError::from)?;

        let row = sqlx::query(&format!(
            r#"
            UPDATE payment_gateways
            SET is_default = true, updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            SELECT_COLS
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(AppError::from)?
        .ok_or(AppError::NotFound)?;

        tx.commit().await.map_err(AppError::from)?;
        Ok(row_to_profile(row))
    }
}
