use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    application::{
        ports::payment_gateway::ProviderCustomerId, use_cases::payment::GatewayCustomerRepoTrait,
    },
    domain::entities::{
        gateway_environment::GatewayEnvironment, gateway_provider::GatewayProvider,
    },
};

#[async_trait]
impl GatewayCustomerRepoTrait for PostgresPersistence {
    async fn get(
        &self,
        tenant_id: Uuid,
        provider: GatewayProvider,
        environment: GatewayEnvironment,
    ) -> AppResult<Option<ProviderCustomerId>> {
        let id: Option<String> = sqlx::query_scalar(
            r#"
            SELECT external_customer_id FROM gateway_customers
            WHERE tenant_id = $1 AND provider = $2 AND environment = $3
            "#,
        )
        .bind(tenant_id)
        .bind(provider)
        .bind(environment)
        .fetch_optional(self.pool())
        .await
        .map_err(AppError::from)?;

        Ok(id.map(ProviderCustomerId))
    }

    async fn upsert(
        &self,
        tenant_id: Uuid,
        provider: GatewayProvider,
        environment: GatewayEnvironment,
        customer_id: &ProviderCustomerId,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO gateway_customers (tenant_id, provider, environment, external_customer_id)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (tenant_id, provider, environment) DO UPDATE SET
                external_customer_id = EXCLUDED.external_customer_id,
                updated_at = NOW()
            "#,
        )
        .bind(tenant_id)
        .bind(provider)
        .bind(environment)
        .bind(customer_id.as_str())
        .execute(self.pool())
        .await
        .map_err(AppError::from)?;
        Ok(())
    }
}
