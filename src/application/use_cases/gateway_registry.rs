use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::ports::payment_gateway::PaymentGatewayPort,
    domain::entities::{
        gateway_environment::GatewayEnvironment, gateway_provider::GatewayProvider,
        money::FeeModel, payment_method::PaymentMethod,
    },
    infra::crypto::CredentialCipher,
};

use super::gateway_factory::PaymentGatewayFactory;

// ============================================================================
// Profile Types
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct PaymentGatewayProfile {
    pub id: Uuid,
    pub name: String,
    pub provider: GatewayProvider,
    pub environment: GatewayEnvironment,
    #[serde(skip_serializing)]
    pub credentials_encrypted: String,
    pub supported_methods: Vec<PaymentMethod>,
    pub fee_model: FeeModel,
    pub is_active: bool,
    pub is_default: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl PaymentGatewayProfile {
    pub fn supports_method(&self, method: PaymentMethod) -> bool {
        self.supported_methods.contains(&method)
    }
}

/// Plaintext provider credentials. Stored encrypted as one JSON document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayCredentials {
    pub api_key: String,
    /// Asaas webhook access token, or Mercado Pago webhook signing secret.
    #[serde(default)]
    pub webhook_secret: Option<String>,
}

/// Row contents written by create and update.
#[derive(Debug, Clone)]
pub struct GatewayRecord {
    pub name: String,
    pub provider: GatewayProvider,
    pub environment: GatewayEnvironment,
    pub credentials_encrypted: String,
    pub supported_methods: Vec<PaymentMethod>,
    pub fee_model: FeeModel,
    pub is_active: bool,
    pub is_default: bool,
}

#[derive(Debug, Clone)]
pub struct GatewayInput {
    pub name: String,
    pub provider: GatewayProvider,
    pub environment: GatewayEnvironment,
    /// Required on create; `None` keeps the stored credentials on update.
    pub credentials: Option<GatewayCredentials>,
    pub supported_methods: Vec<PaymentMethod>,
    pub fee_model: FeeModel,
    pub is_active: bool,
    pub is_default: bool,
}

// ============================================================================
// Repository Trait
// ============================================================================

#[async_trait]
pub trait PaymentGatewayRepoTrait: Send + Sync {
    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<PaymentGatewayProfile>>;

    /// The gateway flagged `is_default AND is_active`, if any.
    async fn get_default_active(&self) -> AppResult<Option<PaymentGatewayProfile>>;

    /// Active gateways for a provider, default first, then newest first.
    async fn list_active_by_provider(
        &self,
        provider: GatewayProvider,
    ) -> AppResult<Vec<PaymentGatewayProfile>>;

    async fn list_all(&self) -> AppResult<Vec<PaymentGatewayProfile>>;

    /// Insert. When `record.is_default`, clears every other default in the
    /// same transaction.
    async fn create(&self, record: &GatewayRecord) -> AppResult<PaymentGatewayProfile>;

    /// Update. Same default handling as `create`.
    async fn update(&self, id: Uuid, record: &GatewayRecord) -> AppResult<PaymentGatewayProfile>;

    /// Clear all defaults and flag `id` in one transaction.
    async fn set_default(&self, id: Uuid) -> AppResult<PaymentGatewayProfile>;
}

// ============================================================================
// Registry
// ============================================================================

/// Resolves which configured gateway serves a request and hands out the
/// matching provider port.
pub struct GatewayRegistry {
    repo: Arc<dyn PaymentGatewayRepoTrait>,
    factory: Arc<PaymentGatewayFactory>,
    cipher: CredentialCipher,
}

impl GatewayRegistry {
    pub fn new(
        repo: Arc<dyn PaymentGatewayRepoTrait>,
        factory: Arc<PaymentGatewayFactory>,
        cipher: CredentialCipher,
    ) -> Self {
        Self {
            repo,
            factory,
            cipher,
        }
    }

    /// Explicit gateway when given, otherwise the active default.
    ///
    /// # Errors
    /// - `NotFound` for an unknown explicit id
    /// - `GatewayInactive` for an explicit id that is switched off
    /// - `NoDefaultGateway` when no id is given and no active default exists
    pub async fn resolve(&self, gateway_id: Option<Uuid>) -> AppResult<PaymentGatewayProfile> {
        match gateway_id {
            Some(id) => {
                let gateway = self.get(id).await?;
                if !gateway.is_active {
                    return Err(AppError::GatewayInactive);
                }
                Ok(gateway)
            }
            None => self
                .repo
                .get_default_active()
                .await?
                .ok_or(AppError::NoDefaultGateway),
        }
    }

    pub async fn get(&self, id: Uuid) -> AppResult<PaymentGatewayProfile> {
        self.repo.get_by_id(id).await?.ok_or(AppError::NotFound)
    }

    pub async fn list(&self) -> AppResult<Vec<PaymentGatewayProfile>> {
        self.repo.list_all().await
    }

    /// Gateway receiving webhooks for a provider. Prefers the default when
    /// several gateways of the same provider are active.
    pub async fn active_for_provider(
        &self,
        provider: GatewayProvider,
    ) -> AppResult<Option<PaymentGatewayProfile>> {
        let gateways = self.repo.list_active_by_provider(provider).await?;
        Ok(gateways.into_iter().next())
    }

    pub fn port_for(&self, gateway: &PaymentGatewayProfile) -> AppResult<Arc<dyn PaymentGatewayPort>> {
        self.factory.get(gateway)
    }

    pub async fn create_gateway(&self, input: GatewayInput) -> AppResult<PaymentGatewayProfile> {
        let credentials = input
            .credentials
            .as_ref()
            .ok_or_else(|| AppError::InvalidInput("credentials are required".into()))?;
        let credentials_encrypted = self.encrypt_credentials(credentials)?;
        let record = validated_record(&input, credentials_encrypted)?;

        let gateway = self.repo.create(&record).await?;
        info!(
            gateway_id = %gateway.id,
            provider = %gateway.provider,
            is_default = gateway.is_default,
            "Payment gateway created"
        );
        Ok(gateway)
    }

    pub async fn update_gateway(
        &self,
        id: Uuid,
        input: GatewayInput,
    ) -> AppResult<PaymentGatewayProfile> {
        let existing = self.get(id).await?;
        let credentials_encrypted = match input.credentials.as_ref() {
            Some(credentials) => self.encrypt_credentials(credentials)?,
            None => existing.credentials_encrypted,
        };
        let record = validated_record(&input, credentials_encrypted)?;

        let gateway = self.repo.update(id, &record).await?;
        info!(gateway_id = %id, is_default = gateway.is_default, "Payment gateway updated");
        Ok(gateway)
    }

    /// Make `id` the single default. Inactive gateways cannot be default.
    pub async fn set_default(&self, id: Uuid) -> AppResult<PaymentGatewayProfile> {
        let gateway = self.get(id).await?;
        if !gateway.is_active {
            return Err(AppError::GatewayInactive);
        }
        let gateway = self.repo.set_default(id).await?;
        info!(gateway_id = %id, provider = %gateway.provider, "Default payment gateway changed");
        Ok(gateway)
    }

    fn encrypt_credentials(&self, credentials: &GatewayCredentials) -> AppResult<String> {
        let json = serde_json::to_string(credentials)
            .map_err(|e| AppError::Internal(format!("serialize credentials: {e}")))?;
        self.cipher.encrypt(&json)
    }
}

fn validated_record(input: &GatewayInput, credentials_encrypted: String) -> AppResult<GatewayRecord> {
    if input.name.trim().is_empty() {
        return Err(AppError::InvalidInput("gateway name is required".into()));
    }
    if !input.provider.supports_environment(input.environment) {
        return Err(AppError::InvalidInput(format!(
            "{} does not support {} environment",
            input.provider.display_name(),
            input.environment
        )));
    }
    if input.supported_methods.is_empty() {
        return Err(AppError::InvalidInput(
            "at least one payment method is required".into(),
        ));
    }
    if input.fee_model.percent_bps < 0 || input.fee_model.fixed_cents < 0 {
        return Err(AppError::InvalidInput("fees cannot be negative".into()));
    }
    if input.is_default && !input.is_active {
        return Err(AppError::InvalidInput(
            "an inactive gateway cannot be the default".into(),
        ));
    }

    let mut supported_methods: Vec<PaymentMethod> = Vec::with_capacity(input.supported_methods.len());
    for method in &input.supported_methods {
        if !supported_methods.contains(method) {
            supported_methods.push(*method);
        }
    }

    Ok(GatewayRecord {
        name: input.name.trim().to_string(),
        provider: input.provider,
        environment: input.environment,
        credentials_encrypted,
        supported_methods,
        fee_model: input.fee_model,
        is_active: input.is_active,
        is_default: input.is_default,
    })
}
