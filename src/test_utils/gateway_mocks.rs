//! In-memory gateway repository and a scripted provider port.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Value as JsonValue, json};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::ports::payment_gateway::{
        ChargeRequest, ChargeResult, ChargeState, ChargeStatusReport, CustomerData,
        PaymentGatewayPort, ProviderCustomerId, WebhookFields, WebhookHeaders,
    },
    domain::entities::{
        gateway_environment::GatewayEnvironment, gateway_provider::GatewayProvider,
        payment_method::PaymentMethod, payment_status::PaymentStatus,
    },
    infra::{
        asaas_gateway::{asaas_event_state, parse_asaas_webhook},
        http_client::build_client,
    },
    use_cases::{
        gateway_factory::PaymentGatewayFactory,
        gateway_registry::{
            GatewayRecord, GatewayRegistry, PaymentGatewayProfile, PaymentGatewayRepoTrait,
        },
    },
};

use super::factories::test_cipher;

// ============================================================================
// InMemoryGatewayRepo
// ============================================================================

/// Rows kept in insertion order; `list_all` returns newest first like the SQL.
#[derive(Default)]
pub struct InMemoryGatewayRepo {
    pub gateways: Mutex<Vec<PaymentGatewayProfile>>,
}

impl InMemoryGatewayRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, gateway: PaymentGatewayProfile) {
        self.gateways.lock().unwrap().push(gateway);
    }

    pub fn get(&self, id: Uuid) -> Option<PaymentGatewayProfile> {
        self.gateways
            .lock()
            .unwrap()
            .iter()
            .find(|g| g.id == id)
            .cloned()
    }

    pub fn update_with(&self, id: Uuid, update: impl FnOnce(&mut PaymentGatewayProfile)) {
        let mut gateways = self.gateways.lock().unwrap();
        if let Some(gateway) = gateways.iter_mut().find(|g| g.id == id) {
            update(gateway);
        }
    }

    pub fn defaults(&self) -> Vec<Uuid> {
        self.gateways
            .lock()
            .unwrap()
            .iter()
            .filter(|g| g.is_default)
            .map(|g| g.id)
            .collect()
    }

    fn write(gateway: &mut PaymentGatewayProfile, record: &GatewayRecord) {
        gateway.name = record.name.clone();
        gateway.provider = record.provider;
        gateway.environment = record.environment;
        gateway.credentials_encrypted = record.credentials_encrypted.clone();
        gateway.supported_methods = record.supported_methods.clone();
        gateway.fee_model = record.fee_model;
        gateway.is_active = record.is_active;
        gateway.is_default = record.is_default;
        gateway.updated_at = Some(Utc::now());
    }

    fn clear_defaults(gateways: &mut [PaymentGatewayProfile]) {
        for gateway in gateways.iter_mut() {
            gateway.is_default = false;
        }
    }
}

#[async_trait]
impl PaymentGatewayRepoTrait for InMemoryGatewayRepo {
    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<PaymentGatewayProfile>> {
        Ok(self.get(id))
    }

    async fn get_default_active(&self) -> AppResult<Option<PaymentGatewayProfile>> {
        Ok(self
            .gateways
            .lock()
            .unwrap()
            .iter()
            .find(|g| g.is_default && g.is_active)
            .cloned())
    }

    async fn list_active_by_provider(
        &self,
        provider: GatewayProvider,
    ) -> AppResult<Vec<PaymentGatewayProfile>> {
        let mut active: Vec<PaymentGatewayProfile> = self
            .gateways
            .lock()
            .unwrap()
            .iter()
            .rev()
            .filter(|g| g.is_active && g.provider == provider)
            .cloned()
            .collect();
        // stable sort keeps newest-first inside each group
        active.sort_by_key(|g| !g.is_default);
        Ok(active)
    }

    async fn list_all(&self) -> AppResult<Vec<PaymentGatewayProfile>> {
        Ok(self.gateways.lock().unwrap().iter().rev().cloned().collect())
    }

    async fn create(&self, record: &GatewayRecord) -> AppResult<PaymentGatewayProfile> {
        let mut gateways = self.gateways.lock().unwrap();
        if record.is_default {
            Self::clear_defaults(&mut gateways);
        }
        let now = Utc::now();
        let mut gateway = PaymentGatewayProfile {
            id: Uuid::new_v4(),
            name: String::new(),
            provider: record.provider,
            environment: record.environment,
            credentials_encrypted: String::new(),
            supported_methods: Vec::new(),
            fee_model: record.fee_model,
            is_active: true,
            is_default: false,
            created_at: Some(now),
            updated_at: Some(now),
        };
        Self::write(&mut gateway, record);
        gateways.push(gateway.clone());
        Ok(gateway)
    }

    async fn update(&self, id: Uuid, record: &GatewayRecord) -> AppResult<PaymentGatewayProfile> {
        let mut gateways = self.gateways.lock().unwrap();
        if !gateways.iter().any(|g| g.id == id) {
            return Err(AppError::NotFound);
        }
        if record.is_default {
            Self::clear_defaults(&mut gateways);
        }
        let gateway = gateways
            .iter_mut()
            .find(|g| g.id == id)
            .ok_or(AppError::NotFound)?;
        Self::write(gateway, record);
        Ok(gateway.clone())
    }

    async fn set_default(&self, id: Uuid) -> AppResult<PaymentGatewayProfile> {
        let mut gateways = self.gateways.lock().unwrap();
        if !gateways.iter().any(|g| g.id == id) {
            return Err(AppError::NotFound);
        }
        Self::clear_defaults(&mut gateways);
        let gateway = gateways
            .iter_mut()
            .find(|g| g.id == id)
            .ok_or(AppError::NotFound)?;
        gateway.is_default = true;
        gateway.updated_at = Some(Utc::now());
        Ok(gateway.clone())
    }
}

/// Registry over `repo` with real provider adapters and [`test_cipher`].
pub fn test_gateway_registry(repo: Arc<InMemoryGatewayRepo>) -> GatewayRegistry {
    let http = build_client(std::time::Duration::from_secs(5)).unwrap();
    let factory = PaymentGatewayFactory::new(test_cipher(), http);
    GatewayRegistry::new(repo, Arc::new(factory), test_cipher())
}

// ============================================================================
// ScriptedGatewayPort
// ============================================================================

#[derive(Default)]
struct PortState {
    charge_calls: usize,
    customer_calls: usize,
    status_calls: usize,
    idempotency_keys: Vec<String>,
    charges_by_key: HashMap<String, String>,
    yield_before_charge: bool,
    cancel_calls: Vec<String>,
    refund_calls: Vec<String>,
    next_charge_error: Option<AppError>,
    next_cancel_error: Option<AppError>,
    status_report: Option<ChargeStatusReport>,
    reject_verification: bool,
}

/// Asaas-flavoured sandbox port whose answers are scripted by the test and
/// whose calls are recorded for assertions. Webhooks use the Asaas body shape.
#[derive(Default)]
pub struct ScriptedGatewayPort {
    state: Mutex<PortState>,
}

impl ScriptedGatewayPort {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next_charge(&self, error: AppError) {
        self.state.lock().unwrap().next_charge_error = Some(error);
    }

    pub fn fail_next_cancel(&self, error: AppError) {
        self.state.lock().unwrap().next_cancel_error = Some(error);
    }

    pub fn set_status_report(&self, report: ChargeStatusReport) {
        self.state.lock().unwrap().status_report = Some(report);
    }

    /// `create_charge` yields to the runtime before answering, so joined
    /// calls interleave around the provider round-trip.
    pub fn yield_before_charge(&self) {
        self.state.lock().unwrap().yield_before_charge = true;
    }

    pub fn reject_verification(&self) {
        self.state.lock().unwrap().reject_verification = true;
    }

    pub fn charge_calls(&self) -> usize {
        self.state.lock().unwrap().charge_calls
    }

    pub fn customer_calls(&self) -> usize {
        self.state.lock().unwrap().customer_calls
    }

    pub fn status_calls(&self) -> usize {
        self.state.lock().unwrap().status_calls
    }

    /// Keys of every `create_charge` call, failed ones included.
    pub fn idempotency_keys(&self) -> Vec<String> {
        self.state.lock().unwrap().idempotency_keys.clone()
    }

    pub fn cancel_calls(&self) -> Vec<String> {
        self.state.lock().unwrap().cancel_calls.clone()
    }

    pub fn refund_calls(&self) -> Vec<String> {
        self.state.lock().unwrap().refund_calls.clone()
    }
}

#[async_trait]
impl PaymentGatewayPort for ScriptedGatewayPort {
    fn provider(&self) -> GatewayProvider {
        GatewayProvider::Asaas
    }

    fn environment(&self) -> GatewayEnvironment {
        GatewayEnvironment::Sandbox
    }

    async fn create_customer(&self, customer: &CustomerData) -> AppResult<ProviderCustomerId> {
        self.state.lock().unwrap().customer_calls += 1;
        Ok(ProviderCustomerId::new(format!("cus_{}", customer.tenant_id.simple())))
    }

    async fn create_charge(&self, request: &ChargeRequest) -> AppResult<ChargeResult> {
        let yield_first = self.state.lock().unwrap().yield_before_charge;
        if yield_first {
            tokio::task::yield_now().await;
        }

        let mut state = self.state.lock().unwrap();
        state.idempotency_keys.push(request.idempotency_key.clone());
        state.charge_calls += 1;
        if let Some(error) = state.next_charge_error.take() {
            return Err(error);
        }

        // providers answer a repeated key with the charge they already made
        let next_id = format!("tx_{}", state.charge_calls);
        let transaction_id = state
            .charges_by_key
            .entry(request.idempotency_key.clone())
            .or_insert(next_id)
            .clone();
        let mut result = ChargeResult {
            transaction_id: transaction_id.clone(),
            state: Some(ChargeState::Status(PaymentStatus::Pending)),
            raw: json!({ "id": transaction_id, "status": "PENDING" }),
            ..Default::default()
        };
        match request.method {
            PaymentMethod::Boleto => {
                result.boleto_url = Some(format!("https://sandbox.test/b/{transaction_id}"));
            }
            PaymentMethod::Pix => {
                result.pix_payload = Some(format!("00020126pix{transaction_id}"));
            }
            PaymentMethod::CreditCard => {}
        }
        Ok(result)
    }

    async fn fetch_charge_status(&self, transaction_id: &str) -> AppResult<ChargeStatusReport> {
        let mut state = self.state.lock().unwrap();
        state.status_calls += 1;
        Ok(state.status_report.clone().unwrap_or_else(|| ChargeStatusReport {
            state: ChargeState::Status(PaymentStatus::Pending),
            raw: json!({ "id": transaction_id, "status": "PENDING" }),
        }))
    }

    async fn cancel_charge(&self, transaction_id: &str) -> AppResult<JsonValue> {
        let mut state = self.state.lock().unwrap();
        if let Some(error) = state.next_cancel_error.take() {
            return Err(error);
        }
        state.cancel_calls.push(transaction_id.to_string());
        Ok(json!({ "id": transaction_id, "deleted": true }))
    }

    async fn refund_charge(&self, transaction_id: &str) -> AppResult<JsonValue> {
        self.state
            .lock()
            .unwrap()
            .refund_calls
            .push(transaction_id.to_string());
        Ok(json!({ "id": transaction_id, "status": "REFUNDED" }))
    }

    fn parse_webhook(&self, payload: &JsonValue) -> AppResult<WebhookFields> {
        parse_asaas_webhook(payload)
    }

    async fn interpret_webhook(
        &self,
        fields: &WebhookFields,
        _payload: &JsonValue,
    ) -> AppResult<Option<ChargeState>> {
        Ok(fields.event_type.as_deref().and_then(asaas_event_state))
    }

    fn verify_webhook(&self, _headers: &WebhookHeaders, _raw_body: &[u8]) -> AppResult<()> {
        if self.state.lock().unwrap().reject_verification {
            return Err(AppError::Unauthorized);
        }
        Ok(())
    }
}
