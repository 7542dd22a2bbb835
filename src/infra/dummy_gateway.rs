use async_trait::async_trait;
use chrono::{Duration, NaiveTime, Utc};
use serde_json::{Value as JsonValue, json};
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::ports::payment_gateway::{
        ChargeRequest, ChargeResult, ChargeState, ChargeStatusReport, CustomerData,
        PaymentGatewayPort, ProviderCustomerId, WebhookFields,
    },
    domain::entities::{
        gateway_environment::GatewayEnvironment, gateway_provider::GatewayProvider,
        payment_method::PaymentMethod, payment_status::PaymentStatus,
    },
};

/// Card tokens with this prefix are declined.
pub const DUMMY_DECLINE_TOKEN_PREFIX: &str = "decline";

/// Sandbox provider that never leaves the process.
///
/// Charge ids derive from the idempotency key, so a retried request yields
/// the same charge. Card charges settle immediately; boleto and PIX stay
/// pending until a webhook of the form
/// `{"id": "evt_1", "event": "payment.status", "transaction_id": "..", "status": "completed"}`
/// moves them.
#[derive(Clone)]
pub struct DummyPaymentClient {
    gateway_id: Uuid,
}

impl DummyPaymentClient {
    pub fn new(gateway_id: Uuid) -> Self {
        Self { gateway_id }
    }

    fn transaction_id(&self, request: &ChargeRequest) -> String {
        let prefix = match request.method {
            PaymentMethod::Boleto => "dummy_bol",
            PaymentMethod::Pix => "dummy_pix",
            PaymentMethod::CreditCard => "dummy_card",
        };
        let key_len = request.idempotency_key.len().min(24);
        format!("{}_{}", prefix, &request.idempotency_key[..key_len])
    }
}

fn state_from_label(label: &str) -> Option<ChargeState> {
    match label {
        "overdue" => Some(ChargeState::Overdue),
        "removed" | "deleted" => Some(ChargeState::Removed),
        other => other.parse::<PaymentStatus>().ok().map(ChargeState::Status),
    }
}

#[async_trait]
impl PaymentGatewayPort for DummyPaymentClient {
    fn provider(&self) -> GatewayProvider {
        GatewayProvider::Dummy
    }

    fn environment(&self) -> GatewayEnvironment {
        GatewayEnvironment::Sandbox
    }

    async fn create_customer(&self, customer: &CustomerData) -> AppResult<ProviderCustomerId> {
        let customer_id = ProviderCustomerId::new(format!("dummy_cus_{}", customer.tenant_id));
        tracing::debug!(
            gateway_id = %self.gateway_id,
            customer_id = %customer_id,
            "Dummy: Created customer"
        );
        Ok(customer_id)
    }

    async fn create_charge(&self, request: &ChargeRequest) -> AppResult<ChargeResult> {
        let transaction_id = self.transaction_id(request);
        tracing::debug!(
            gateway_id = %self.gateway_id,
            transaction_id = %transaction_id,
            method = %request.method,
            amount_cents = request.amount_cents,
            "Dummy: Creating charge"
        );

        let mut result = ChargeResult {
            transaction_id: transaction_id.clone(),
            state: Some(ChargeState::Status(PaymentStatus::Pending)),
            raw: json!({
                "id": transaction_id,
                "amount_cents": request.amount_cents,
                "method": request.method,
                "status": "pending",
            }),
            ..Default::default()
        };

        match request.method {
            PaymentMethod::Boleto => {
                result.boleto_url = Some(format!("https://sandbox.invalid/boleto/{transaction_id}"));
                result.boleto_barcode = Some(format!("23790{:0>39}", request.amount_cents));
                result.boleto_digit_line = Some(format!("23790.00000 00000.000000 {:0>14}", request.amount_cents));
            }
            PaymentMethod::Pix => {
                result.pix_payload = Some(format!("00020126580014br.gov.bcb.pix{transaction_id}"));
                result.pix_qr_code_image = Some(String::new());
                result.pix_expires_at = Some(
                    request
                        .due_date
                        .and_time(NaiveTime::MIN)
                        .and_utc()
                        + Duration::days(1),
                );
            }
            PaymentMethod::CreditCard => {
                let token = request.card_token.as_deref().unwrap_or_default();
                if token.starts_with(DUMMY_DECLINE_TOKEN_PREFIX) {
                    return Err(AppError::Gateway("Dummy: card declined".into()));
                }
                result.state = Some(ChargeState::Status(PaymentStatus::Completed));
                result.raw["status"] = json!("completed");
                result.raw["paid_at"] = json!(Utc::now());
            }
        }

        Ok(result)
    }

    async fn fetch_charge_status(&self, transaction_id: &str) -> AppResult<ChargeStatusReport> {
        let status = if transaction_id.starts_with("dummy_card") {
            PaymentStatus::Completed
        } else {
            PaymentStatus::Pending
        };
        Ok(ChargeStatusReport {
            state: ChargeState::Status(status),
            raw: json!({ "id": transaction_id, "status": status }),
        })
    }

    async fn cancel_charge(&self, transaction_id: &str) -> AppResult<JsonValue> {
        Ok(json!({ "id": transaction_id, "status": "cancelled" }))
    }

    async fn refund_charge(&self, transaction_id: &str) -> AppResult<JsonValue> {
        Ok(json!({ "id": transaction_id, "status": "refunded" }))
    }

    fn parse_webhook(&self, payload: &JsonValue) -> AppResult<WebhookFields> {
        let event_type = payload
            .get("event")
            .and_then(JsonValue::as_str)
            .ok_or_else(|| AppError::InvalidInput("Dummy webhook missing event".into()))?;
        Ok(WebhookFields {
            event_id: payload.get("id").and_then(JsonValue::as_str).map(str::to_string),
            event_type: Some(event_type.to_string()),
            transaction_id: payload
                .get("transaction_id")
                .and_then(JsonValue::as_str)
                .map(str::to_string),
        })
    }

    async fn interpret_webhook(
        &self,
        _fields: &WebhookFields,
        payload: &JsonValue,
    ) -> AppResult<Option<ChargeState>> {
        Ok(payload
            .get("status")
            .and_then(JsonValue::as_str)
            .and_then(state_from_label))
    }
}
