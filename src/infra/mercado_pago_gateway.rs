use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde_json::Value as JsonValue;

use crate::{
    app_error::{AppError, AppResult},
    application::ports::payment_gateway::{
        ChargeRequest, ChargeResult, ChargeState, ChargeStatusReport, CustomerData,
        PaymentGatewayPort, ProviderCustomerId, WebhookFields, WebhookHeaders,
    },
    domain::entities::{
        gateway_environment::GatewayEnvironment, gateway_provider::GatewayProvider,
        money::cents_to_decimal, payment_method::PaymentMethod, payment_status::PaymentStatus,
    },
    infra::{
        mercado_pago_client::{
            MercadoPagoClient, MercadoPagoCustomerRequest, MercadoPagoIdentification,
            MercadoPagoPayer, MercadoPagoPaymentRequest,
        },
        webhook_signature::{constant_time_eq, hmac_sha256_hex, signature_parts},
    },
    use_cases::gateway_registry::GatewayCredentials,
};

pub const MERCADO_PAGO_SIGNATURE_HEADER: &str = "x-signature";
pub const MERCADO_PAGO_REQUEST_ID_HEADER: &str = "x-request-id";

/// Mercado Pago payment status vocabulary.
pub fn mercado_pago_status_state(status: &str) -> ChargeState {
    let status = match status {
        "pending" => PaymentStatus::Pending,
        "approved" => PaymentStatus::Completed,
        "authorized" => PaymentStatus::Approved,
        "in_process" | "in_mediation" => PaymentStatus::Processing,
        "rejected" => PaymentStatus::Failed,
        "cancelled" => PaymentStatus::Cancelled,
        "refunded" => PaymentStatus::Refunded,
        "charged_back" => PaymentStatus::Chargeback,
        other => {
            tracing::debug!(status = %other, "Unmapped Mercado Pago status, treating as pending");
            PaymentStatus::Pending
        }
    };
    ChargeState::Status(status)
}

fn id_string(value: Option<&JsonValue>) -> Option<String> {
    match value? {
        JsonValue::String(s) if !s.is_empty() => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn is_payment_topic(event_type: &str) -> bool {
    event_type == "payment" || event_type.starts_with("payment.")
}

/// `{"id": 1, "type": "payment", "action": "payment.updated", "data": {"id": "123"}}`
pub fn parse_mercado_pago_webhook(payload: &JsonValue) -> AppResult<WebhookFields> {
    let event_type = payload
        .get("action")
        .or_else(|| payload.get("type"))
        .and_then(JsonValue::as_str)
        .ok_or_else(|| AppError::InvalidInput("Mercado Pago webhook missing action/type".into()))?;

    let is_payment = is_payment_topic(event_type)
        || payload.get("type").and_then(JsonValue::as_str) == Some("payment");

    Ok(WebhookFields {
        event_id: id_string(payload.get("id")),
        event_type: Some(event_type.to_string()),
        transaction_id: if is_payment {
            id_string(payload.get("data").and_then(|d| d.get("id")))
        } else {
            None
        },
    })
}

/// Check `x-signature: ts=..,v1=..` as HMAC-SHA256 over
/// `id:{data.id};request-id:{x-request-id};ts:{ts};`.
pub fn verify_mercado_pago_signature(
    secret: &str,
    headers: &WebhookHeaders,
    raw_body: &[u8],
) -> AppResult<()> {
    let header = headers
        .get(MERCADO_PAGO_SIGNATURE_HEADER)
        .ok_or(AppError::Unauthorized)?;
    let request_id = headers
        .get(MERCADO_PAGO_REQUEST_ID_HEADER)
        .ok_or(AppError::Unauthorized)?;

    let parts = signature_parts(header);
    let ts = parts
        .iter()
        .find(|(k, _)| *k == "ts")
        .map(|(_, v)| *v)
        .ok_or(AppError::Unauthorized)?;
    let v1 = parts
        .iter()
        .find(|(k, _)| *k == "v1")
        .map(|(_, v)| *v)
        .ok_or(AppError::Unauthorized)?;

    let body: JsonValue = serde_json::from_slice(raw_body)
        .map_err(|e| AppError::InvalidInput(format!("invalid JSON body: {e}")))?;
    let data_id = id_string(body.get("data").and_then(|d| d.get("id")))
        .map(|id| id.to_lowercase())
        .unwrap_or_default();

    let manifest = format!("id:{data_id};request-id:{request_id};ts:{ts};");
    let expected = hmac_sha256_hex(secret, &manifest);
    if constant_time_eq(v1, &expected) {
        Ok(())
    } else {
        Err(AppError::Unauthorized)
    }
}

fn charge_state_of(payment: &JsonValue) -> ChargeState {
    payment
        .get("status")
        .and_then(JsonValue::as_str)
        .map(mercado_pago_status_state)
        .unwrap_or(ChargeState::Status(PaymentStatus::Pending))
}

fn pointer_str(value: &JsonValue, pointer: &str) -> Option<String> {
    value
        .pointer(pointer)
        .and_then(JsonValue::as_str)
        .map(str::to_string)
}

/// Payment gateway port backed by the Mercado Pago API.
#[derive(Clone)]
pub struct MercadoPagoPaymentAdapter {
    client: MercadoPagoClient,
    environment: GatewayEnvironment,
    webhook_secret: Option<String>,
}

impl MercadoPagoPaymentAdapter {
    pub fn new(http: Client, credentials: GatewayCredentials, environment: GatewayEnvironment) -> Self {
        Self {
            client: MercadoPagoClient::new(http, credentials.api_key),
            environment,
            webhook_secret: credentials.webhook_secret.filter(|s| !s.is_empty()),
        }
    }

    #[cfg(test)]
    fn with_client(mut self, client: MercadoPagoClient) -> Self {
        self.client = client;
        self
    }

    fn payment_request(request: &ChargeRequest) -> MercadoPagoPaymentRequest {
        let (payment_method_id, date_of_expiration, token, installments) = match request.method {
            PaymentMethod::Pix => (Some("pix"), Some(expiration(request)), None, None),
            PaymentMethod::Boleto => (Some("bolbradesco"), Some(expiration(request)), None, None),
            PaymentMethod::CreditCard => (None, None, request.card_token.clone(), Some(1)),
        };

        MercadoPagoPaymentRequest {
            transaction_amount: cents_to_decimal(request.amount_cents),
            description: request.description.clone(),
            payment_method_id,
            payer: MercadoPagoPayer {
                email: request.payer_email.clone(),
                id: Some(request.customer.as_str().to_string()),
                identification: None,
            },
            external_reference: request.external_reference.clone(),
            date_of_expiration,
            token,
            installments,
        }
    }
}

/// End of the due day, Brasília time.
fn expiration(request: &ChargeRequest) -> String {
    format!("{}T23:59:59.000-03:00", request.due_date.format("%Y-%m-%d"))
}

#[async_trait]
impl PaymentGatewayPort for MercadoPagoPaymentAdapter {
    fn provider(&self) -> GatewayProvider {
        GatewayProvider::MercadoPago
    }

    fn environment(&self) -> GatewayEnvironment {
        self.environment
    }

    async fn create_customer(&self, customer: &CustomerData) -> AppResult<ProviderCustomerId> {
        let request = MercadoPagoCustomerRequest {
            email: customer.email.clone(),
            first_name: customer.name.clone(),
            identification: customer
                .tax_id
                .as_deref()
                .map(MercadoPagoIdentification::from_tax_id),
        };
        let created = self.client.get_or_create_customer(&request).await?;
        tracing::info!(
            tenant_id = %customer.tenant_id,
            customer_id = %created.id,
            "Mercado Pago customer resolved"
        );
        Ok(ProviderCustomerId::new(created.id))
    }

    async fn create_charge(&self, request: &ChargeRequest) -> AppResult<ChargeResult> {
        let body = Self::payment_request(request);
        let raw = self
            .client
            .create_payment(&body, &request.idempotency_key)
            .await?;

        let transaction_id = id_string(raw.get("id"))
            .ok_or_else(|| AppError::Gateway("Mercado Pago payment response missing id".into()))?;

        Ok(ChargeResult {
            transaction_id,
            state: Some(charge_state_of(&raw)),
            boleto_url: pointer_str(&raw, "/transaction_details/external_resource_url"),
            boleto_barcode: pointer_str(&raw, "/barcode/content"),
            boleto_digit_line: pointer_str(&raw, "/transaction_details/digitable_line"),
            pix_qr_code_image: pointer_str(&raw, "/point_of_interaction/transaction_data/qr_code_base64"),
            pix_payload: pointer_str(&raw, "/point_of_interaction/transaction_data/qr_code"),
            pix_expires_at: pointer_str(&raw, "/date_of_expiration")
                .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
                .map(|dt| dt.with_timezone(&Utc)),
            raw,
        })
    }

    async fn fetch_charge_status(&self, transaction_id: &str) -> AppResult<ChargeStatusReport> {
        let raw = self.client.get_payment(transaction_id).await?;
        Ok(ChargeStatusReport {
            state: charge_state_of(&raw),
            raw,
        })
    }

    async fn cancel_charge(&self, transaction_id: &str) -> AppResult<JsonValue> {
        self.client.cancel_payment(transaction_id).await
    }

    async fn refund_charge(&self, transaction_id: &str) -> AppResult<JsonValue> {
        self.client.refund_payment(transaction_id).await
    }

    fn parse_webhook(&self, payload: &JsonValue) -> AppResult<WebhookFields> {
        parse_mercado_pago_webhook(payload)
    }

    /// Notifications carry only the payment id; the status is fetched.
    async fn interpret_webhook(
        &self,
        fields: &WebhookFields,
        _payload: &JsonValue,
    ) -> AppResult<Option<ChargeState>> {
        let Some(transaction_id) = fields.transaction_id.as_deref() else {
            return Ok(None);
        };
        let report = self.fetch_charge_status(transaction_id).await?;
        Ok(Some(report.state))
    }

    fn verify_webhook(&self, headers: &WebhookHeaders, raw_body: &[u8]) -> AppResult<()> {
        match self.webhook_secret.as_deref() {
            Some(secret) => verify_mercado_pago_signature(secret, headers, raw_body),
            None => Ok(()),
        }
    }
}
