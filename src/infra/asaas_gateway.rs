use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
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
        asaas_client::{AsaasClient, AsaasCustomerRequest, AsaasPaymentRequest},
        webhook_signature::constant_time_eq,
    },
    use_cases::gateway_registry::GatewayCredentials,
};

pub const ASAAS_TOKEN_HEADER: &str = "asaas-access-token";

/// Asaas keeps `externalReference` under 100 chars; invoice id plus a key
/// prefix fits and still identifies the attempt.
const REFERENCE_KEY_LEN: usize = 32;

/// Asaas charge status vocabulary.
pub fn asaas_status_state(status: &str) -> ChargeState {
    match status {
        "PENDING" | "AWAITING_PAYMENT" => ChargeState::Status(PaymentStatus::Pending),
        "RECEIVED" | "CONFIRMED" | "RECEIVED_IN_CASH" => {
            ChargeState::Status(PaymentStatus::Completed)
        }
        "AUTHORIZED" => ChargeState::Status(PaymentStatus::Approved),
        "AWAITING_RISK_ANALYSIS" => ChargeState::Status(PaymentStatus::Processing),
        "REFUNDED" => ChargeState::Status(PaymentStatus::Refunded),
        "CHARGEBACK_REQUESTED" | "CHARGEBACK_DISPUTE" | "AWAITING_CHARGEBACK_REVERSAL" => {
            ChargeState::Status(PaymentStatus::Chargeback)
        }
        "OVERDUE" | "DUNNING_REQUESTED" | "DUNNING_RECEIVED" => ChargeState::Overdue,
        other => {
            tracing::debug!(status = %other, "Unmapped Asaas status, treating as pending");
            ChargeState::Status(PaymentStatus::Pending)
        }
    }
}

/// Asaas webhook event vocabulary. `None` for events that do not move a charge.
pub fn asaas_event_state(event: &str) -> Option<ChargeState> {
    let state = match event {
        "PAYMENT_RECEIVED" | "PAYMENT_CONFIRMED" => ChargeState::Status(PaymentStatus::Completed),
        "PAYMENT_AUTHORIZED" | "PAYMENT_APPROVED_BY_RISK_ANALYSIS" => {
            ChargeState::Status(PaymentStatus::Approved)
        }
        "PAYMENT_AWAITING_RISK_ANALYSIS" => ChargeState::Status(PaymentStatus::Processing),
        "PAYMENT_REPROVED_BY_RISK_ANALYSIS" | "PAYMENT_CREDIT_CARD_CAPTURE_REFUSED" => {
            ChargeState::Status(PaymentStatus::Failed)
        }
        "PAYMENT_OVERDUE" => ChargeState::Overdue,
        "PAYMENT_REFUNDED" => ChargeState::Status(PaymentStatus::Refunded),
        "PAYMENT_DELETED" => ChargeState::Removed,
        "PAYMENT_CHARGEBACK_REQUESTED" | "PAYMENT_CHARGEBACK_DISPUTE" => {
            ChargeState::Status(PaymentStatus::Chargeback)
        }
        _ => return None,
    };
    Some(state)
}

/// `{"id": "evt_..", "event": "PAYMENT_RECEIVED", "payment": {"id": "pay_.."}}`
pub fn parse_asaas_webhook(payload: &JsonValue) -> AppResult<WebhookFields> {
    let event_type = payload
        .get("event")
        .and_then(JsonValue::as_str)
        .ok_or_else(|| AppError::InvalidInput("Asaas webhook missing event".into()))?;

    Ok(WebhookFields {
        event_id: payload
            .get("id")
            .and_then(JsonValue::as_str)
            .map(str::to_string),
        event_type: Some(event_type.to_string()),
        transaction_id: payload
            .get("payment")
            .and_then(|p| p.get("id"))
            .and_then(JsonValue::as_str)
            .map(str::to_string),
    })
}

/// Constant-time check of the `asaas-access-token` header against the
/// token configured on the gateway.
pub fn verify_asaas_token(expected: Option<&str>, headers: &WebhookHeaders) -> AppResult<()> {
    let Some(expected) = expected else {
        return Ok(());
    };
    match headers.get(ASAAS_TOKEN_HEADER) {
        Some(token) if constant_time_eq(token, expected) => Ok(()),
        Some(_) => Err(AppError::Unauthorized),
        None => Err(AppError::Unauthorized),
    }
}

fn charge_state_of(payment: &JsonValue) -> ChargeState {
    if payment
        .get("deleted")
        .and_then(JsonValue::as_bool)
        .unwrap_or(false)
    {
        return ChargeState::Removed;
    }
    payment
        .get("status")
        .and_then(JsonValue::as_str)
        .map(asaas_status_state)
        .unwrap_or(ChargeState::Status(PaymentStatus::Pending))
}

fn billing_type(method: PaymentMethod) -> &'static str {
    match method {
        PaymentMethod::Boleto => "BOLETO",
        PaymentMethod::Pix => "PIX",
        PaymentMethod::CreditCard => "CREDIT_CARD",
    }
}

fn parse_expiration(value: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|dt| dt.and_utc())
}

fn str_field(value: &JsonValue, key: &str) -> Option<String> {
    value.get(key).and_then(JsonValue::as_str).map(str::to_string)
}

/// Payment gateway port backed by the Asaas API.
#[derive(Clone)]
pub struct AsaasPaymentAdapter {
    client: AsaasClient,
    environment: GatewayEnvironment,
    webhook_token: Option<String>,
}

impl AsaasPaymentAdapter {
    pub fn new(http: Client, credentials: GatewayCredentials, environment: GatewayEnvironment) -> Self {
        Self {
            client: AsaasClient::new(http, credentials.api_key, environment),
            environment,
            webhook_token: credentials.webhook_secret.filter(|s| !s.is_empty()),
        }
    }

    #[cfg(test)]
    fn with_client(mut self, client: AsaasClient) -> Self {
        self.client = client;
        self
    }

    fn external_reference(request: &ChargeRequest) -> String {
        let key_len = request.idempotency_key.len().min(REFERENCE_KEY_LEN);
        format!(
            "{}:{}",
            request.external_reference,
            &request.idempotency_key[..key_len]
        )
    }

    /// Fill the method-specific fields. A charge that exists upstream is
    /// never failed because its QR code or digit line could not be fetched.
    async fn enrich(&self, method: PaymentMethod, result: &mut ChargeResult) {
        match method {
            PaymentMethod::Pix => match self.client.get_pix_qr_code(&result.transaction_id).await {
                Ok(qr) => {
                    result.pix_qr_code_image = qr.encoded_image;
                    result.pix_payload = qr.payload;
                    result.pix_expires_at = qr.expiration_date.as_deref().and_then(parse_expiration);
                }
                Err(e) => tracing::warn!(
                    transaction_id = %result.transaction_id,
                    error = %e,
                    "Asaas PIX QR code unavailable"
                ),
            },
            PaymentMethod::Boleto => {
                match self
                    .client
                    .get_identification_field(&result.transaction_id)
                    .await
                {
                    Ok(field) => {
                        result.boleto_digit_line = field.identification_field;
                        result.boleto_barcode = field.bar_code;
                    }
                    Err(e) => tracing::warn!(
                        transaction_id = %result.transaction_id,
                        error = %e,
                        "Asaas boleto digit line unavailable"
                    ),
                }
            }
            PaymentMethod::CreditCard => {}
        }
    }
}

#[async_trait]
impl PaymentGatewayPort for AsaasPaymentAdapter {
    fn provider(&self) -> GatewayProvider {
        GatewayProvider::Asaas
    }

    fn environment(&self) -> GatewayEnvironment {
        self.environment
    }

    async fn create_customer(&self, customer: &CustomerData) -> AppResult<ProviderCustomerId> {
        let request = AsaasCustomerRequest {
            name: customer.name.clone(),
            email: customer.email.clone(),
            cpf_cnpj: customer.tax_id.clone(),
            mobile_phone: customer.phone.clone(),
            external_reference: customer.tenant_id.to_string(),
            notification_disabled: true,
        };
        let created = self.client.create_customer(&request).await?;
        tracing::info!(
            tenant_id = %customer.tenant_id,
            customer_id = %created.id,
            "Asaas customer created"
        );
        Ok(ProviderCustomerId::new(created.id))
    }

    async fn create_charge(&self, request: &ChargeRequest) -> AppResult<ChargeResult> {
        let reference = Self::external_reference(request);

        // Asaas has no idempotency header; a retried key finds the charge
        // created by the attempt that timed out.
        let raw = match self.client.find_payment_by_reference(&reference).await? {
            Some(existing) => {
                tracing::info!(reference = %reference, "Asaas charge already exists for key");
                existing
            }
            None => {
                let body = AsaasPaymentRequest {
                    customer: request.customer.as_str().to_string(),
                    billing_type: billing_type(request.method),
                    value: cents_to_decimal(request.amount_cents),
                    due_date: request.due_date.format("%Y-%m-%d").to_string(),
                    description: request.description.clone(),
                    external_reference: reference,
                    credit_card_token: request.card_token.clone(),
                };
                self.client.create_payment(&body).await?
            }
        };

        let transaction_id = str_field(&raw, "id")
            .ok_or_else(|| AppError::Gateway("Asaas charge response missing id".into()))?;

        let mut result = ChargeResult {
            transaction_id,
            state: Some(charge_state_of(&raw)),
            boleto_url: str_field(&raw, "bankSlipUrl").or_else(|| str_field(&raw, "invoiceUrl")),
            raw: raw.clone(),
            ..Default::default()
        };
        self.enrich(request.method, &mut result).await;
        Ok(result)
    }

    async fn fetch_charge_status(&self, transaction_id: &str) -> AppResult<ChargeStatusReport> {
        let raw = self.client.get_payment(transaction_id).await?;
        Ok(ChargeStatusReport {
            state: charge_state_of(&raw),
            raw,
        })
    }

    async fn cancel_charge(&self, transaction_id: &str) -> AppResult<JsonValue> {
        self.client.delete_payment(transaction_id).await
    }

    async fn refund_charge(&self, transaction_id: &str) -> AppResult<JsonValue> {
        self.client.refund_payment(transaction_id).await
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

    fn verify_webhook(&self, headers: &WebhookHeaders, _raw_body: &[u8]) -> AppResult<()> {
        verify_asaas_token(self.webhook_token.as_deref(), headers)
    }
}
