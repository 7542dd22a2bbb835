use reqwest::Client;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value as JsonValue;

use crate::{
    app_error::{AppError, AppResult},
    infra::http_client::request_error,
};

const MERCADO_PAGO_API_BASE: &str = "https://api.mercadopago.com";

/// Thin REST client for the Mercado Pago payments API. Sandbox and
/// production share one host; the access token selects the environment.
#[derive(Clone)]
pub struct MercadoPagoClient {
    client: Client,
    base_url: String,
    access_token: String,
}

impl MercadoPagoClient {
    pub fn new(client: Client, access_token: String) -> Self {
        Self {
            client,
            base_url: MERCADO_PAGO_API_BASE.to_string(),
            access_token,
        }
    }

    #[cfg(test)]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    // ========================================================================
    // Customers
    // ========================================================================

    pub async fn get_or_create_customer(
        &self,
        request: &MercadoPagoCustomerRequest,
    ) -> AppResult<MercadoPagoCustomer> {
        let response = self
            .client
            .get(format!("{}/v1/customers/search", self.base_url))
            .bearer_auth(&self.access_token)
            .query(&[("email", request.email.as_str())])
            .send()
            .await
            .map_err(|e| request_error("Mercado Pago", e))?;

        let found: MercadoPagoSearch<MercadoPagoCustomer> = self.handle_response(response).await?;
        if let Some(customer) = found.results.into_iter().next() {
            return Ok(customer);
        }

        let response = self
            .client
            .post(format!("{}/v1/customers", self.base_url))
            .bearer_auth(&self.access_token)
            .json(request)
            .send()
            .await
            .map_err(|e| request_error("Mercado Pago", e))?;

        self.handle_response(response).await
    }

    // ========================================================================
    // Payments
    // ========================================================================

    /// `idempotency_key` travels in `X-Idempotency-Key`; Mercado Pago answers
    /// a repeated key with the payment created the first time.
    pub async fn create_payment(
        &self,
        request: &MercadoPagoPaymentRequest,
        idempotency_key: &str,
    ) -> AppResult<JsonValue> {
        let response = self
            .client
            .post(format!("{}/v1/payments", self.base_url))
            .bearer_auth(&self.access_token)
            .header("X-Idempotency-Key", idempotency_key)
            .json(request)
            .send()
            .await
            .map_err(|e| request_error("Mercado Pago", e))?;

        self.handle_response(response).await
    }

    pub async fn get_payment(&self, payment_id: &str) -> AppResult<JsonValue> {
        let response = self
            .client
            .get(format!("{}/v1/payments/{}", self.base_url, payment_id))
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| request_error("Mercado Pago", e))?;

        self.handle_response(response).await
    }

    pub async fn cancel_payment(&self, payment_id: &str) -> AppResult<JsonValue> {
        let response = self
            .client
            .put(format!("{}/v1/payments/{}", self.base_url, payment_id))
            .bearer_auth(&self.access_token)
            .json(&serde_json::json!({ "status": "cancelled" }))
            .send()
            .await
            .map_err(|e| request_error("Mercado Pago", e))?;

        self.handle_response(response).await
    }

    /// Full refund. Keyed by payment id so a retried refund is not issued twice.
    pub async fn refund_payment(&self, payment_id: &str) -> AppResult<JsonValue> {
        let response = self
            .client
            .post(format!("{}/v1/payments/{}/refunds", self.base_url, payment_id))
            .bearer_auth(&self.access_token)
            .header("X-Idempotency-Key", format!("refund-{payment_id}"))
            .json(&serde_json::json!({}))
            .send()
            .await
            .map_err(|e| request_error("Mercado Pago", e))?;

        self.handle_response(response).await
    }

    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> AppResult<T> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| request_error("Mercado Pago", e))?;

        if !status.is_success() {
            tracing::error!(status = %status, body = %body, "Mercado Pago API error");

            if let Ok(error) = serde_json::from_str::<MercadoPagoErrorResponse>(&body) {
                return Err(AppError::Gateway(format!(
                    "Mercado Pago error: {}",
                    error.message.unwrap_or(error.error)
                )));
            }

            return Err(AppError::Gateway(format!("Mercado Pago API error: {status}")));
        }

        serde_json::from_str(&body).map_err(|e| {
            tracing::error!(body = %body, error = %e, "Failed to parse Mercado Pago response");
            AppError::Gateway(format!("Failed to parse Mercado Pago response: {e}"))
        })
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct MercadoPagoCustomerRequest {
    pub email: String,
    pub first_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identification: Option<MercadoPagoIdentification>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MercadoPagoIdentification {
    /// CPF or CNPJ
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub number: String,
}

impl MercadoPagoIdentification {
    pub fn from_tax_id(tax_id: &str) -> Self {
        let number: String = tax_id.chars().filter(char::is_ascii_digit).collect();
        let kind = if number.len() > 11 { "CNPJ" } else { "CPF" };
        Self { kind, number }
    }
}

#[derive(Debug, Deserialize)]
pub struct MercadoPagoCustomer {
    pub id: String,
}

#[derive(Debug, Serialize)]
pub struct MercadoPagoPaymentRequest {
    pub transaction_amount: f64,
    pub description: String,
    /// `pix`, `bolbradesco`; omitted for tokenized cards
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_method_id: Option<&'static str>,
    pub payer: MercadoPagoPayer,
    pub external_reference: String,
    /// RFC 3339 expiry for PIX and boleto
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_of_expiration: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub installments: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct MercadoPagoPayer {
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identification: Option<MercadoPagoIdentification>,
}

#[derive(Debug, Deserialize)]
struct MercadoPagoSearch<T> {
    #[serde(default = "Vec::new")]
    results: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct MercadoPagoErrorResponse {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: String,
}
