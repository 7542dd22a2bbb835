use reqwest::Client;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value as JsonValue;

use crate::{
    app_error::{AppError, AppResult},
    domain::entities::gateway_environment::GatewayEnvironment,
    infra::http_client::request_error,
};

const ASAAS_SANDBOX_BASE: &str = "https://sandbox.asaas.com/api/v3";
const ASAAS_PRODUCTION_BASE: &str = "https://api.asaas.com/v3";

/// Thin REST client for the Asaas v3 API.
#[derive(Clone)]
pub struct AsaasClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl AsaasClient {
    pub fn new(client: Client, api_key: String, environment: GatewayEnvironment) -> Self {
        let base_url = match environment {
            GatewayEnvironment::Sandbox => ASAAS_SANDBOX_BASE,
            GatewayEnvironment::Production => ASAAS_PRODUCTION_BASE,
        };
        Self {
            client,
            base_url: base_url.to_string(),
            api_key,
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

    pub async fn create_customer(&self, request: &AsaasCustomerRequest) -> AppResult<AsaasCustomer> {
        let response = self
            .client
            .post(format!("{}/customers", self.base_url))
            .header("access_token", &self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| request_error("Asaas", e))?;

        self.handle_response(response).await
    }

    // ========================================================================
    // Payments
    // ========================================================================

    pub async fn create_payment(&self, request: &AsaasPaymentRequest) -> AppResult<JsonValue> {
        let response = self
            .client
            .post(format!("{}/payments", self.base_url))
            .header("access_token", &self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| request_error("Asaas", e))?;

        self.handle_response(response).await
    }

    /// First live charge carrying `external_reference`, if any.
    pub async fn find_payment_by_reference(
        &self,
        external_reference: &str,
    ) -> AppResult<Option<JsonValue>> {
        let response = self
            .client
            .get(format!("{}/payments", self.base_url))
            .header("access_token", &self.api_key)
            .query(&[("externalReference", external_reference), ("limit", "1")])
            .send()
            .await
            .map_err(|e| request_error("Asaas", e))?;

        let list: AsaasList = self.handle_response(response).await?;
        Ok(list
            .data
            .into_iter()
            .find(|p| !p.get("deleted").and_then(JsonValue::as_bool).unwrap_or(false)))
    }

    pub async fn get_payment(&self, payment_id: &str) -> AppResult<JsonValue> {
        let response = self
            .client
            .get(format!("{}/payments/{}", self.base_url, payment_id))
            .header("access_token", &self.api_key)
            .send()
            .await
            .map_err(|e| request_error("Asaas", e))?;

        self.handle_response(response).await
    }

    pub async fn get_pix_qr_code(&self, payment_id: &str) -> AppResult<AsaasPixQrCode> {
        let response = self
            .client
            .get(format!("{}/payments/{}/pixQrCode", self.base_url, payment_id))
            .header("access_token", &self.api_key)
            .send()
            .await
            .map_err(|e| request_error("Asaas", e))?;

        self.handle_response(response).await
    }

    pub async fn get_identification_field(
        &self,
        payment_id: &str,
    ) -> AppResult<AsaasIdentificationField> {
        let response = self
            .client
            .get(format!(
                "{}/payments/{}/identificationField",
                self.base_url, payment_id
            ))
            .header("access_token", &self.api_key)
            .send()
            .await
            .map_err(|e| request_error("Asaas", e))?;

        self.handle_response(response).await
    }

    pub async fn delete_payment(&self, payment_id: &str) -> AppResult<JsonValue> {
        let response = self
            .client
            .delete(format!("{}/payments/{}", self.base_url, payment_id))
            .header("access_token", &self.api_key)
            .send()
            .await
            .map_err(|e| request_error("Asaas", e))?;

        self.handle_response(response).await
    }

    pub async fn refund_payment(&self, payment_id: &str) -> AppResult<JsonValue> {
        let response = self
            .client
            .post(format!("{}/payments/{}/refund", self.base_url, payment_id))
            .header("access_token", &self.api_key)
            .json(&serde_json::json!({}))
            .send()
            .await
            .map_err(|e| request_error("Asaas", e))?;

        self.handle_response(response).await
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> AppResult<T> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| request_error("Asaas", e))?;

        if !status.is_success() {
            tracing::error!(status = %status, body = %body, "Asaas API error");

            if let Ok(error) = serde_json::from_str::<AsaasErrorResponse>(&body) {
                let message = error
                    .errors
                    .into_iter()
                    .map(|e| e.description)
                    .collect::<Vec<_>>()
                    .join("; ");
                if !message.is_empty() {
                    return Err(AppError::Gateway(format!("Asaas error: {message}")));
                }
            }

            return Err(AppError::Gateway(format!("Asaas API error: {status}")));
        }

        serde_json::from_str(&body).map_err(|e| {
            tracing::error!(body = %body, error = %e, "Failed to parse Asaas response");
            AppError::Gateway(format!("Failed to parse Asaas response: {e}"))
        })
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AsaasCustomerRequest {
    pub name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpf_cnpj: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mobile_phone: Option<String>,
    pub external_reference: String,
    pub notification_disabled: bool,
}

#[derive(Debug, Deserialize)]
pub struct AsaasCustomer {
    pub id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AsaasPaymentRequest {
    pub customer: String,
    /// BOLETO, PIX or CREDIT_CARD
    pub billing_type: &'static str,
    /// Decimal reais
    pub value: f64,
    /// YYYY-MM-DD
    pub due_date: String,
    pub description: String,
    pub external_reference: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credit_card_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AsaasPixQrCode {
    pub encoded_image: Option<String>,
    pub payload: Option<String>,
    /// `YYYY-MM-DD HH:MM:SS`, Brasília time
    pub expiration_date: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AsaasIdentificationField {
    pub identification_field: Option<String>,
    pub bar_code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AsaasList {
    #[serde(default)]
    data: Vec<JsonValue>,
}

#[derive(Debug, Deserialize)]
struct AsaasErrorResponse {
    #[serde(default)]
    errors: Vec<AsaasError>,
}

#[derive(Debug, Deserialize)]
struct AsaasError {
    #[serde(default)]
    description: String,
}
