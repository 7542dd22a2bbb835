use std::sync::Arc;

use serde_json::Value as JsonValue;
use tracing::info;
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    domain::entities::payment_method::PaymentMethod,
};

use super::{
    gateway_registry::{GatewayRegistry, PaymentGatewayProfile},
    gateway_service::{PaymentGatewayService, PaymentOptions, PaymentRepos, WebhookOutcome},
    payment::PaymentProfile,
};

/// Single entry point for creating, polling and cancelling payments.
/// Callers never see which provider serves a gateway.
#[derive(Clone)]
pub struct PaymentOrchestrator {
    registry: Arc<GatewayRegistry>,
    repos: PaymentRepos,
}

impl PaymentOrchestrator {
    pub fn new(registry: Arc<GatewayRegistry>, repos: PaymentRepos) -> Self {
        Self { registry, repos }
    }

    pub fn registry(&self) -> &Arc<GatewayRegistry> {
        &self.registry
    }

    pub fn service_for(&self, gateway: PaymentGatewayProfile) -> AppResult<PaymentGatewayService> {
        let port = self.registry.port_for(&gateway)?;
        Ok(PaymentGatewayService::new(gateway, port, self.repos.clone()))
    }

    /// Resolve the gateway, reject unsupported methods before any network
    /// call, count the attempt on the invoice, then delegate.
    pub async fn create_payment(
        &self,
        invoice_id: Uuid,
        method: PaymentMethod,
        gateway_id: Option<Uuid>,
        options: PaymentOptions,
    ) -> AppResult<PaymentProfile> {
        let invoice = self
            .repos
            .invoices
            .get_by_id(invoice_id)
            .await?
            .ok_or(AppError::NotFound)?;

        let gateway = self.registry.resolve(gateway_id).await?;
        if !gateway.supports_method(method) {
            return Err(AppError::UnsupportedMethod(method));
        }
        let service = self.service_for(gateway)?;

        self.repos
            .invoices
            .increment_payment_attempts(invoice.id)
            .await?;

        info!(
            invoice_id = %invoice.id,
            gateway_id = %service.gateway().id,
            provider = %service.gateway().provider,
            method = %method,
            "Creating payment"
        );
        service.create_payment(&invoice, method, &options).await
    }

    pub async fn get_payment(&self, payment_id: Uuid) -> AppResult<PaymentProfile> {
        self.repos
            .payments
            .get_by_id(payment_id)
            .await?
            .ok_or(AppError::NotFound)
    }

    /// Every attempt against an invoice, oldest first.
    pub async fn list_payments(&self, invoice_id: Uuid) -> AppResult<Vec<PaymentProfile>> {
        self.repos.payments.list_by_invoice(invoice_id).await
    }

    /// Payments keep their gateway even after it is deactivated, so polling
    /// and cancellation resolve by id without the active check.
    pub async fn check_payment_status(&self, payment_id: Uuid) -> AppResult<PaymentProfile> {
        let payment = self.get_payment(payment_id).await?;
        // completed can still move to refunded upstream
        if payment.status.is_terminal() && !payment.status.is_settled() {
            return Ok(payment);
        }
        let service = self.service_for_payment(&payment).await?;
        service.check_payment_status(&payment).await
    }

    /// Returns whether the payment was cancelled or refunded, and its stored state.
    pub async fn cancel_payment(&self, payment_id: Uuid) -> AppResult<(bool, PaymentProfile)> {
        let payment = self.get_payment(payment_id).await?;
        let service = self.service_for_payment(&payment).await?;
        let cancelled = service.cancel_payment(&payment).await?;
        let payment = self.get_payment(payment_id).await?;
        Ok((cancelled, payment))
    }

    pub async fn process_webhook(
        &self,
        gateway: &PaymentGatewayProfile,
        payload: &JsonValue,
    ) -> AppResult<WebhookOutcome> {
        let service = self.service_for(gateway.clone())?;
        service.process_webhook(payload).await
    }

    async fn service_for_payment(&self, payment: &PaymentProfile) -> AppResult<PaymentGatewayService> {
        let gateway = self.registry.get(payment.gateway_id).await?;
        self.service_for(gateway)
    }
}
