use std::sync::Arc;

use crate::{
    infra::config::AppConfig,
    use_cases::{
        billing_automation::BillingAutomation, gateway_registry::GatewayRegistry,
        invoice::InvoiceUseCases, payment_orchestrator::PaymentOrchestrator,
        webhook_ingestion::WebhookIngestion,
    },
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub registry: Arc<GatewayRegistry>,
    pub orchestrator: Arc<PaymentOrchestrator>,
    pub webhooks: Arc<WebhookIngestion>,
    pub invoices: Arc<InvoiceUseCases>,
    pub billing: Arc<BillingAutomation>,
}
