//! Test wiring for use-case and HTTP-level tests.
//!
//! `TestBilling` owns one set of in-memory repositories seeded with a tenant
//! and a default Asaas gateway. Use cases and `AppState` built from it share
//! those stores, so tests can act through one and assert through the other.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum::http::HeaderValue;
use secrecy::SecretString;
use url::Url;
use uuid::Uuid;

use crate::{
    adapters::http::app_state::AppState,
    infra::{config::AppConfig, http_client::build_client},
    use_cases::{
        billing_automation::{BillingAutomation, BillingSettings},
        gateway_factory::PaymentGatewayFactory,
        gateway_registry::GatewayRegistry,
        gateway_service::PaymentRepos,
        invoice::{InvoiceProfile, InvoiceUseCases},
        payment::PaymentProfile,
        payment_orchestrator::PaymentOrchestrator,
        tenancy::{PlanProfile, SubscriptionProfile},
        webhook_ingestion::WebhookIngestion,
    },
};

use super::{
    InMemoryEmailSender, InMemoryGatewayCustomerRepo, InMemoryGatewayRepo, InMemoryInvoiceRepo,
    InMemoryMessagingSender, InMemoryPaymentRepo, InMemorySubscriptionRepo, InMemoryTenantRepo,
    InMemoryWebhookEventRepo, ScriptedGatewayPort, create_test_gateway, create_test_invoice,
    create_test_payment, create_test_plan, create_test_subscription, create_test_tenant,
    test_cipher,
};

pub const TEST_ADMIN_TOKEN: &str = "test-admin-token";

// ============================================================================
// TestBilling
// ============================================================================

pub struct TestBilling {
    pub tenant_id: Uuid,
    pub gateway_id: Uuid,
    pub tenants: Arc<InMemoryTenantRepo>,
    pub subscriptions: Arc<InMemorySubscriptionRepo>,
    pub invoices: Arc<InMemoryInvoiceRepo>,
    pub payments: Arc<InMemoryPaymentRepo>,
    pub customers: Arc<InMemoryGatewayCustomerRepo>,
    pub gateways: Arc<InMemoryGatewayRepo>,
    pub webhook_events: Arc<InMemoryWebhookEventRepo>,
    pub email: Arc<InMemoryEmailSender>,
    pub messaging: Arc<InMemoryMessagingSender>,
}

impl TestBilling {
    pub fn new() -> Self {
        let tenants = Arc::new(InMemoryTenantRepo::new());
        let tenant = create_test_tenant(|_| {});
        tenants.insert(tenant.clone());

        let gateways = Arc::new(InMemoryGatewayRepo::new());
        let gateway = create_test_gateway(|g| g.is_default = true);
        gateways.insert(gateway.clone());

        let invoices = Arc::new(InMemoryInvoiceRepo::new());
        let payments = Arc::new(InMemoryPaymentRepo::new(invoices.clone()));

        Self {
            tenant_id: tenant.id,
            gateway_id: gateway.id,
            tenants,
            subscriptions: Arc::new(InMemorySubscriptionRepo::new()),
            invoices,
            payments,
            customers: Arc::new(InMemoryGatewayCustomerRepo::new()),
            gateways,
            webhook_events: Arc::new(InMemoryWebhookEventRepo::new()),
            email: Arc::new(InMemoryEmailSender::new()),
            messaging: Arc::new(InMemoryMessagingSender::new()),
        }
    }

    pub fn repos(&self) -> PaymentRepos {
        PaymentRepos {
            tenants: self.tenants.clone(),
            invoices: self.invoices.clone(),
            payments: self.payments.clone(),
            customers: self.customers.clone(),
        }
    }

    /// Invoice owned by the seeded tenant.
    pub fn seed_invoice(&self, overrides: impl FnOnce(&mut InvoiceProfile)) -> InvoiceProfile {
        let tenant_id = self.tenant_id;
        let invoice = create_test_invoice(|i| {
            i.tenant_id = tenant_id;
            overrides(i);
        });
        self.invoices.insert(invoice.clone());
        invoice
    }

    /// Pending payment for the full invoice total on the seeded gateway.
    pub fn seed_payment(
        &self,
        invoice: &InvoiceProfile,
        overrides: impl FnOnce(&mut PaymentProfile),
    ) -> PaymentProfile {
        let gateway_id = self.gateway_id;
        let payment = create_test_payment(|p| {
            p.invoice_id = invoice.id;
            p.tenant_id = invoice.tenant_id;
            p.gateway_id = gateway_id;
            p.amount_cents = invoice.total_cents;
            p.net_amount_cents = invoice.total_cents;
            overrides(p);
        });
        self.payments.insert(payment.clone());
        payment
    }

    /// Active subscription of the seeded tenant on a fresh plan.
    pub fn seed_subscription(
        &self,
        overrides: impl FnOnce(&mut SubscriptionProfile, &mut PlanProfile),
    ) -> (SubscriptionProfile, PlanProfile) {
        let mut plan = create_test_plan(|_| {});
        let mut subscription = create_test_subscription(|s| {
            s.tenant_id = self.tenant_id;
            s.plan_id = plan.id;
        });
        overrides(&mut subscription, &mut plan);
        subscription.plan_id = plan.id;
        self.subscriptions.insert(subscription.clone(), plan.clone());
        (subscription, plan)
    }

    /// Registry over the seeded gateways whose every gateway resolves to `port`.
    pub fn registry(&self, port: Arc<ScriptedGatewayPort>) -> Arc<GatewayRegistry> {
        let http = build_client(Duration::from_secs(5)).unwrap();
        let factory = PaymentGatewayFactory::new(test_cipher(), http).with_port_override(port);
        Arc::new(GatewayRegistry::new(
            self.gateways.clone(),
            Arc::new(factory),
            test_cipher(),
        ))
    }

    pub fn orchestrator(&self, port: Arc<ScriptedGatewayPort>) -> PaymentOrchestrator {
        PaymentOrchestrator::new(self.registry(port), self.repos())
    }

    pub fn ingestion(&self, port: Arc<ScriptedGatewayPort>) -> WebhookIngestion {
        let orchestrator = self.orchestrator(port);
        WebhookIngestion::new(
            orchestrator.registry().clone(),
            orchestrator,
            self.webhook_events.clone(),
        )
    }

    pub fn automation(&self) -> BillingAutomation {
        BillingAutomation::new(
            self.tenants.clone(),
            self.subscriptions.clone(),
            self.invoices.clone(),
            self.email.clone(),
            Some(self.messaging.clone()),
            BillingSettings::default(),
        )
    }
}

impl Default for TestBilling {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TestAppStateBuilder
// ============================================================================

/// Builds an `AppState` over a `TestBilling`'s stores.
///
/// # Example
///
/// ```ignore
/// let billing = TestBilling::new();
/// let invoice = billing.seed_invoice(|_| {});
/// let app_state = TestAppStateBuilder::new(&billing).build();
/// ```
pub struct TestAppStateBuilder<'a> {
    billing: &'a TestBilling,
    port: Arc<ScriptedGatewayPort>,
}

impl<'a> TestAppStateBuilder<'a> {
    pub fn new(billing: &'a TestBilling) -> Self {
        Self {
            billing,
            port: Arc::new(ScriptedGatewayPort::new()),
        }
    }

    pub fn with_port(mut self, port: Arc<ScriptedGatewayPort>) -> Self {
        self.port = port;
        self
    }

    pub fn build(self) -> AppState {
        let config = Arc::new(AppConfig {
            database_url: String::new(),
            bind_addr: "127.0.0.1:3001".parse::<SocketAddr>().unwrap(),
            credentials_key: SecretString::new("unused".into()),
            admin_api_token: SecretString::new(TEST_ADMIN_TOKEN.into()),
            trust_proxy: false,
            resend_api_key: SecretString::new("test_resend_key".into()),
            email_from: "Ponto <billing@ponto.test>".to_string(),
            messaging_api_url: None,
            messaging_api_token: None,
            billing_task_interval: Duration::from_secs(3600),
            overdue_grace_period_days: 7,
            default_invoice_due_day: 10,
            yearly_discount_percent: 10.0,
            provider_request_timeout: Duration::from_secs(5),
            app_origin: Url::parse("http://localhost:3000").unwrap(),
            cors_origin: HeaderValue::from_static("http://localhost:3000"),
        });

        let orchestrator = self.billing.orchestrator(self.port);
        let registry = orchestrator.registry().clone();
        let webhooks = WebhookIngestion::new(
            registry.clone(),
            orchestrator.clone(),
            self.billing.webhook_events.clone(),
        );

        AppState {
            config,
            registry,
            orchestrator: Arc::new(orchestrator),
            webhooks: Arc::new(webhooks),
            invoices: Arc::new(InvoiceUseCases::new(self.billing.invoices.clone())),
            billing: Arc::new(self.billing.automation()),
        }
    }
}
