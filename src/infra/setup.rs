use std::sync::Arc;

use secrecy::ExposeSecret;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::{
    adapters::{
        email::resend::ResendEmailSender, http::app_state::AppState,
        messaging::http_messaging::HttpMessagingSender,
    },
    application::ports::notifications::MessagingSender,
    infra::{
        InfraError, config::AppConfig, crypto::CredentialCipher, http_client::build_client,
        postgres_persistence,
    },
    use_cases::{
        billing_automation::BillingAutomation,
        gateway_factory::PaymentGatewayFactory,
        gateway_registry::{GatewayRegistry, PaymentGatewayRepoTrait},
        gateway_service::PaymentRepos,
        invoice::{InvoiceRepoTrait, InvoiceUseCases},
        payment::{GatewayCustomerRepoTrait, PaymentRepoTrait},
        payment_orchestrator::PaymentOrchestrator,
        tenancy::{SubscriptionRepoTrait, TenantRepoTrait},
        webhook_ingestion::{WebhookEventRepoTrait, WebhookIngestion},
    },
};

pub async fn init_app_state() -> anyhow::Result<AppState> {
    let config = AppConfig::from_env();

    let cipher = CredentialCipher::new_from_base64(config.credentials_key.expose_secret())
        .map_err(InfraError::CipherInit)?;
    let http = build_client(config.provider_request_timeout).map_err(InfraError::HttpClient)?;
    let postgres_arc = Arc::new(postgres_persistence(&config.database_url).await?);

    let tenant_repo = postgres_arc.clone() as Arc<dyn TenantRepoTrait>;
    let subscription_repo = postgres_arc.clone() as Arc<dyn SubscriptionRepoTrait>;
    let invoice_repo = postgres_arc.clone() as Arc<dyn InvoiceRepoTrait>;
    let payment_repo = postgres_arc.clone() as Arc<dyn PaymentRepoTrait>;
    let customer_repo = postgres_arc.clone() as Arc<dyn GatewayCustomerRepoTrait>;
    let gateway_repo = postgres_arc.clone() as Arc<dyn PaymentGatewayRepoTrait>;
    let webhook_repo = postgres_arc.clone() as Arc<dyn WebhookEventRepoTrait>;

    let email = Arc::new(ResendEmailSender::new(
        http.clone(),
        config.resend_api_key.clone(),
        config.email_from.clone(),
    ));

    let messaging: Option<Arc<dyn MessagingSender>> =
        match (&config.messaging_api_url, &config.messaging_api_token) {
            (Some(url), Some(token)) => Some(Arc::new(HttpMessagingSender::new(
                http.clone(),
                url.clone(),
                token.clone(),
            ))),
            _ => {
                tracing::info!("Messaging channel not configured, reminders go by email only");
                None
            }
        };

    let factory = Arc::new(PaymentGatewayFactory::new(cipher.clone(), http));
    let registry = Arc::new(GatewayRegistry::new(gateway_repo, factory, cipher));

    let repos = PaymentRepos {
        tenants: tenant_repo.clone(),
        invoices: invoice_repo.clone(),
        payments: payment_repo,
        customers: customer_repo,
    };
    let orchestrator = PaymentOrchestrator::new(registry.clone(), repos);
    let webhooks = WebhookIngestion::new(registry.clone(), orchestrator.clone(), webhook_repo);

    let billing = BillingAutomation::new(
        tenant_repo,
        subscription_repo,
        invoice_repo.clone(),
        email,
        messaging,
        config.billing_settings(),
    );

    Ok(AppState {
        config: Arc::new(config),
        registry,
        orchestrator: Arc::new(orchestrator),
        webhooks: Arc::new(webhooks),
        invoices: Arc::new(InvoiceUseCases::new(invoice_repo)),
        billing: Arc::new(billing),
    })
}

/// Pretty console output by default; one JSON object per line with `LOG_JSON=true`.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "ponto_billing=debug,tower_http=info".into());

    let json = std::env::var("LOG_JSON")
        .map(|v| matches!(v.as_str(), "1" | "true"))
        .unwrap_or(false);

    let (console_layer, json_layer) = if json {
        let layer = fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true);
        (None, Some(layer))
    } else {
        let layer = fmt::layer()
            .with_target(false)
            .with_level(true)
            .pretty();
        (Some(layer), None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(json_layer)
        .try_init()
        .ok();
}
