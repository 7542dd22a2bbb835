use std::{net::SocketAddr, time::Duration};

use axum::http::HeaderValue;
use env_helpers::{get_env, get_env_default};
use secrecy::SecretString;
use url::Url;

use crate::use_cases::billing_automation::BillingSettings;

pub struct AppConfig {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    /// Base64 AES-256 key sealing gateway credentials at rest.
    pub credentials_key: SecretString,
    /// Bearer token for the internal billing routes.
    pub admin_api_token: SecretString,
    /// Whether to trust X-Forwarded-For for the webhook source IP.
    /// Only enable behind a reverse proxy.
    pub trust_proxy: bool,
    pub resend_api_key: SecretString,
    pub email_from: String,
    /// Optional SMS/WhatsApp relay. Both must be set to enable the channel.
    pub messaging_api_url: Option<Url>,
    pub messaging_api_token: Option<SecretString>,
    pub billing_task_interval: Duration,
    pub overdue_grace_period_days: i64,
    pub default_invoice_due_day: u32,
    pub yearly_discount_percent: f64,
    pub provider_request_timeout: Duration,
    pub app_origin: Url,
    pub cors_origin: HeaderValue,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let database_url: String = get_env("DATABASE_URL");
        let bind_addr: SocketAddr =
            get_env_default("BIND_ADDR", SocketAddr::from(([127, 0, 0, 1], 3001)));
        let credentials_key = SecretString::new(get_env::<String>("CREDENTIALS_KEY").into());
        let admin_api_token = SecretString::new(get_env::<String>("ADMIN_API_TOKEN").into());
        // Default to false: only behind a trusted proxy
        let trust_proxy: bool = get_env_default("TRUST_PROXY", false);

        let resend_api_key = SecretString::new(get_env::<String>("RESEND_API_KEY").into());
        let email_from: String = get_env("EMAIL_FROM");

        let messaging_api_url: Option<Url> = std::env::var("MESSAGING_API_URL")
            .ok()
            .and_then(|s| s.parse().ok());
        let messaging_api_token: Option<SecretString> = std::env::var("MESSAGING_API_TOKEN")
            .ok()
            .filter(|s| !s.is_empty())
            .map(|s| SecretString::new(s.into()));

        let billing_task_interval_secs: u64 = get_env_default("BILLING_TASK_INTERVAL_SECS", 86_400);
        let overdue_grace_period_days: i64 = get_env_default("OVERDUE_GRACE_PERIOD_DAYS", 7);
        let default_invoice_due_day: u32 = get_env_default("DEFAULT_INVOICE_DUE_DAY", 10);
        let yearly_discount_percent: f64 = get_env_default("YEARLY_DISCOUNT_PERCENT", 10.0);
        let provider_request_timeout_secs: u64 =
            get_env_default("PROVIDER_REQUEST_TIMEOUT_SECS", 30);

        let app_origin: Url = get_env_default(
            "APP_ORIGIN",
            Url::parse("http://localhost:3000").expect("static url"),
        );
        let cors_origin: HeaderValue = get_env_default(
            "CORS_ORIGIN",
            app_origin.as_str().trim_end_matches('/').to_string(),
        )
        .parse()
        .expect("CORS_ORIGIN must be a valid header value");

        Self {
            database_url,
            bind_addr,
            credentials_key,
            admin_api_token,
            trust_proxy,
            resend_api_key,
            email_from,
            messaging_api_url,
            messaging_api_token,
            billing_task_interval: Duration::from_secs(billing_task_interval_secs.max(1)),
            overdue_grace_period_days,
            default_invoice_due_day: default_invoice_due_day.clamp(1, 31),
            yearly_discount_percent,
            provider_request_timeout: Duration::from_secs(provider_request_timeout_secs.max(1)),
            app_origin,
            cors_origin,
        }
    }

    pub fn billing_settings(&self) -> BillingSettings {
        BillingSettings {
            grace_period_days: self.overdue_grace_period_days,
            default_due_day: self.default_invoice_due_day,
            yearly_discount_percent: self.yearly_discount_percent,
            app_origin: self.app_origin.as_str().trim_end_matches('/').to_string(),
        }
    }
}
