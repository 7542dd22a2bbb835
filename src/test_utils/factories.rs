//! Test data factories for creating valid test fixtures.
//!
//! Each factory function creates a complete, valid object with sensible defaults.
//! Use the closure parameter to override specific fields as needed.

use base64::{Engine, engine::general_purpose::STANDARD};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use uuid::Uuid;

use crate::{
    domain::entities::{
        gateway_environment::GatewayEnvironment,
        gateway_provider::GatewayProvider,
        invoice::{InvoiceLineItem, InvoiceStatus},
        money::FeeModel,
        payment_method::PaymentMethod,
        payment_status::PaymentStatus,
        subscription::{BillingCycle, SubscriptionStatus},
    },
    infra::crypto::CredentialCipher,
    use_cases::{
        gateway_registry::PaymentGatewayProfile,
        invoice::InvoiceProfile,
        payment::PaymentProfile,
        tenancy::{PlanProfile, SubscriptionMetadata, SubscriptionProfile, TenantProfile},
    },
};

/// Cipher with a fixed all-zero key.
pub fn test_cipher() -> CredentialCipher {
    CredentialCipher::new_from_base64(&STANDARD.encode([0u8; 32])).unwrap()
}

fn test_datetime() -> DateTime<Utc> {
    Utc::now()
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Create a test tenant with billing contact data.
pub fn create_test_tenant(overrides: impl FnOnce(&mut TenantProfile)) -> TenantProfile {
    let mut tenant = TenantProfile {
        id: Uuid::new_v4(),
        name: "Acme Ltda".to_string(),
        email: "billing@acme.test".to_string(),
        phone: Some("+55 11 98765-4321".to_string()),
        tax_id: Some("12.345.678/0001-95".to_string()),
        is_active: true,
        deactivated_at: None,
        deactivation_reason: None,
        created_at: Some(test_datetime()),
        updated_at: Some(test_datetime()),
    };
    overrides(&mut tenant);
    tenant
}

pub fn create_test_plan(overrides: impl FnOnce(&mut PlanProfile)) -> PlanProfile {
    let mut plan = PlanProfile {
        id: Uuid::new_v4(),
        name: "Plano Profissional".to_string(),
        price_cents: 9_900,
        billing_cycle: BillingCycle::Monthly,
        trial_days: 0,
    };
    overrides(&mut plan);
    plan
}

/// Active since 2025-01-01 with no end date.
pub fn create_test_subscription(
    overrides: impl FnOnce(&mut SubscriptionProfile),
) -> SubscriptionProfile {
    let mut subscription = SubscriptionProfile {
        id: Uuid::new_v4(),
        tenant_id: Uuid::new_v4(),
        plan_id: Uuid::new_v4(),
        status: SubscriptionStatus::Active,
        start_date: date(2025, 1, 1),
        end_date: None,
        custom_price_cents: None,
        metadata: SubscriptionMetadata::default(),
        suspended_at: None,
        suspension_reason: None,
        suspension_notified_at: None,
        created_at: Some(test_datetime()),
        updated_at: Some(test_datetime()),
    };
    overrides(&mut subscription);
    subscription
}

/// Pending R$ 99,00 invoice due in two weeks.
pub fn create_test_invoice(overrides: impl FnOnce(&mut InvoiceProfile)) -> InvoiceProfile {
    let now = test_datetime();
    let today = now.date_naive();
    let id = Uuid::new_v4();

    let mut invoice = InvoiceProfile {
        id,
        tenant_id: Uuid::new_v4(),
        subscription_id: Uuid::new_v4(),
        number: format!("INV-TEST-{}", &id.simple().to_string()[..8].to_uppercase()),
        period_start: today,
        period_end: today + Duration::days(30),
        line_items: vec![InvoiceLineItem::new("Plano Profissional", 1, 9_900)],
        subtotal_cents: 9_900,
        discount_cents: 0,
        tax_cents: 0,
        total_cents: 9_900,
        issue_date: today,
        due_date: today + Duration::days(14),
        status: InvoiceStatus::Pending,
        paid_at: None,
        cancelled_at: None,
        payment_attempts: 0,
        reminder_count: 0,
        last_reminder_at: None,
        created_at: Some(now),
        updated_at: Some(now),
    };
    overrides(&mut invoice);
    invoice
}

pub fn create_test_payment(overrides: impl FnOnce(&mut PaymentProfile)) -> PaymentProfile {
    let now = test_datetime();

    let mut payment = PaymentProfile {
        id: Uuid::new_v4(),
        payment_number: 1,
        invoice_id: Uuid::new_v4(),
        tenant_id: Uuid::new_v4(),
        gateway_id: Uuid::new_v4(),
        method: PaymentMethod::Pix,
        transaction_id: None,
        idempotency_key: Uuid::new_v4().simple().to_string(),
        amount_cents: 9_900,
        fee_cents: 0,
        net_amount_cents: 9_900,
        status: PaymentStatus::Pending,
        boleto_url: None,
        boleto_barcode: None,
        boleto_digit_line: None,
        pix_qr_code_image: None,
        pix_payload: None,
        pix_expires_at: None,
        raw_response: None,
        failure_reason: None,
        authorized_at: None,
        completed_at: None,
        failed_at: None,
        cancelled_at: None,
        refunded_at: None,
        created_at: Some(now),
        updated_at: Some(now),
    };
    overrides(&mut payment);
    payment
}

/// Active, non-default Asaas sandbox gateway supporting every method.
/// Credentials are sealed with [`test_cipher`].
pub fn create_test_gateway(
    overrides: impl FnOnce(&mut PaymentGatewayProfile),
) -> PaymentGatewayProfile {
    let credentials_encrypted = test_cipher()
        .encrypt(r#"{"api_key":"test_key","webhook_secret":"test_token"}"#)
        .unwrap();

    let mut gateway = PaymentGatewayProfile {
        id: Uuid::new_v4(),
        name: "Asaas Sandbox".to_string(),
        provider: GatewayProvider::Asaas,
        environment: GatewayEnvironment::Sandbox,
        credentials_encrypted,
        supported_methods: PaymentMethod::all().to_vec(),
        fee_model: FeeModel::default(),
        is_active: true,
        is_default: false,
        created_at: Some(test_datetime()),
        updated_at: Some(test_datetime()),
    };
    overrides(&mut gateway);
    gateway
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invoice_defaults_are_consistent() {
        let invoice = create_test_invoice(|_| {});
        assert!(invoice.amounts().is_consistent());
        assert!(invoice.status.is_open());
        assert!(invoice.due_date > invoice.issue_date);
    }

    #[test]
    fn test_gateway_credentials_decrypt() {
        let gateway = create_test_gateway(|g| g.is_default = true);
        assert!(gateway.is_default);
        let json = test_cipher().decrypt(&gateway.credentials_encrypted).unwrap();
        assert!(json.contains("test_key"));
    }

    #[test]
    fn test_subscription_overrides() {
        let sub = create_test_subscription(|s| s.custom_price_cents = Some(5_000));
        assert_eq!(sub.custom_price_cents, Some(5_000));
        assert_eq!(sub.status, SubscriptionStatus::Active);
    }
}
