//! In-memory mock implementations for tenancy, invoice and payment repositories.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashMap;
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, AtomicI64, Ordering},
};
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::ports::payment_gateway::ProviderCustomerId,
    domain::entities::{
        gateway_environment::GatewayEnvironment, gateway_provider::GatewayProvider,
        invoice::InvoiceStatus, payment_status::PaymentStatus,
        subscription::SubscriptionStatus,
    },
    use_cases::{
        invoice::{CreateInvoiceInput, InvoiceProfile, InvoiceRepoTrait, InvoiceTransition},
        payment::{
            ChargeAttachment, GatewayCustomerRepoTrait, NewPaymentInput, PaymentProfile,
            PaymentRepoTrait, PaymentTransition, PaymentTransitionOutcome, PendingClaim,
            TransitionResult,
        },
        tenancy::{
            PlanProfile, SubscriptionProfile, SubscriptionRepoTrait, SubscriptionWithPlan,
            TenantProfile, TenantRepoTrait,
        },
    },
};

// ============================================================================
// InMemoryTenantRepo
// ============================================================================

#[derive(Default)]
pub struct InMemoryTenantRepo {
    pub tenants: Mutex<HashMap<Uuid, TenantProfile>>,
}

impl InMemoryTenantRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, tenant: TenantProfile) {
        self.tenants.lock().unwrap().insert(tenant.id, tenant);
    }

    pub fn get(&self, id: Uuid) -> Option<TenantProfile> {
        self.tenants.lock().unwrap().get(&id).cloned()
    }
}

#[async_trait]
impl TenantRepoTrait for InMemoryTenantRepo {
    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<TenantProfile>> {
        Ok(self.get(id))
    }

    async fn deactivate(&self, id: Uuid, reason: &str, at: DateTime<Utc>) -> AppResult<bool> {
        let mut tenants = self.tenants.lock().unwrap();
        match tenants.get_mut(&id) {
            Some(tenant) if tenant.is_active => {
                tenant.is_active = false;
                tenant.deactivated_at = Some(at);
                tenant.deactivation_reason = Some(reason.to_string());
                tenant.updated_at = Some(at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

// ============================================================================
// InMemorySubscriptionRepo
// ============================================================================

#[derive(Default)]
pub struct InMemorySubscriptionRepo {
    pub subscriptions: Mutex<HashMap<Uuid, SubscriptionProfile>>,
    pub plans: Mutex<HashMap<Uuid, PlanProfile>>,
}

impl InMemorySubscriptionRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, subscription: SubscriptionProfile, plan: PlanProfile) {
        self.plans.lock().unwrap().insert(plan.id, plan);
        self.subscriptions
            .lock()
            .unwrap()
            .insert(subscription.id, subscription);
    }

    pub fn get(&self, id: Uuid) -> Option<SubscriptionProfile> {
        self.subscriptions.lock().unwrap().get(&id).cloned()
    }
}

#[async_trait]
impl SubscriptionRepoTrait for InMemorySubscriptionRepo {
    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<SubscriptionProfile>> {
        Ok(self.get(id))
    }

    async fn list_billable(&self, today: NaiveDate) -> AppResult<Vec<SubscriptionWithPlan>> {
        let plans = self.plans.lock().unwrap();
        Ok(self
            .subscriptions
            .lock()
            .unwrap()
            .values()
            .filter(|s| s.is_billable_on(today))
            .filter_map(|s| {
                plans.get(&s.plan_id).map(|plan| SubscriptionWithPlan {
                    subscription: s.clone(),
                    plan: plan.clone(),
                })
            })
            .collect())
    }

    async fn suspend(&self, id: Uuid, reason: &str, at: DateTime<Utc>) -> AppResult<bool> {
        let mut subscriptions = self.subscriptions.lock().unwrap();
        match subscriptions.get_mut(&id) {
            Some(sub) if sub.status.can_suspend() => {
                sub.status = SubscriptionStatus::Suspended;
                sub.suspended_at = Some(at);
                sub.suspension_reason = Some(reason.to_string());
                sub.suspension_notified_at = None;
                sub.updated_at = Some(at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn mark_suspension_notified(&self, id: Uuid, at: DateTime<Utc>) -> AppResult<()> {
        let mut subscriptions = self.subscriptions.lock().unwrap();
        let sub = subscriptions.get_mut(&id).ok_or(AppError::NotFound)?;
        if sub.suspension_notified_at.is_none() {
            sub.suspension_notified_at = Some(at);
            sub.updated_at = Some(at);
        }
        Ok(())
    }
}

// ============================================================================
// InMemoryInvoiceRepo
// ============================================================================

/// Keeps insertion order so `all()` reads oldest first.
#[derive(Default)]
pub struct InMemoryInvoiceRepo {
    pub invoices: Mutex<Vec<InvoiceProfile>>,
}

impl InMemoryInvoiceRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, invoice: InvoiceProfile) {
        self.invoices.lock().unwrap().push(invoice);
    }

    pub fn get(&self, id: Uuid) -> Option<InvoiceProfile> {
        self.invoices
            .lock()
            .unwrap()
            .iter()
            .find(|i| i.id == id)
            .cloned()
    }

    pub fn all(&self) -> Vec<InvoiceProfile> {
        self.invoices.lock().unwrap().clone()
    }

    /// Same rules as the row-locked update in Postgres.
    pub fn transition(
        &self,
        id: Uuid,
        target: InvoiceStatus,
        at: DateTime<Utc>,
    ) -> AppResult<InvoiceTransition> {
        let mut invoices = self.invoices.lock().unwrap();
        let invoice = invoices
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or(AppError::NotFound)?;

        if invoice.status == target {
            return Ok(InvoiceTransition::Unchanged(invoice.clone()));
        }
        if !invoice.status.can_transition_to(target) {
            return Ok(InvoiceTransition::Rejected(invoice.clone()));
        }

        invoice.status = target;
        match target {
            InvoiceStatus::Paid => invoice.paid_at = Some(at),
            InvoiceStatus::Cancelled => invoice.cancelled_at = Some(at),
            InvoiceStatus::Pending | InvoiceStatus::Overdue => {}
        }
        invoice.updated_at = Some(at);
        Ok(InvoiceTransition::Applied(invoice.clone()))
    }
}

#[async_trait]
impl InvoiceRepoTrait for InMemoryInvoiceRepo {
    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<InvoiceProfile>> {
        Ok(self.get(id))
    }

    async fn create_if_absent(
        &self,
        input: &CreateInvoiceInput,
    ) -> AppResult<Option<InvoiceProfile>> {
        let mut invoices = self.invoices.lock().unwrap();
        let exists = invoices.iter().any(|i| {
            i.subscription_id == input.subscription_id
                && i.period_start == input.period_start
                && i.period_end == input.period_end
        });
        if exists {
            return Ok(None);
        }

        let now = Utc::now();
        let invoice = InvoiceProfile {
            id: Uuid::new_v4(),
            tenant_id: input.tenant_id,
            subscription_id: input.subscription_id,
            number: input.number.clone(),
            period_start: input.period_start,
            period_end: input.period_end,
            line_items: input.line_items.clone(),
            subtotal_cents: input.amounts.subtotal_cents,
            discount_cents: input.amounts.discount_cents,
            tax_cents: input.amounts.tax_cents,
            total_cents: input.amounts.total_cents,
            issue_date: input.issue_date,
            due_date: input.due_date,
            status: InvoiceStatus::Pending,
            paid_at: None,
            cancelled_at: None,
            payment_attempts: 0,
            reminder_count: 0,
            last_reminder_at: None,
            created_at: Some(now),
            updated_at: Some(now),
        };
        invoices.push(invoice.clone());
        Ok(Some(invoice))
    }

    async fn increment_payment_attempts(&self, id: Uuid) -> AppResult<()> {
        let mut invoices = self.invoices.lock().unwrap();
        let invoice = invoices
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or(AppError::NotFound)?;
        invoice.payment_attempts += 1;
        Ok(())
    }

    async fn transition_status(
        &self,
        id: Uuid,
        target: InvoiceStatus,
        at: DateTime<Utc>,
    ) -> AppResult<InvoiceTransition> {
        self.transition(id, target, at)
    }

    async fn list_past_due(&self, today: NaiveDate) -> AppResult<Vec<InvoiceProfile>> {
        Ok(self
            .all()
            .into_iter()
            .filter(|i| i.status.is_open() && i.due_date < today)
            .collect())
    }

    async fn list_open(&self) -> AppResult<Vec<InvoiceProfile>> {
        Ok(self
            .all()
            .into_iter()
            .filter(|i| i.status.is_open())
            .collect())
    }

    async fn record_reminder_sent(&self, id: Uuid, at: DateTime<Utc>) -> AppResult<()> {
        let mut invoices = self.invoices.lock().unwrap();
        let invoice = invoices
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or(AppError::NotFound)?;
        invoice.reminder_count += 1;
        invoice.last_reminder_at = Some(at);
        Ok(())
    }
}

// ============================================================================
// InMemoryPaymentRepo
// ============================================================================

/// Shares the invoice store so a completed payment can settle its invoice
/// in the same call, as the Postgres transaction does.
pub struct InMemoryPaymentRepo {
    pub payments: Mutex<Vec<PaymentProfile>>,
    invoices: Arc<InMemoryInvoiceRepo>,
    next_number: AtomicI64,
    fail_next_transition: AtomicBool,
}

impl InMemoryPaymentRepo {
    pub fn new(invoices: Arc<InMemoryInvoiceRepo>) -> Self {
        Self {
            payments: Mutex::new(Vec::new()),
            invoices,
            next_number: AtomicI64::new(1),
            fail_next_transition: AtomicBool::new(false),
        }
    }

    pub fn insert(&self, payment: PaymentProfile) {
        self.payments.lock().unwrap().push(payment);
    }

    pub fn get(&self, id: Uuid) -> Option<PaymentProfile> {
        self.payments
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.id == id)
            .cloned()
    }

    pub fn for_invoice(&self, invoice_id: Uuid) -> Vec<PaymentProfile> {
        self.payments
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.invoice_id == invoice_id)
            .cloned()
            .collect()
    }

    /// The next `apply_transition` fails with a database error.
    pub fn fail_next_transition(&self) {
        self.fail_next_transition.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl PaymentRepoTrait for InMemoryPaymentRepo {
    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<PaymentProfile>> {
        Ok(self.get(id))
    }

    async fn get_by_transaction_id(
        &self,
        gateway_id: Uuid,
        transaction_id: &str,
    ) -> AppResult<Option<PaymentProfile>> {
        Ok(self
            .payments
            .lock()
            .unwrap()
            .iter()
            .find(|p| {
                p.gateway_id == gateway_id && p.transaction_id.as_deref() == Some(transaction_id)
            })
            .cloned())
    }

    async fn list_by_invoice(&self, invoice_id: Uuid) -> AppResult<Vec<PaymentProfile>> {
        Ok(self.for_invoice(invoice_id))
    }

    async fn claim_pending(&self, input: &NewPaymentInput) -> AppResult<PendingClaim> {
        let mut payments = self.payments.lock().unwrap();
        let existing = payments.iter().rev().find(|p| {
            p.invoice_id == input.invoice_id
                && p.gateway_id == input.gateway_id
                && p.idempotency_key == input.idempotency_key
                && matches!(
                    p.status,
                    PaymentStatus::Pending | PaymentStatus::Approved | PaymentStatus::Processing
                )
        });
        if let Some(existing) = existing {
            return Ok(PendingClaim::Existing(existing.clone()));
        }

        let now = Utc::now();
        let payment = PaymentProfile {
            id: Uuid::new_v4(),
            payment_number: self.next_number.fetch_add(1, Ordering::SeqCst),
            invoice_id: input.invoice_id,
            tenant_id: input.tenant_id,
            gateway_id: input.gateway_id,
            method: input.method,
            transaction_id: None,
            idempotency_key: input.idempotency_key.clone(),
            amount_cents: input.amount_cents,
            fee_cents: input.fee_cents,
            net_amount_cents: input.net_amount_cents,
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
        payments.push(payment.clone());
        Ok(PendingClaim::Created(payment))
    }

    async fn attach_charge(
        &self,
        id: Uuid,
        attachment: &ChargeAttachment,
    ) -> AppResult<PaymentProfile> {
        let mut payments = self.payments.lock().unwrap();
        let payment = payments
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(AppError::NotFound)?;
        payment.transaction_id = Some(attachment.transaction_id.clone());
        payment.boleto_url = attachment.boleto_url.clone();
        payment.boleto_barcode = attachment.boleto_barcode.clone();
        payment.boleto_digit_line = attachment.boleto_digit_line.clone();
        payment.pix_qr_code_image = attachment.pix_qr_code_image.clone();
        payment.pix_payload = attachment.pix_payload.clone();
        payment.pix_expires_at = attachment.pix_expires_at;
        payment.raw_response = Some(attachment.raw_response.clone());
        payment.updated_at = Some(Utc::now());
        Ok(payment.clone())
    }

    async fn apply_transition(
        &self,
        id: Uuid,
        transition: &PaymentTransition,
    ) -> AppResult<PaymentTransitionOutcome> {
        if self.fail_next_transition.swap(false, Ordering::SeqCst) {
            return Err(AppError::Database("connection reset".into()));
        }

        let mut payments = self.payments.lock().unwrap();
        let payment = payments
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(AppError::NotFound)?;

        if payment.status == transition.target {
            if let Some(raw) = &transition.raw_response {
                payment.raw_response = Some(raw.clone());
            }
            return Ok(PaymentTransitionOutcome {
                payment: payment.clone(),
                result: TransitionResult::Unchanged,
                invoice_paid: false,
            });
        }
        if !payment.status.can_transition_to(transition.target) {
            return Ok(PaymentTransitionOutcome {
                payment: payment.clone(),
                result: TransitionResult::Rejected,
                invoice_paid: false,
            });
        }

        payment.apply_status(transition.target, transition.at);
        if let Some(raw) = &transition.raw_response {
            payment.raw_response = Some(raw.clone());
        }
        if let Some(reason) = &transition.failure_reason {
            payment.failure_reason = Some(reason.clone());
        }
        let payment = payment.clone();
        drop(payments);

        let invoice_paid = if transition.target == PaymentStatus::Completed {
            self.invoices
                .transition(payment.invoice_id, InvoiceStatus::Paid, transition.at)
                .map(|t| t.is_applied())
                .unwrap_or(false)
        } else {
            false
        };

        Ok(PaymentTransitionOutcome {
            payment,
            result: TransitionResult::Applied,
            invoice_paid,
        })
    }
}

// ============================================================================
// InMemoryGatewayCustomerRepo
// ============================================================================

#[derive(Default)]
pub struct InMemoryGatewayCustomerRepo {
    pub customers:
        Mutex<HashMap<(Uuid, GatewayProvider, GatewayEnvironment), ProviderCustomerId>>,
}

impl InMemoryGatewayCustomerRepo {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl GatewayCustomerRepoTrait for InMemoryGatewayCustomerRepo {
    async fn get(
        &self,
        tenant_id: Uuid,
        provider: GatewayProvider,
        environment: GatewayEnvironment,
    ) -> AppResult<Option<ProviderCustomerId>> {
        Ok(self
            .customers
            .lock()
            .unwrap()
            .get(&(tenant_id, provider, environment))
            .cloned())
    }

    async fn upsert(
        &self,
        tenant_id: Uuid,
        provider: GatewayProvider,
        environment: GatewayEnvironment,
        customer_id: &ProviderCustomerId,
    ) -> AppResult<()> {
        self.customers
            .lock()
            .unwrap()
            .insert((tenant_id, provider, environment), customer_id.clone());
        Ok(())
    }
}
