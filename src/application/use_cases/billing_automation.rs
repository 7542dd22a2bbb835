use std::sync::Arc;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::Serialize;
use strum::{Display, EnumString};
use tracing::{debug, error, info, warn};

use crate::{
    app_error::{AppError, AppResult},
    application::{
        email_templates,
        ports::notifications::{EmailMessage, EmailSender, MessagingSender, NotificationPriority},
    },
    domain::entities::{
        billing_period::{days_until, due_date_for, month_period},
        invoice::{InvoiceAmounts, InvoiceLineItem, InvoiceStatus},
        money::percent_to_bps,
        reminder::ReminderTier,
        subscription::SubscriptionStatus,
    },
};

use super::{
    invoice::{CreateInvoiceInput, InvoiceProfile, InvoiceRepoTrait, InvoiceTransition},
    tenancy::{SubscriptionRepoTrait, SubscriptionWithPlan, TenantProfile, TenantRepoTrait},
};

/// Tax added to generated invoices, in cents. Providers bill it themselves today.
const INVOICE_TAX_CENTS: i64 = 0;

/// Days before the due date on which a reminder goes out.
const REMINDER_DAYS_BEFORE_DUE: [i64; 4] = [7, 3, 1, 0];

/// While overdue, remind every this many days starting on day one.
const OVERDUE_REMINDER_INTERVAL_DAYS: i64 = 3;

#[derive(Debug, Clone)]
pub struct BillingSettings {
    pub grace_period_days: i64,
    pub default_due_day: u32,
    pub yearly_discount_percent: f64,
    pub app_origin: String,
}

impl Default for BillingSettings {
    fn default() -> Self {
        Self {
            grace_period_days: 7,
            default_due_day: 10,
            yearly_discount_percent: 10.0,
            app_origin: "http://localhost:3000".to_string(),
        }
    }
}

/// Per-run counters. A failing item is counted and the batch continues.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TaskReport {
    pub processed: u32,
    pub succeeded: u32,
    pub failed: u32,
    pub skipped: u32,
}

impl TaskReport {
    fn record<T>(&mut self, result: &AppResult<T>) {
        match result {
            Ok(_) => self.succeed(),
            Err(_) => self.fail(),
        }
    }

    fn succeed(&mut self) {
        self.processed += 1;
        self.succeeded += 1;
    }

    fn fail(&mut self) {
        self.processed += 1;
        self.failed += 1;
    }

    fn skip(&mut self) {
        self.processed += 1;
        self.skipped += 1;
    }
}

/// Decides whether an open invoice gets a reminder today.
pub trait ReminderPolicy: Send + Sync {
    fn needs_reminder(&self, invoice: &InvoiceProfile, today: NaiveDate) -> bool;
}

/// At most one reminder per day; 7, 3, 1 and 0 days before the due date,
/// then every third day while overdue (1, 4, 7, ...).
#[derive(Debug, Clone, Copy, Default)]
pub struct CadenceReminderPolicy;

impl ReminderPolicy for CadenceReminderPolicy {
    fn needs_reminder(&self, invoice: &InvoiceProfile, today: NaiveDate) -> bool {
        if !invoice.status.is_open() {
            return false;
        }
        if invoice
            .last_reminder_at
            .is_some_and(|sent| sent.date_naive() == today)
        {
            return false;
        }

        let days = days_until(today, invoice.due_date);
        if days >= 0 {
            REMINDER_DAYS_BEFORE_DUE.contains(&days)
        } else {
            (-days) % OVERDUE_REMINDER_INTERVAL_DAYS == 1
        }
    }
}

/// Scheduled billing tasks: invoice generation, overdue escalation, reminders.
/// Each task is safe to re-run and to overlap with itself.
#[derive(Clone)]
pub struct BillingAutomation {
    tenants: Arc<dyn TenantRepoTrait>,
    subscriptions: Arc<dyn SubscriptionRepoTrait>,
    invoices: Arc<dyn InvoiceRepoTrait>,
    email: Arc<dyn EmailSender>,
    messaging: Option<Arc<dyn MessagingSender>>,
    reminder_policy: Arc<dyn ReminderPolicy>,
    settings: BillingSettings,
}

impl BillingAutomation {
    pub fn new(
        tenants: Arc<dyn TenantRepoTrait>,
        subscriptions: Arc<dyn SubscriptionRepoTrait>,
        invoices: Arc<dyn InvoiceRepoTrait>,
        email: Arc<dyn EmailSender>,
        messaging: Option<Arc<dyn MessagingSender>>,
        settings: BillingSettings,
    ) -> Self {
        Self {
            tenants,
            subscriptions,
            invoices,
            email,
            messaging,
            reminder_policy: Arc::new(CadenceReminderPolicy),
            settings,
        }
    }

    pub fn with_reminder_policy(mut self, policy: Arc<dyn ReminderPolicy>) -> Self {
        self.reminder_policy = policy;
        self
    }

    // ========================================================================
    // Monthly invoice generation
    // ========================================================================

    /// One invoice per billable subscription for the calendar month of `today`.
    /// Existing invoices for the period are skipped.
    pub async fn generate_monthly_invoices(&self, now: DateTime<Utc>) -> AppResult<TaskReport> {
        let today = now.date_naive();
        let subscriptions = self.subscriptions.list_billable(today).await?;
        let mut report = TaskReport::default();

        for entry in &subscriptions {
            if !entry.subscription.is_billable_on(today) {
                report.skip();
                continue;
            }

            let input = self.build_invoice(entry, today);
            match self.invoices.create_if_absent(&input).await {
                Ok(Some(invoice)) => {
                    report.succeed();
                    info!(
                        invoice_id = %invoice.id,
                        subscription_id = %entry.subscription.id,
                        number = %invoice.number,
                        total_cents = invoice.total_cents,
                        due_date = %invoice.due_date,
                        "Invoice generated"
                    );
                }
                Ok(None) => {
                    report.skip();
                    debug!(subscription_id = %entry.subscription.id, "Invoice for period already exists");
                }
                Err(err) => {
                    error!(subscription_id = %entry.subscription.id, error = %err, "Invoice generation failed");
                    report.fail();
                }
            }
        }

        info!(
            processed = report.processed,
            succeeded = report.succeeded,
            failed = report.failed,
            skipped = report.skipped,
            "Monthly invoice generation finished"
        );
        Ok(report)
    }

    fn build_invoice(&self, entry: &SubscriptionWithPlan, today: NaiveDate) -> CreateInvoiceInput {
        let SubscriptionWithPlan { subscription, plan } = entry;
        let (period_start, period_end) = month_period(today);

        let mut line_items = vec![InvoiceLineItem::new(
            format!("{} - {:02}/{}", plan.name, period_start.month(), period_start.year()),
            1,
            subscription.effective_price_cents(plan),
        )];
        line_items.extend(subscription.metadata.extra_charges.iter().map(|charge| {
            InvoiceLineItem::new(&charge.description, charge.quantity, charge.unit_price_cents)
        }));

        let mut discount_bps = 0;
        if plan.billing_cycle.is_yearly() {
            discount_bps += percent_to_bps(self.settings.yearly_discount_percent);
        }
        if let Some(promo) = subscription.metadata.promotional_discount_percent {
            discount_bps += percent_to_bps(promo.max(0.0));
        }

        let amounts = InvoiceAmounts::compute(&line_items, discount_bps, INVOICE_TAX_CENTS);
        let due_day = subscription
            .metadata
            .due_day
            .unwrap_or(self.settings.default_due_day);

        CreateInvoiceInput {
            tenant_id: subscription.tenant_id,
            subscription_id: subscription.id,
            number: invoice_number(period_start, subscription.id),
            period_start,
            period_end,
            line_items,
            amounts,
            issue_date: today,
            due_date: due_date_for(today, due_day),
        }
    }

    // ========================================================================
    // Overdue escalation
    // ========================================================================

    /// Move past-due invoices to `overdue` and, past the grace period,
    /// suspend the subscription, deactivate the tenant and notify once.
    pub async fn escalate_overdue(&self, now: DateTime<Utc>) -> AppResult<TaskReport> {
        let invoices = self.invoices.list_past_due(now.date_naive()).await?;
        let mut report = TaskReport::default();

        for invoice in &invoices {
            let result = self.escalate_invoice(invoice, now).await;
            if let Err(err) = &result {
                error!(invoice_id = %invoice.id, error = %err, "Overdue escalation failed");
            }
            report.record(&result);
        }

        info!(
            processed = report.processed,
            succeeded = report.succeeded,
            failed = report.failed,
            "Overdue escalation finished"
        );
        Ok(report)
    }

    async fn escalate_invoice(&self, invoice: &InvoiceProfile, now: DateTime<Utc>) -> AppResult<()> {
        if invoice.status == InvoiceStatus::Pending {
            let transition = self
                .invoices
                .transition_status(invoice.id, InvoiceStatus::Overdue, now)
                .await?;
            match transition {
                InvoiceTransition::Applied(_) => {
                    info!(invoice_id = %invoice.id, due_date = %invoice.due_date, "Invoice marked overdue")
                }
                // paid or cancelled concurrently
                InvoiceTransition::Rejected(_) => return Ok(()),
                InvoiceTransition::Unchanged(_) => {}
            }
        }

        let days_overdue = -days_until(now.date_naive(), invoice.due_date);
        if days_overdue <= self.settings.grace_period_days {
            return Ok(());
        }
        self.suspend_for_non_payment(invoice, days_overdue, now).await
    }

    async fn suspend_for_non_payment(
        &self,
        invoice: &InvoiceProfile,
        days_overdue: i64,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        let reason = format!(
            "Invoice {} overdue for {} days",
            invoice.number, days_overdue
        );

        let suspended = self
            .subscriptions
            .suspend(invoice.subscription_id, &reason, now)
            .await?;
        let deactivated = self.tenants.deactivate(invoice.tenant_id, &reason, now).await?;

        // a notice that failed on an earlier run is still owed
        let notice_owed = self
            .subscriptions
            .get_by_id(invoice.subscription_id)
            .await?
            .is_some_and(|s| {
                s.status == SubscriptionStatus::Suspended && s.suspension_notified_at.is_none()
            });

        if !suspended && !deactivated && !notice_owed {
            return Ok(());
        }

        warn!(
            invoice_id = %invoice.id,
            subscription_id = %invoice.subscription_id,
            tenant_id = %invoice.tenant_id,
            days_overdue,
            subscription_suspended = suspended,
            tenant_deactivated = deactivated,
            "Suspended for non-payment"
        );

        let tenant = self
            .tenants
            .get_by_id(invoice.tenant_id)
            .await?
            .ok_or(AppError::NotFound)?;

        let (subject, html) = email_templates::suspension_notice_email(
            &self.settings.app_origin,
            &tenant.name,
            invoice,
            days_overdue,
        );
        let text = email_templates::suspension_notice_text(&self.settings.app_origin, invoice);
        self.notify(&tenant, subject, html, text, NotificationPriority::High)
            .await?;

        self.subscriptions
            .mark_suspension_notified(invoice.subscription_id, now)
            .await
    }

    // ========================================================================
    // Payment reminders
    // ========================================================================

    pub async fn send_payment_reminders(&self, now: DateTime<Utc>) -> AppResult<TaskReport> {
        let today = now.date_naive();
        let invoices = self.invoices.list_open().await?;
        let mut report = TaskReport::default();

        for invoice in &invoices {
            if !self.reminder_policy.needs_reminder(invoice, today) {
                report.skip();
                continue;
            }
            let result = self.remind(invoice, now).await;
            if let Err(err) = &result {
                error!(invoice_id = %invoice.id, error = %err, "Payment reminder failed");
            }
            report.record(&result);
        }

        info!(
            processed = report.processed,
            succeeded = report.succeeded,
            failed = report.failed,
            skipped = report.skipped,
            "Payment reminders finished"
        );
        Ok(report)
    }

    async fn remind(&self, invoice: &InvoiceProfile, now: DateTime<Utc>) -> AppResult<()> {
        let tenant = self
            .tenants
            .get_by_id(invoice.tenant_id)
            .await?
            .ok_or(AppError::NotFound)?;

        let tier = ReminderTier::from_days_until_due(days_until(now.date_naive(), invoice.due_date));
        let (subject, html) = email_templates::payment_reminder_email(
            &self.settings.app_origin,
            &tenant.name,
            invoice,
            tier,
        );
        let text = email_templates::payment_reminder_text(&self.settings.app_origin, invoice, tier);
        let priority = match tier {
            ReminderTier::Overdue { .. } | ReminderTier::Urgent { .. } => NotificationPriority::High,
            ReminderTier::Soon { .. } | ReminderTier::Informational { .. } => {
                NotificationPriority::Normal
            }
        };

        self.notify(&tenant, subject, html, text, priority).await?;
        self.invoices
            .record_reminder_sent(invoice.id, now)
            .await?;

        info!(
            invoice_id = %invoice.id,
            tier = tier.as_str(),
            reminder_count = invoice.reminder_count + 1,
            "Payment reminder sent"
        );
        Ok(())
    }

    /// Email must succeed; the optional messaging channel is best effort.
    async fn notify(
        &self,
        tenant: &TenantProfile,
        subject: String,
        html: String,
        text: String,
        priority: NotificationPriority,
    ) -> AppResult<()> {
        let email_result = self
            .email
            .send(&EmailMessage {
                to: tenant.email.clone(),
                subject,
                html,
                priority,
            })
            .await;

        if let (Some(messaging), Some(phone)) = (&self.messaging, tenant.phone.as_deref()) {
            if let Err(err) = messaging.send_text(phone, &text).await {
                warn!(tenant_id = %tenant.id, error = %err, "Messaging channel failed");
            }
        }

        email_result
    }
}

/// Operator-facing task names, as used in `/billing/tasks/{task}/run`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, EnumString)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum BillingTask {
    GenerateInvoices,
    EscalateOverdue,
    SendReminders,
}

impl BillingTask {
    /// Order of a scheduled cycle: invoices exist before they can be
    /// escalated or reminded about.
    pub const CYCLE: [BillingTask; 3] = [
        BillingTask::GenerateInvoices,
        BillingTask::EscalateOverdue,
        BillingTask::SendReminders,
    ];
}

impl BillingAutomation {
    pub async fn run_task(&self, task: BillingTask, now: DateTime<Utc>) -> AppResult<TaskReport> {
        match task {
            BillingTask::GenerateInvoices => self.generate_monthly_invoices(now).await,
            BillingTask::EscalateOverdue => self.escalate_overdue(now).await,
            BillingTask::SendReminders => self.send_payment_reminders(now).await,
        }
    }
}

/// `INV-YYYYMM-<subscription id>`, unique per subscription and month.
pub fn invoice_number(period_start: NaiveDate, subscription_id: uuid::Uuid) -> String {
    format!(
        "INV-{}{:02}-{}",
        period_start.year(),
        period_start.month(),
        subscription_id.simple().to_string().to_uppercase()
    )
}
