use std::sync::Arc;

use chrono::Utc;
use serde_json::Value as JsonValue;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::ports::payment_gateway::{
        ChargeRequest, ChargeResult, ChargeState, CustomerData, PaymentGatewayPort,
        ProviderCustomerId,
    },
    domain::entities::{
        invoice::InvoiceStatus, payment_method::PaymentMethod, payment_status::PaymentStatus,
    },
};

use super::{
    gateway_registry::PaymentGatewayProfile,
    invoice::{InvoiceProfile, InvoiceRepoTrait, InvoiceTransition},
    payment::{
        ChargeAttachment, GatewayCustomerRepoTrait, NewPaymentInput, PaymentProfile,
        PaymentRepoTrait, PaymentTransition, PaymentTransitionOutcome, PendingClaim,
        TransitionResult,
        payment_idempotency_key,
    },
    tenancy::{TenantProfile, TenantRepoTrait},
};

/// Repositories shared by every gateway service.
#[derive(Clone)]
pub struct PaymentRepos {
    pub tenants: Arc<dyn TenantRepoTrait>,
    pub invoices: Arc<dyn InvoiceRepoTrait>,
    pub payments: Arc<dyn PaymentRepoTrait>,
    pub customers: Arc<dyn GatewayCustomerRepoTrait>,
}

#[derive(Debug, Clone, Default)]
pub struct PaymentOptions {
    pub card_token: Option<String>,
    pub description: Option<String>,
}

/// What a webhook did to local state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    Applied,
    /// Event understood but state already matched or the move was not allowed.
    NoOp,
    /// Event does not concern a tracked payment.
    Ignored(&'static str),
}

/// One configured gateway bound to its provider port.
///
/// Carries the behavior every provider shares: customer caching, fee
/// computation, write-ahead payment rows, and translation of provider states
/// into atomic state-machine transitions.
pub struct PaymentGatewayService {
    gateway: PaymentGatewayProfile,
    port: Arc<dyn PaymentGatewayPort>,
    repos: PaymentRepos,
}

impl PaymentGatewayService {
    pub fn new(
        gateway: PaymentGatewayProfile,
        port: Arc<dyn PaymentGatewayPort>,
        repos: PaymentRepos,
    ) -> Self {
        Self {
            gateway,
            port,
            repos,
        }
    }

    pub fn gateway(&self) -> &PaymentGatewayProfile {
        &self.gateway
    }

    pub fn supports_method(&self, method: PaymentMethod) -> bool {
        self.gateway.supports_method(method)
    }

    /// Create a charge for an invoice.
    ///
    /// The payment row is written as `pending` before the provider call and
    /// updated afterwards, so no transaction spans the network call. A
    /// timeout leaves the row `pending` (outcome unknown); a retry on the same
    /// day carries the same idempotency key and resumes that row.
    pub async fn create_payment(
        &self,
        invoice: &InvoiceProfile,
        method: PaymentMethod,
        options: &PaymentOptions,
    ) -> AppResult<PaymentProfile> {
        if !self.supports_method(method) {
            return Err(AppError::UnsupportedMethod(method));
        }
        if !invoice.status.is_open() {
            return Err(AppError::InvalidInput(format!(
                "invoice {} is {}",
                invoice.number, invoice.status
            )));
        }
        if invoice.total_cents <= 0 {
            return Err(AppError::InvalidInput("invoice has nothing to charge".into()));
        }
        if method == PaymentMethod::CreditCard && options.card_token.is_none() {
            return Err(AppError::InvalidInput(
                "card_token is required for credit card payments".into(),
            ));
        }

        let tenant = self
            .repos
            .tenants
            .get_by_id(invoice.tenant_id)
            .await?
            .ok_or(AppError::NotFound)?;

        let idempotency_key = payment_idempotency_key(invoice, method, Utc::now().date_naive());

        let (fee_cents, net_amount_cents) = self.gateway.fee_model.split(invoice.total_cents);
        let claim = self
            .repos
            .payments
            .claim_pending(&NewPaymentInput {
                invoice_id: invoice.id,
                tenant_id: invoice.tenant_id,
                gateway_id: self.gateway.id,
                method,
                idempotency_key: idempotency_key.clone(),
                amount_cents: invoice.total_cents,
                fee_cents,
                net_amount_cents,
            })
            .await?;

        let payment = match claim {
            PendingClaim::Existing(existing) if existing.transaction_id.is_some() => {
                info!(
                    payment_id = %existing.id,
                    invoice_id = %invoice.id,
                    "Reusing existing payment for identical request"
                );
                return Ok(existing);
            }
            PendingClaim::Existing(existing) => {
                info!(
                    payment_id = %existing.id,
                    invoice_id = %invoice.id,
                    "Resuming payment with unknown provider outcome"
                );
                existing
            }
            PendingClaim::Created(created) => created,
        };

        let charge = self
            .submit_charge(&tenant, invoice, method, &idempotency_key, options)
            .await;

        match charge {
            Ok(charge) => self.record_charge(payment, charge).await,
            Err(AppError::GatewayTimeout) => {
                warn!(
                    payment_id = %payment.id,
                    invoice_id = %invoice.id,
                    provider = %self.gateway.provider,
                    "Provider timed out creating charge; payment left pending"
                );
                Err(AppError::GatewayTimeout)
            }
            Err(err) => {
                warn!(
                    payment_id = %payment.id,
                    invoice_id = %invoice.id,
                    provider = %self.gateway.provider,
                    error = %err,
                    "Provider rejected charge"
                );
                self.repos
                    .payments
                    .apply_transition(
                        payment.id,
                        &PaymentTransition::to(PaymentStatus::Failed).with_failure(err.to_string()),
                    )
                    .await?;
                Err(err)
            }
        }
    }

    async fn submit_charge(
        &self,
        tenant: &TenantProfile,
        invoice: &InvoiceProfile,
        method: PaymentMethod,
        idempotency_key: &str,
        options: &PaymentOptions,
    ) -> AppResult<ChargeResult> {
        let customer = self.ensure_customer(tenant).await?;
        let request = ChargeRequest {
            customer,
            method,
            amount_cents: invoice.total_cents,
            due_date: invoice.due_date,
            description: options
                .description
                .clone()
                .unwrap_or_else(|| format!("Fatura {}", invoice.number)),
            external_reference: invoice.id.to_string(),
            idempotency_key: idempotency_key.to_string(),
            payer_email: tenant.email.clone(),
            card_token: options.card_token.clone(),
        };
        self.port.create_charge(&request).await
    }

    async fn record_charge(
        &self,
        payment: PaymentProfile,
        charge: ChargeResult,
    ) -> AppResult<PaymentProfile> {
        let attachment = ChargeAttachment {
            transaction_id: charge.transaction_id.clone(),
            boleto_url: charge.boleto_url,
            boleto_barcode: charge.boleto_barcode,
            boleto_digit_line: charge.boleto_digit_line,
            pix_qr_code_image: charge.pix_qr_code_image,
            pix_payload: charge.pix_payload,
            pix_expires_at: charge.pix_expires_at,
            raw_response: charge.raw,
        };
        let mut payment = self.repos.payments.attach_charge(payment.id, &attachment).await?;

        info!(
            payment_id = %payment.id,
            payment_number = payment.payment_number,
            transaction_id = %attachment.transaction_id,
            method = %payment.method,
            amount_cents = payment.amount_cents,
            fee_cents = payment.fee_cents,
            "Charge created"
        );

        match charge.state {
            Some(ChargeState::Status(status)) if status != payment.status => {
                payment = self
                    .repos
                    .payments
                    .apply_transition(payment.id, &PaymentTransition::to(status))
                    .await?
                    .payment;
            }
            _ => {}
        }
        Ok(payment)
    }

    /// Cached provider customer id for the tenant, registering it on first use.
    async fn ensure_customer(&self, tenant: &TenantProfile) -> AppResult<ProviderCustomerId> {
        let provider = self.gateway.provider;
        let environment = self.gateway.environment;

        if let Some(id) = self
            .repos
            .customers
            .get(tenant.id, provider, environment)
            .await?
        {
            return Ok(id);
        }

        let id = self
            .port
            .create_customer(&CustomerData {
                tenant_id: tenant.id,
                name: tenant.name.clone(),
                email: tenant.email.clone(),
                phone: tenant.phone.clone(),
                tax_id: tenant.tax_id.clone(),
            })
            .await?;
        self.repos
            .customers
            .upsert(tenant.id, provider, environment, &id)
            .await?;

        debug!(tenant_id = %tenant.id, provider = %provider, customer_id = %id, "Provider customer registered");
        Ok(id)
    }

    /// Poll the provider and persist whatever it reports.
    pub async fn check_payment_status(&self, payment: &PaymentProfile) -> AppResult<PaymentProfile> {
        let Some(transaction_id) = payment.transaction_id.as_deref() else {
            return Ok(payment.clone());
        };

        let report = self.port.fetch_charge_status(transaction_id).await?;
        let (_, payment) = self.apply_state(payment, report.state, Some(report.raw)).await?;
        Ok(payment)
    }

    /// Apply a provider callback. Events for unknown transactions are dropped.
    pub async fn process_webhook(&self, payload: &JsonValue) -> AppResult<WebhookOutcome> {
        let fields = self.port.parse_webhook(payload)?;

        let Some(transaction_id) = fields.transaction_id.as_deref() else {
            debug!(event_type = ?fields.event_type, "Webhook carries no transaction id");
            return Ok(WebhookOutcome::Ignored("no transaction id"));
        };

        let Some(payment) = self
            .repos
            .payments
            .get_by_transaction_id(self.gateway.id, transaction_id)
            .await?
        else {
            warn!(
                consistency_violation = true,
                gateway_id = %self.gateway.id,
                transaction_id = %transaction_id,
                event_type = ?fields.event_type,
                "Webhook references unknown transaction; dropped"
            );
            return Ok(WebhookOutcome::Ignored("unknown transaction"));
        };

        let Some(state) = self.port.interpret_webhook(&fields, payload).await? else {
            debug!(payment_id = %payment.id, event_type = ?fields.event_type, "Webhook event type ignored");
            return Ok(WebhookOutcome::Ignored("event type not handled"));
        };

        let (applied, _) = self.apply_state(&payment, state, Some(payload.clone())).await?;
        Ok(if applied {
            WebhookOutcome::Applied
        } else {
            WebhookOutcome::NoOp
        })
    }

    /// Cancel an unsettled payment or refund a settled one.
    ///
    /// Returns `false` and leaves the payment untouched when the provider
    /// rejects the request or the payment is already closed.
    pub async fn cancel_payment(&self, payment: &PaymentProfile) -> AppResult<bool> {
        let settled = payment.status.is_settled();
        if payment.status.is_terminal() && !settled {
            return Ok(false);
        }
        if payment.status == PaymentStatus::Failed {
            return Ok(false);
        }

        let target = match payment.status {
            PaymentStatus::Completed => PaymentStatus::Refunded,
            _ => PaymentStatus::Cancelled,
        };

        let raw = match payment.transaction_id.as_deref() {
            // Never reached the provider; nothing to cancel upstream
            None => None,
            Some(transaction_id) => {
                let response = if settled {
                    self.port.refund_charge(transaction_id).await
                } else {
                    self.port.cancel_charge(transaction_id).await
                };
                match response {
                    Ok(raw) => Some(raw),
                    Err(err) => {
                        warn!(
                            payment_id = %payment.id,
                            transaction_id = %transaction_id,
                            refund = settled,
                            error = %err,
                            "Provider rejected cancellation"
                        );
                        return Ok(false);
                    }
                }
            }
        };

        let mut transition = PaymentTransition::to(target);
        if let Some(raw) = raw {
            transition = transition.with_raw(raw);
        }
        let outcome = self
            .repos
            .payments
            .apply_transition(payment.id, &transition)
            .await?;

        if !outcome.is_applied() {
            warn!(
                payment_id = %payment.id,
                status = %outcome.payment.status,
                "Payment changed while cancelling; status kept"
            );
            return Ok(false);
        }

        info!(payment_id = %payment.id, status = %target, "Payment cancelled");
        Ok(true)
    }

    /// Returns whether local state changed, and the payment as stored.
    async fn apply_state(
        &self,
        payment: &PaymentProfile,
        state: ChargeState,
        raw: Option<JsonValue>,
    ) -> AppResult<(bool, PaymentProfile)> {
        let target = match state {
            ChargeState::Status(status) => status,
            ChargeState::Removed if payment.status == PaymentStatus::Completed => {
                PaymentStatus::Refunded
            }
            ChargeState::Removed => PaymentStatus::Cancelled,
            ChargeState::Overdue => {
                return self.mark_invoice_overdue(payment).await;
            }
        };

        let mut transition = PaymentTransition::to(target);
        if let Some(raw) = raw {
            transition = transition.with_raw(raw);
        }
        let outcome = self
            .repos
            .payments
            .apply_transition(payment.id, &transition)
            .await?;
        log_transition(&outcome, target);

        Ok((outcome.is_applied(), outcome.payment))
    }

    async fn mark_invoice_overdue(
        &self,
        payment: &PaymentProfile,
    ) -> AppResult<(bool, PaymentProfile)> {
        if payment.status.is_terminal() {
            debug!(payment_id = %payment.id, status = %payment.status, "Overdue notice for closed payment ignored");
            return Ok((false, payment.clone()));
        }

        let transition = self
            .repos
            .invoices
            .transition_status(payment.invoice_id, InvoiceStatus::Overdue, Utc::now())
            .await?;
        let applied = matches!(transition, InvoiceTransition::Applied(_));
        if applied {
            info!(invoice_id = %payment.invoice_id, payment_id = %payment.id, "Invoice marked overdue by provider");
        }
        Ok((applied, payment.clone()))
    }
}

fn log_transition(outcome: &PaymentTransitionOutcome, target: PaymentStatus) {
    let payment_id: Uuid = outcome.payment.id;
    match outcome.result {
        TransitionResult::Applied => info!(
            payment_id = %payment_id,
            status = %target,
            invoice_paid = outcome.invoice_paid,
            "Payment status changed"
        ),
        TransitionResult::Unchanged => {
            debug!(payment_id = %payment_id, status = %target, "Payment status unchanged")
        }
        TransitionResult::Rejected => info!(
            payment_id = %payment_id,
            from = %outcome.payment.status,
            to = %target,
            "Out-of-order provider state ignored"
        ),
    }
}
