use async_trait::async_trait;
use sqlx::Row;
use uuid::Uuid;

use crate::{
    adapters::persistence::{PostgresPersistence, invoice::transition_locked},
    app_error::{AppError, AppResult},
    application::use_cases::{
        invoice::InvoiceTransition,
        payment::{
            ChargeAttachment, NewPaymentInput, PaymentProfile, PaymentRepoTrait,
            PaymentTransition, PaymentTransitionOutcome, PendingClaim, TransitionResult,
        },
    },
    domain::entities::{invoice::InvoiceStatus, payment_status::PaymentStatus},
};

fn row_to_profile(row: sqlx::postgres::PgRow) -> PaymentProfile {
    PaymentProfile {
        id: row.get("id"),
        payment_number: row.get("payment_number"),
        invoice_id: row.get("invoice_id"),
        tenant_id: row.get("tenant_id"),
        gateway_id: row.get("gateway_id"),
        method: row.get("method"),
        transaction_id: row.get("transaction_id"),
        idempotency_key: row.get("idempotency_key"),
        amount_cents: row.get("amount_cents"),
        fee_cents: row.get("fee_cents"),
        net_amount_cents: row.get("net_amount_cents"),
        status: row.get("status"),
        boleto_url: row.get("boleto_url"),
        boleto_barcode: row.get("boleto_barcode"),
        boleto_digit_line: row.get("boleto_digit_line"),
        pix_qr_code_image: row.get("pix_qr_code_image"),
        pix_payload: row.get("pix_payload"),
        pix_expires_at: row.get("pix_expires_at"),
        raw_response: row.get("raw_response"),
        failure_reason: row.get("failure_reason"),
        authorized_at: row.get("authorized_at"),
        completed_at: row.get("completed_at"),
        failed_at: row.get("failed_at"),
        cancelled_at: row.get("cancelled_at"),
        refunded_at: row.get("refunded_at"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

const SELECT_COLS: &str = r#"
    id, payment_number, invoice_id, tenant_id, gateway_id, method, transaction_id,
    idempotency_key, amount_cents, fee_cents, net_amount_cents, status,
    boleto_url, boleto_barcode, boleto_digit_line,
    pix_qr_code_image, pix_payload, pix_expires_at,
    raw_response, failure_reason,
    authorized_at, completed_at, failed_at, cancelled_at, refunded_at,
    created_at, updated_at
"#;

#[async_trait]
impl PaymentRepoTrait for PostgresPersistence {
    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<PaymentProfile>> {
        let row = sqlx::query(&format!("SELECT {} FROM payments WHERE id = $1", SELECT_COLS))
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(AppError::from)?;

        Ok(row.map(row_to_profile))
    }

    async fn get_by_transaction_id(
        &self,
        gateway_id: Uuid,
        transaction_id: &str,
    ) -> AppResult<Option<PaymentProfile>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM payments WHERE gateway_id = $1 AND transaction_id = $2",
            SELECT_COLS
        ))
        .bind(gateway_id)
        .bind(transaction_id)
        .fetch_optional(self.pool())
        .await
        .map_err(AppError::from)?;

        Ok(row.map(row_to_profile))
    }

    async fn list_by_invoice(&self, invoice_id: Uuid) -> AppResult<Vec<PaymentProfile>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM payments WHERE invoice_id = $1 ORDER BY created_at, payment_number",
            SELECT_COLS
        ))
        .bind(invoice_id)
        .fetch_all(self.pool())
        .await
        .map_err(AppError::from)?;

        Ok(rows.into_iter().map(row_to_profile).collect())
    }

    /// Locks the invoice row so concurrent identical requests queue behind
    /// each other and the second one sees the row the first inserted.
    /// Backed by the partial unique index
    /// `payments_open_idempotency_key ON payments (gateway_id, idempotency_key)
    /// WHERE status IN ('pending', 'approved', 'processing')`.
    async fn claim_pending(&self, input: &NewPaymentInput) -> AppResult<PendingClaim> {
        let mut tx = self.pool().begin().await.map_err(AppError::from)?;

        sqlx::query("SELECT id FROM invoices WHERE id = $1 FOR UPDATE")
            .bind(input.invoice_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(AppError::from)?
            .ok_or(AppError::NotFound)?;

        let existing = sqlx::query(&format!(
            r#"
            SELECT {} FROM payments
            WHERE invoice_id = $1
              AND gateway_id = $2
              AND idempotency_key = $3
              AND status IN ($4, $5, $6)
            ORDER BY created_at DESC
            LIMIT 1
            "#,
            SELECT_COLS
        ))
        .bind(input.invoice_id)
        .bind(input.gateway_id)
        .bind(&input.idempotency_key)
        .bind(PaymentStatus::Pending)
        .bind(PaymentStatus::Approved)
        .bind(PaymentStatus::Processing)
        .fetch_optional(&mut *tx)
        .await
        .map_err(AppError::from)?;

        if let Some(row) = existing {
            tx.commit().await.map_err(AppError::from)?;
            return Ok(PendingClaim::Existing(row_to_profile(row)));
        }

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO payments (
                id, payment_number, invoice_id, tenant_id, gateway_id, method,
                idempotency_key, amount_cents, fee_cents, net_amount_cents, status
            )
            VALUES ($1, nextval('payment_number_seq'), $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {}
            "#,
            SELECT_COLS
        ))
        .bind(Uuid::new_v4())
        .bind(input.invoice_id)
        .bind(input.tenant_id)
        .bind(input.gateway_id)
        .bind(input.method)
        .bind(&input.idempotency_key)
        .bind(input.amount_cents)
        .bind(input.fee_cents)
        .bind(input.net_amount_cents)
        .bind(PaymentStatus::Pending)
        .fetch_one(&mut *tx)
        .await
        .map_err(AppError::from)?;

        tx.commit().await.map_err(AppError::from)?;
        Ok(PendingClaim::Created(row_to_profile(row)))
    }

    async fn attach_charge(
        &self,
        id: Uuid,
        attachment: &ChargeAttachment,
    ) -> AppResult<PaymentProfile> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE payments
            SET transaction_id = $2,
                boleto_url = $3,
                boleto_barcode = $4,
                boleto_digit_line = $5,
                pix_qr_code_image = $6,
                pix_payload = $7,
                pix_expires_at = $8,
                raw_response = $9,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            SELECT_COLS
        ))
        .bind(id)
        .bind(&attachment.transaction_id)
        .bind(&attachment.boleto_url)
        .bind(&attachment.boleto_barcode)
        .bind(&attachment.boleto_digit_line)
        .bind(&attachment.pix_qr_code_image)
        .bind(&attachment.pix_payload)
        .bind(attachment.pix_expires_at)
        .bind(&attachment.raw_response)
        .fetch_optional(self.pool())
        .await
        .map_err(AppError::from)?
        .ok_or(AppError::NotFound)?;

        Ok(row_to_profile(row))
    }

    async fn apply_transition(
        &self,
        id: Uuid,
        transition: &PaymentTransition,
    ) -> AppResult<PaymentTransitionOutcome> {
        let mut tx = self.pool().begin().await.map_err(AppError::from)?;

        let row = sqlx::query(&format!(
            "SELECT {} FROM payments WHERE id = $1 FOR UPDATE",
            SELECT_COLS
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(AppError::from)?
        .ok_or(AppError::NotFound)?;
        let mut payment = row_to_profile(row);

        if payment.status == transition.target {
            if let Some(raw) = &transition.raw_response {
                sqlx::query("UPDATE payments SET raw_response = $2, updated_at = $3 WHERE id = $1")
                    .bind(id)
                    .bind(raw)
                    .bind(transition.at)
                    .execute(&mut *tx)
                    .await
                    .map_err(AppError::from)?;
                payment.raw_response = Some(raw.clone());
            }
            tx.commit().await.map_err(AppError::from)?;
            return Ok(PaymentTransitionOutcome {
                payment,
                result: TransitionResult::Unchanged,
                invoice_paid: false,
            });
        }

        if !payment.status.can_transition_to(transition.target) {
            tx.rollback().await.map_err(AppError::from)?;
            return Ok(PaymentTransitionOutcome {
                payment,
                result: TransitionResult::Rejected,
                invoice_paid: false,
            });
        }

        payment.apply_status(transition.target, transition.at);
        if transition.raw_response.is_some() {
            payment.raw_response = transition.raw_response.clone();
        }
        if transition.failure_reason.is_some() {
            payment.failure_reason = transition.failure_reason.clone();
        }

        let row = sqlx::query(&format!(
            r#"
            UPDATE payments
            SET status = $2,
                raw_response = $3,
                failure_reason = $4,
                authorized_at = $5,
                completed_at = $6,
                failed_at = $7,
                cancelled_at = $8,
                refunded_at = $9,
                updated_at = $10
            WHERE id = $1
            RETURNING {}
            "#,
            SELECT_COLS
        ))
        .bind(id)
        .bind(payment.status)
        .bind(&payment.raw_response)
        .bind(&payment.failure_reason)
        .bind(payment.authorized_at)
        .bind(payment.completed_at)
        .bind(payment.failed_at)
        .bind(payment.cancelled_at)
        .bind(payment.refunded_at)
        .bind(transition.at)
        .fetch_one(&mut *tx)
        .await
        .map_err(AppError::from)?;
        let payment = row_to_profile(row);

        let invoice_paid = if payment.status == PaymentStatus::Completed {
            let invoice =
                transition_locked(&mut tx, payment.invoice_id, InvoiceStatus::Paid, transition.at)
                    .await?;
            matches!(invoice, InvoiceTransition::Applied(_))
        } else {
            false
        };

        tx.commit().await.map_err(AppError::from)?;

        Ok(PaymentTransitionOutcome {
            payment,
            result: TransitionResult::Applied,
            invoice_paid,
        })
    }
}
