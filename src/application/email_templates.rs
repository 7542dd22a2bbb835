use url::Url;

use crate::{
    application::use_cases::invoice::InvoiceProfile,
    domain::entities::{money::format_brl, reminder::ReminderTier},
};

const BRAND_NAME: &str = "Ponto";

fn origin_label(app_origin: &str) -> String {
    Url::parse(app_origin)
        .ok()
        .and_then(|url| url.host_str().map(|host| host.to_string()))
        .unwrap_or_else(|| app_origin.to_string())
}

pub fn invoice_url(app_origin: &str, invoice: &InvoiceProfile) -> String {
    format!(
        "{}/billing/invoices/{}",
        app_origin.trim_end_matches('/'),
        invoice.id
    )
}

pub fn primary_button(url: &str, label: &str) -> String {
    format!(
        r#"<a href="{url}" style="display:inline-block;padding:12px 18px;background-color:#111827;color:#ffffff;text-decoration:none;border-radius:8px;font-weight:600;">{label}</a>"#
    )
}

fn due_date_label(invoice: &InvoiceProfile) -> String {
    invoice.due_date.format("%d/%m/%Y").to_string()
}

/// Reminder for an open invoice. Wording escalates with the tier.
pub fn payment_reminder_email(
    app_origin: &str,
    tenant_name: &str,
    invoice: &InvoiceProfile,
    tier: ReminderTier,
) -> (String, String) {
    let amount = format_brl(invoice.total_cents);
    let due = due_date_label(invoice);

    let (subject, headline, lead) = match tier {
        ReminderTier::Overdue { days_overdue } => (
            format!("Fatura {} vencida há {} dia(s)", invoice.number, days_overdue),
            "Pagamento em atraso".to_string(),
            format!(
                "A fatura <strong>{}</strong> de {} venceu em {} e está em atraso há <strong>{} dia(s)</strong>. \
                 Sem o pagamento, o acesso de <strong>{}</strong> poderá ser suspenso.",
                invoice.number, amount, due, days_overdue, tenant_name
            ),
        ),
        ReminderTier::Urgent { days_until_due: 0 } => (
            format!("Fatura {} vence hoje", invoice.number),
            "Sua fatura vence hoje".to_string(),
            format!(
                "A fatura <strong>{}</strong> de {} vence <strong>hoje</strong>.",
                invoice.number, amount
            ),
        ),
        ReminderTier::Urgent { .. } => (
            format!("Fatura {} vence amanhã", invoice.number),
            "Sua fatura vence amanhã".to_string(),
            format!(
                "A fatura <strong>{}</strong> de {} vence <strong>amanhã</strong> ({}).",
                invoice.number, amount, due
            ),
        ),
        ReminderTier::Soon { days_until_due } => (
            format!("Fatura {} vence em {} dias", invoice.number, days_until_due),
            "Vencimento próximo".to_string(),
            format!(
                "A fatura <strong>{}</strong> de {} vence em {} dias ({}).",
                invoice.number, amount, days_until_due, due
            ),
        ),
        ReminderTier::Informational { .. } => (
            format!("Fatura {} disponível", invoice.number),
            "Nova fatura disponível".to_string(),
            format!(
                "A fatura <strong>{}</strong> de {} está disponível com vencimento em {}.",
                invoice.number, amount, due
            ),
        ),
    };

    let button = primary_button(&invoice_url(app_origin, invoice), "Pagar fatura");
    let body = format!(
        r#"{button}<p style="margin:12px 0 0;color:#374151;">Aceitamos boleto, PIX e cartão de crédito.</p>"#
    );
    let reason = format!("{} possui uma assinatura ativa", tenant_name);

    let html = wrap_email(app_origin, &headline, &lead, &body, &reason);
    (subject, html)
}

/// Short plain-text version for SMS/WhatsApp.
pub fn payment_reminder_text(app_origin: &str, invoice: &InvoiceProfile, tier: ReminderTier) -> String {
    let amount = format_brl(invoice.total_cents);
    let url = invoice_url(app_origin, invoice);
    match tier {
        ReminderTier::Overdue { days_overdue } => format!(
            "{BRAND_NAME}: fatura {} ({amount}) em atraso há {days_overdue} dia(s). Evite a suspensão: {url}",
            invoice.number
        ),
        ReminderTier::Urgent { days_until_due: 0 } => {
            format!("{BRAND_NAME}: fatura {} ({amount}) vence hoje. {url}", invoice.number)
        }
        _ => format!(
            "{BRAND_NAME}: fatura {} ({amount}) vence em {}. {url}",
            invoice.number,
            due_date_label(invoice)
        ),
    }
}

pub fn suspension_notice_email(
    app_origin: &str,
    tenant_name: &str,
    invoice: &InvoiceProfile,
    days_overdue: i64,
) -> (String, String) {
    let subject = format!("Conta {} suspensa por falta de pagamento", tenant_name);
    let headline = "Conta suspensa";
    let lead = format!(
        "A assinatura de <strong>{}</strong> foi suspensa porque a fatura <strong>{}</strong> de {} está em atraso há {} dias.",
        tenant_name,
        invoice.number,
        format_brl(invoice.total_cents),
        days_overdue
    );
    let button = primary_button(&invoice_url(app_origin, invoice), "Regularizar pagamento");
    let body = format!(
        r#"{button}<p style="margin:12px 0 0;color:#374151;">O acesso é restabelecido após a confirmação do pagamento.</p>"#
    );
    let reason = format!("{} possui uma assinatura com pagamento pendente", tenant_name);

    let html = wrap_email(app_origin, headline, &lead, &body, &reason);
    (subject, html)
}

pub fn suspension_notice_text(app_origin: &str, invoice: &InvoiceProfile) -> String {
    format!(
        "{BRAND_NAME}: sua conta foi suspensa por falta de pagamento da fatura {}. Regularize em {}",
        invoice.number,
        invoice_url(app_origin, invoice)
    )
}

pub fn wrap_email(
    app_origin: &str,
    headline: &str,
    lead: &str,
    body_html: &str,
    reason: &str,
) -> String {
    let origin = origin_label(app_origin);

    format!(
        r#"<!DOCTYPE html>
<html lang="pt-BR">
  <body style="background:#f8fafc;margin:0;padding:24px;font-family:Arial,Helvetica,sans-serif;">
    <div style="max-width:560px;margin:0 auto;background:#ffffff;border:1px solid #e5e7eb;border-radius:12px;padding:24px;">
      <div style="font-size:12px;letter-spacing:0.08em;text-transform:uppercase;color:#6b7280;">{brand} - {origin}</div>
      <h1 style="margin:12px 0 8px;font-size:22px;color:#111827;">{headline}</h1>
      <p style="margin:0 0 12px;font-size:15px;color:#111827;line-height:1.6;">{lead}</p>
      {body_html}
      <div style="margin-top:20px;padding-top:16px;border-top:1px solid #e5e7eb;">
        <p style="margin:0;font-size:13px;color:#4b5563;">Você recebeu este e-mail porque {reason}.</p>
      </div>
      <p style="margin:14px 0 0;font-size:12px;color:#9ca3af;">Enviado por {brand} - {origin}</p>
    </div>
  </body>
</html>
"#,
        brand = BRAND_NAME,
    )
}
