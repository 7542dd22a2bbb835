use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// How a tenant settles an invoice.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, AsRefStr, Display,
    EnumString,
)]
#[sqlx(type_name = "payment_method", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum PaymentMethod {
    Boleto,
    Pix,
    CreditCard,
}

impl PaymentMethod {
    pub fn display_name(&self) -> &'static str {
        match self {
            PaymentMethod::Boleto => "Boleto",
            PaymentMethod::Pix => "PIX",
            PaymentMethod::CreditCard => "Credit card",
        }
    }

    pub fn all() -> &'static [PaymentMethod] {
        &[
            PaymentMethod::Boleto,
            PaymentMethod::Pix,
            PaymentMethod::CreditCard,
        ]
    }
}
