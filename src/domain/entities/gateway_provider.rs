use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use super::gateway_environment::GatewayEnvironment;

/// External payment processor behind a configured gateway.
///
/// The snake_case name doubles as the webhook path segment
/// (`/api/webhooks/{provider}`).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, AsRefStr, Display,
    EnumString,
)]
#[sqlx(type_name = "gateway_provider", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum GatewayProvider {
    Asaas,
    MercadoPago,
    Dummy,
}

impl GatewayProvider {
    pub fn display_name(&self) -> &'static str {
        match self {
            GatewayProvider::Asaas => "Asaas",
            GatewayProvider::MercadoPago => "Mercado Pago",
            GatewayProvider::Dummy => "Sandbox Provider",
        }
    }

    /// Dummy provider never settles real money, so it is sandbox-only.
    pub fn supports_environment(&self, environment: GatewayEnvironment) -> bool {
        match self {
            GatewayProvider::Asaas | GatewayProvider::MercadoPago => true,
            GatewayProvider::Dummy => environment == GatewayEnvironment::Sandbox,
        }
    }
}
