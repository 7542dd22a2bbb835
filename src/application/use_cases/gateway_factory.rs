use std::sync::Arc;

use reqwest::Client;

use crate::{
    app_error::{AppError, AppResult},
    application::ports::payment_gateway::PaymentGatewayPort,
    domain::entities::gateway_provider::GatewayProvider,
    infra::{
        asaas_gateway::AsaasPaymentAdapter, crypto::CredentialCipher,
        dummy_gateway::DummyPaymentClient, mercado_pago_gateway::MercadoPagoPaymentAdapter,
    },
};

use super::gateway_registry::{GatewayCredentials, PaymentGatewayProfile};

/// Builds the provider port for a configured gateway.
///
/// The factory handles:
/// - Decrypting stored credentials
/// - Validating provider + environment combinations
/// - Instantiating the matching provider adapter
pub struct PaymentGatewayFactory {
    cipher: CredentialCipher,
    http: Client,
    #[cfg(test)]
    test_port_override: Option<Arc<dyn PaymentGatewayPort>>,
}

impl PaymentGatewayFactory {
    pub fn new(cipher: CredentialCipher, http: Client) -> Self {
        Self {
            cipher,
            http,
            #[cfg(test)]
            test_port_override: None,
        }
    }

    #[cfg(test)]
    pub fn with_port_override(mut self, port: Arc<dyn PaymentGatewayPort>) -> Self {
        self.test_port_override = Some(port);
        self
    }

    /// # Errors
    /// - `InvalidInput` if the provider cannot run in the gateway's environment
    /// - `Internal` if the stored credentials cannot be decrypted or parsed
    pub fn get(&self, gateway: &PaymentGatewayProfile) -> AppResult<Arc<dyn PaymentGatewayPort>> {
        #[cfg(test)]
        if let Some(ref port) = self.test_port_override {
            return Ok(port.clone());
        }

        if !gateway.provider.supports_environment(gateway.environment) {
            return Err(AppError::InvalidInput(format!(
                "{} does not support {} environment",
                gateway.provider.display_name(),
                gateway.environment
            )));
        }

        match gateway.provider {
            GatewayProvider::Asaas => {
                let credentials = self.credentials(gateway)?;
                Ok(Arc::new(AsaasPaymentAdapter::new(
                    self.http.clone(),
                    credentials,
                    gateway.environment,
                )))
            }
            GatewayProvider::MercadoPago => {
                let credentials = self.credentials(gateway)?;
                Ok(Arc::new(MercadoPagoPaymentAdapter::new(
                    self.http.clone(),
                    credentials,
                    gateway.environment,
                )))
            }
            // Dummy provider needs no credentials
            GatewayProvider::Dummy => Ok(Arc::new(DummyPaymentClient::new(gateway.id))),
        }
    }

    fn credentials(&self, gateway: &PaymentGatewayProfile) -> AppResult<GatewayCredentials> {
        let json = self.cipher.decrypt(&gateway.credentials_encrypted)?;
        serde_json::from_str(&json)
            .map_err(|e| AppError::Internal(format!("invalid stored gateway credentials: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::entities::gateway_environment::GatewayEnvironment,
        infra::http_client::build_client,
        test_utils::{create_test_gateway, test_cipher},
    };
    use std::time::Duration;

    fn factory() -> PaymentGatewayFactory {
        PaymentGatewayFactory::new(test_cipher(), build_client(Duration::from_secs(5)).unwrap())
    }

    #[test]
    fn test_builds_port_per_provider() {
        let cipher = test_cipher();
        let credentials = cipher
            .encrypt(r#"{"api_key":"k","webhook_secret":"s"}"#)
            .unwrap();

        for provider in [GatewayProvider::Asaas, GatewayProvider::MercadoPago] {
            let gateway = create_test_gateway(|g| {
                g.provider = provider;
                g.credentials_encrypted = credentials.clone();
            });
            let port = factory().get(&gateway).unwrap();
            assert_eq!(port.provider(), provider);
        }

        let dummy = create_test_gateway(|g| g.provider = GatewayProvider::Dummy);
        assert_eq!(factory().get(&dummy).unwrap().provider(), GatewayProvider::Dummy);
    }

    #[test]
    fn test_rejects_dummy_in_production() {
        let gateway = create_test_gateway(|g| {
            g.provider = GatewayProvider::Dummy;
            g.environment = GatewayEnvironment::Production;
        });
        assert!(matches!(
            factory().get(&gateway).err().unwrap(),
            AppError::InvalidInput(_)
        ));
    }

    #[test]
    fn test_undecryptable_credentials() {
        let gateway = create_test_gateway(|g| {
            g.provider = GatewayProvider::Asaas;
            g.credentials_encrypted = "not-ciphertext".into();
        });
        assert!(matches!(
            factory().get(&gateway).err().unwrap(),
            AppError::Internal(_)
        ));
    }
}
