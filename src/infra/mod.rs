use crate::{adapters::persistence::PostgresPersistence, infra::db::init_db};

pub mod app;
pub mod asaas_client;
pub mod asaas_gateway;
pub mod billing_scheduler;
pub mod config;
pub mod crypto;
pub mod db;
pub mod dummy_gateway;
pub mod error;
pub mod http_client;
pub mod mercado_pago_client;
pub mod mercado_pago_gateway;
pub mod setup;
pub mod webhook_signature;

pub use error::InfraError;

pub async fn postgres_persistence(database_url: &str) -> anyhow::Result<PostgresPersistence> {
    let pool = init_db(database_url).await?;
    let persistence = PostgresPersistence::new(pool);
    Ok(persistence)
}
