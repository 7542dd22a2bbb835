pub mod billing_automation;
pub mod gateway_factory;
pub mod gateway_registry;
pub mod gateway_service;
pub mod invoice;
pub mod payment;
pub mod payment_orchestrator;
pub mod tenancy;
pub mod webhook_ingestion;
