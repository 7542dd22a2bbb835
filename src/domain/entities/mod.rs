pub mod billing_period;
pub mod gateway_environment;
pub mod gateway_provider;
pub mod invoice;
pub mod money;
pub mod payment_method;
pub mod payment_status;
pub mod reminder;
pub mod subscription;
pub mod webhook;
