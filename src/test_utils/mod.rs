//! Test utilities shared by unit and HTTP tests.
//!
//! This module provides:
//! - Test data factories for creating valid test fixtures
//! - In-memory repository implementations for mocking persistence
//! - A scripted provider port and recording notification senders
//! - `TestBilling` and `TestAppStateBuilder` wiring it all together

mod app_state_builder;
mod billing_mocks;
mod factories;
mod gateway_mocks;
mod webhook_mocks;

pub use app_state_builder::*;
pub use billing_mocks::*;
pub use factories::*;
pub use gateway_mocks::*;
pub use webhook_mocks::*;
