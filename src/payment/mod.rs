//! Payment reconciliation: deposits and withdrawals resolved exactly once.

pub mod config;
pub mod models;
pub mod workflow;

pub use config::PaymentConfig;
pub use models::{Direction, PaymentRequest, RequestId, RequestStatus};
pub use workflow::PaymentWorkflow;
