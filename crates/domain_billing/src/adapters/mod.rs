//! Processor adapters
//!
//! External-facing implementations of the billing domain's processor port:
//! an HTTP client for the card-payment processor's REST API and the
//! signature verification for its signed webhook deliveries.

pub mod processor;
pub mod signature;

pub use processor::{HttpPaymentProcessor, ProcessorConfig};
pub use signature::{construct_event, sign_payload, WebhookVerifyError};
