//! Webhook event dispatching
//!
//! Routes verified processor events to the payment service. Dispatch is
//! single-pass with no internal retries: redelivery is the processor's
//! responsibility, and the reconciliation engine's recompute-from-scratch
//! design makes redelivered or out-of-order events safe to apply.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::BillingError;
use crate::services::{PaymentService, REFUND_STATUS_SUCCEEDED};
use crate::ports::{PaymentIntent, Refund};

/// Event type strings delivered by the processor
pub mod event_types {
    pub const PAYMENT_INTENT_SUCCEEDED: &str = "payment_intent.succeeded";
    pub const PAYMENT_INTENT_PAYMENT_FAILED: &str = "payment_intent.payment_failed";
    pub const REFUND_CREATED: &str = "refund.created";
    pub const REFUND_UPDATED: &str = "refund.updated";
    pub const CHARGE_DISPUTE_CREATED: &str = "charge.dispute.created";
}

/// A verified webhook event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEvent {
    /// Processor event id
    #[serde(default)]
    pub id: Option<String>,
    /// Event type string
    #[serde(rename = "type")]
    pub event_type: String,
    /// Event payload
    pub data: WebhookEventData,
}

/// The `data` envelope of a webhook event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEventData {
    /// The processor object the event describes
    pub object: serde_json::Value,
}

impl WebhookEvent {
    /// Deserializes the event object into a concrete processor type
    pub fn object<T: DeserializeOwned>(&self) -> Result<T, BillingError> {
        serde_json::from_value(self.data.object.clone())
            .map_err(|e| BillingError::InvalidRequest(format!("Malformed event object: {}", e)))
    }
}

/// A dispute object, logged but never acted on
#[derive(Debug, Clone, Deserialize)]
pub struct Dispute {
    pub id: String,
    #[serde(default)]
    pub charge: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

/// How a dispatched event was handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// A recognized event type was handled (including no-op branches)
    Processed,
    /// The event type is unknown; accepted and logged
    Ignored,
}

/// Routes inbound processor events to the payment service
pub struct WebhookDispatcher {
    payments: PaymentService,
}

impl WebhookDispatcher {
    /// Creates a new dispatcher
    pub fn new(payments: PaymentService) -> Self {
        Self { payments }
    }

    /// Dispatches a verified event by type
    ///
    /// Unknown event types are accepted and logged, never rejected. Errors
    /// from recognized handlers propagate to the HTTP layer, which answers
    /// with a 400; the processor redelivers on its own schedule.
    pub async fn dispatch(&self, event: WebhookEvent) -> Result<WebhookOutcome, BillingError> {
        tracing::info!(event_type = %event.event_type, "processing webhook event");

        match event.event_type.as_str() {
            event_types::PAYMENT_INTENT_SUCCEEDED => {
                let intent: PaymentIntent = event.object()?;
                tracing::info!(intent_id = %intent.id, "processing successful payment");
                self.payments.process_successful_intent(intent).await?;
                Ok(WebhookOutcome::Processed)
            }
            event_types::PAYMENT_INTENT_PAYMENT_FAILED => {
                let intent: PaymentIntent = event.object()?;
                tracing::info!(intent_id = %intent.id, "processing failed payment");
                self.payments.process_failed_intent(intent).await?;
                Ok(WebhookOutcome::Processed)
            }
            event_types::REFUND_CREATED => {
                let refund: Refund = event.object()?;
                self.handle_refund(refund).await
            }
            event_types::REFUND_UPDATED => {
                let refund: Refund = event.object()?;
                if refund.status.as_deref() == Some(REFUND_STATUS_SUCCEEDED) {
                    self.handle_refund(refund).await
                } else {
                    tracing::info!(
                        refund_id = %refund.id,
                        status = ?refund.status,
                        "refund update not succeeded, not processing"
                    );
                    Ok(WebhookOutcome::Processed)
                }
            }
            event_types::CHARGE_DISPUTE_CREATED => {
                let dispute: Dispute = event.object()?;
                if let Some(charge) = &dispute.charge {
                    tracing::warn!(
                        dispute_id = %dispute.id,
                        %charge,
                        reason = ?dispute.reason,
                        "chargeback/dispute created"
                    );
                }
                Ok(WebhookOutcome::Processed)
            }
            other => {
                tracing::info!(event_type = %other, "unhandled event type");
                Ok(WebhookOutcome::Ignored)
            }
        }
    }

    async fn handle_refund(&self, refund: Refund) -> Result<WebhookOutcome, BillingError> {
        let Some(payment_intent_id) = refund.payment_intent.clone() else {
            tracing::error!(refund_id = %refund.id, "payment intent not found for refund");
            return Ok(WebhookOutcome::Processed);
        };

        self.payments
            .process_refund_event(&payment_intent_id, refund)
            .await?;
        tracing::info!(%payment_intent_id, "processed refund event");
        Ok(WebhookOutcome::Processed)
    }
}
