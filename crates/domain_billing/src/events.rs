//! Domain events
//!
//! Service-layer operations emit explicit events for creation, deletion,
//! status changes, and reconciliation outcomes. Events are consumed by an
//! injected [`EventSink`]; emission is strictly best-effort and can never
//! fail the operation that produced the event.

use rust_decimal::Decimal;

use core_kernel::{CustomerId, InvoiceId, OwnerId, PaymentRecordId};

use crate::invoice::InvoiceStatus;

/// Externally observable domain events
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainEvent {
    InvoiceCreated {
        invoice_id: InvoiceId,
        customer_id: CustomerId,
    },
    InvoiceNumberAssigned {
        invoice_id: InvoiceId,
        number: String,
    },
    InvoiceStatusChanged {
        invoice_id: InvoiceId,
        old_status: InvoiceStatus,
        new_status: InvoiceStatus,
    },
    InvoiceDeleted {
        invoice_id: InvoiceId,
    },
    InvoiceReconciled {
        invoice_id: InvoiceId,
        amount_paid: Decimal,
        status: InvoiceStatus,
    },
    PaymentIntentCreated {
        invoice_id: InvoiceId,
        external_id: String,
        amount: Decimal,
    },
    PaymentRecorded {
        invoice_id: InvoiceId,
        external_id: String,
        amount: Decimal,
    },
    RefundRecorded {
        invoice_id: InvoiceId,
        record_id: PaymentRecordId,
        external_id: String,
        amount: Decimal,
    },
    OwnerCreated {
        owner_id: OwnerId,
    },
    OwnerDeleted {
        owner_id: OwnerId,
    },
    CustomerCreated {
        customer_id: CustomerId,
    },
    CustomerDeleted {
        customer_id: CustomerId,
    },
}

/// Consumer of domain events
///
/// Implementations must swallow their own failures; `emit` is infallible
/// from the caller's point of view.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: DomainEvent);
}

/// Production sink that logs structured tracing events
#[derive(Debug, Clone, Default)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn emit(&self, event: DomainEvent) {
        match &event {
            DomainEvent::InvoiceCreated {
                invoice_id,
                customer_id,
            } => {
                tracing::info!(%invoice_id, %customer_id, "invoice created");
            }
            DomainEvent::InvoiceNumberAssigned { invoice_id, number } => {
                tracing::info!(%invoice_id, %number, "invoice number generated");
            }
            DomainEvent::InvoiceStatusChanged {
                invoice_id,
                old_status,
                new_status,
            } => {
                tracing::info!(%invoice_id, %old_status, %new_status, "invoice status changed");
            }
            DomainEvent::InvoiceDeleted { invoice_id } => {
                tracing::info!(%invoice_id, "invoice deleted");
            }
            DomainEvent::InvoiceReconciled {
                invoice_id,
                amount_paid,
                status,
            } => {
                tracing::info!(%invoice_id, %amount_paid, %status, "invoice reconciled");
            }
            DomainEvent::PaymentIntentCreated {
                invoice_id,
                external_id,
                amount,
            } => {
                tracing::info!(%invoice_id, %external_id, %amount, "payment intent created");
            }
            DomainEvent::PaymentRecorded {
                invoice_id,
                external_id,
                amount,
            } => {
                tracing::info!(%invoice_id, %external_id, %amount, "payment recorded");
            }
            DomainEvent::RefundRecorded {
                invoice_id,
                record_id,
                external_id,
                amount,
            } => {
                tracing::info!(%invoice_id, %record_id, %external_id, %amount, "refund recorded");
            }
            DomainEvent::OwnerCreated { owner_id } => {
                tracing::info!(%owner_id, "business owner created");
            }
            DomainEvent::OwnerDeleted { owner_id } => {
                tracing::info!(%owner_id, "business owner deleted");
            }
            DomainEvent::CustomerCreated { customer_id } => {
                tracing::info!(%customer_id, "customer created");
            }
            DomainEvent::CustomerDeleted { customer_id } => {
                tracing::info!(%customer_id, "customer deleted");
            }
        }
    }
}
