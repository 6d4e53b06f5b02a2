//! Billing Domain - Invoicing and Payment Reconciliation
//!
//! This crate implements the core of the invoicing backend: invoices and
//! their derived ledger state, payment records keyed by processor
//! transaction ids, and the reconciliation engine that recomputes an
//! invoice's aggregate paid/refunded state from its full record set.
//!
//! # Reconciliation model
//!
//! Payments and refunds are both ledger entries; refunds carry a composite
//! external id linking back to the transaction they reverse. The invoice
//! aggregate (`amount_paid`, `status`, `payment_status`) is never edited
//! directly - it is recomputed from scratch whenever a record changes:
//!
//! ```rust,ignore
//! use domain_billing::reconciliation::reconcile;
//!
//! let outcome = reconcile(&invoice, &records);
//! outcome.apply(&mut invoice);
//! ```
//!
//! Recomputing from scratch makes webhook processing idempotent and
//! order-independent: however the processor delivers its events, the final
//! pass over the persisted records settles on the same aggregate.
//!
//! # Ports
//!
//! The domain talks to the outside world through ports: [`ports::BillingStore`]
//! and [`ports::PartyStore`] for persistence, [`ports::PaymentProcessor`]
//! for the external card processor, and [`events::EventSink`] for
//! observability events. Production adapters live in `infra_db` and
//! [`adapters`]; tests use in-memory and fake implementations.

pub mod adapters;
pub mod error;
pub mod events;
pub mod invoice;
pub mod party;
pub mod payment_record;
pub mod ports;
pub mod reconciliation;
pub mod services;
pub mod webhook;

pub use error::BillingError;
pub use events::{DomainEvent, EventSink, TracingEventSink};
pub use invoice::{invoice_number, Invoice, InvoiceStatus, UnknownStatus};
pub use party::{BusinessOwner, Customer};
pub use payment_record::{PaymentRecord, PaymentStatus, PAYMENT_METHOD_CARD};
pub use ports::{
    BillingStore, CreateIntentRequest, CreateRefundRequest, IntentEventOutcome, InvoiceUpdate,
    NewInvoice, PartyStore, PaymentIntent, PaymentIntentError, PaymentProcessor, ProcessorError,
    Refund,
};
pub use reconciliation::{reconcile, Reconciliation};
pub use services::{
    InvoiceService, PartyService, PaymentIntentReceipt, PaymentService, MINIMUM_CHARGE,
};
pub use webhook::{WebhookDispatcher, WebhookEvent, WebhookOutcome};
