//! Billing domain ports
//!
//! This module defines the port interfaces the billing domain needs from
//! the outside world, enabling swappable implementations:
//!
//! - [`BillingStore`] / [`PartyStore`]: persistence. The production adapter
//!   lives in `infra_db` (PostgreSQL); test suites use an in-memory adapter.
//! - [`PaymentProcessor`]: the external card-payment processor. The
//!   production adapter is the HTTP client in `crate::adapters`; test
//!   suites use a fake.
//!
//! Compound store operations (`reconcile_invoice`, `apply_intent_event`,
//! `insert_refund_and_reconcile`) exist because their steps must share one
//! database transaction; adapters own the transaction boundary, the domain
//! owns the computation inside it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use core_kernel::{
    Currency, CustomerId, DomainPort, InvoiceId, Money, OwnerId, PaymentRecordId, PortError,
};

use crate::invoice::{Invoice, InvoiceStatus};
use crate::party::{BusinessOwner, Customer};
use crate::payment_record::PaymentRecord;

// ---------------------------------------------------------------------------
// Payment processor port
// ---------------------------------------------------------------------------

/// Errors surfaced by payment processor adapters
#[derive(Debug, Error)]
pub enum ProcessorError {
    /// Credentials are missing; no call was attempted
    #[error("Payment processor is not configured")]
    NotConfigured,

    /// The processor reports the charge was already refunded
    #[error("This payment has already been refunded")]
    AlreadyRefunded,

    /// The processor rejected the request
    #[error("Processor error {code}: {message}")]
    Api { code: String, message: String },

    /// The processor could not be reached
    #[error("Processor transport error: {0}")]
    Transport(String),
}

/// A processor-side payment intent
///
/// Doubles as the API response shape and the `data.object` payload of
/// `payment_intent.*` webhook events. Amounts are in minor units.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentIntent {
    /// Processor intent id
    pub id: String,
    /// Amount in minor currency units
    pub amount: i64,
    /// Lowercase ISO currency code
    pub currency: String,
    /// Processor-side status string
    pub status: String,
    /// Secret the payer's client uses to complete the payment
    #[serde(default)]
    pub client_secret: Option<String>,
    /// Attached payment method id, once known
    #[serde(default)]
    pub payment_method: Option<String>,
    /// Creation time, unix seconds
    pub created: i64,
    /// Metadata attached at creation
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    /// Details of the last failed payment attempt
    #[serde(default)]
    pub last_payment_error: Option<PaymentIntentError>,
}

/// Nested error structure on a failed payment intent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentIntentError {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// A processor-side refund object
///
/// Doubles as the API response shape and the `data.object` payload of
/// `refund.*` webhook events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Refund {
    /// Processor refund id
    pub id: String,
    /// Refunded amount in minor currency units
    #[serde(default)]
    pub amount: i64,
    /// Lowercase ISO currency code
    #[serde(default)]
    pub currency: Option<String>,
    /// Refund status ("succeeded", "pending", "failed")
    #[serde(default)]
    pub status: Option<String>,
    /// The payment intent this refund reverses
    #[serde(default)]
    pub payment_intent: Option<String>,
    /// Creation time, unix seconds
    #[serde(default)]
    pub created: Option<i64>,
    /// Metadata attached at creation
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// Request to create a payment intent
#[derive(Debug, Clone, Serialize)]
pub struct CreateIntentRequest {
    /// Amount in minor currency units
    pub amount: i64,
    /// Lowercase ISO currency code
    pub currency: String,
    /// Linking metadata (invoice id, invoice number, amount)
    pub metadata: HashMap<String, String>,
    /// Receipt email for the payer
    pub receipt_email: Option<String>,
    /// Allowed payment method families
    pub payment_method_types: Vec<String>,
    /// Whether the processor may pick payment methods automatically;
    /// always disabled by this system
    pub automatic_payment_methods: bool,
}

/// Request to create a refund
#[derive(Debug, Clone, Serialize)]
pub struct CreateRefundRequest {
    /// The payment intent to refund
    pub payment_intent: String,
    /// Amount in minor currency units
    pub amount: i64,
    /// Linking metadata (record id, invoice id, invoice number)
    pub metadata: HashMap<String, String>,
}

/// Port to the external card-payment processor
#[async_trait]
pub trait PaymentProcessor: DomainPort {
    /// Creates a payment intent and returns the processor's representation
    async fn create_payment_intent(
        &self,
        request: CreateIntentRequest,
    ) -> Result<PaymentIntent, ProcessorError>;

    /// Creates a refund against a payment intent
    async fn create_refund(&self, request: CreateRefundRequest) -> Result<Refund, ProcessorError>;
}

// ---------------------------------------------------------------------------
// Persistence ports
// ---------------------------------------------------------------------------

/// Fields for creating an invoice; the store assigns id, number, and
/// issue timestamp
#[derive(Debug, Clone)]
pub struct NewInvoice {
    pub owner_id: OwnerId,
    pub customer_id: CustomerId,
    pub due_date: DateTime<Utc>,
    pub currency: Currency,
    pub total_amount: Money,
}

/// Client-editable invoice fields
///
/// `amount_paid` is deliberately absent: it is derived state owned by the
/// reconciliation engine.
#[derive(Debug, Clone, Default)]
pub struct InvoiceUpdate {
    pub due_date: Option<DateTime<Utc>>,
    pub status: Option<InvoiceStatus>,
    pub total_amount: Option<Money>,
}

/// Result of applying a payment intent event
#[derive(Debug, Clone)]
pub struct IntentEventOutcome {
    /// The record after get-or-create and update
    pub record: PaymentRecord,
    /// The reconciled invoice, present only when the record ended up
    /// succeeded and reconciliation ran
    pub invoice: Option<Invoice>,
}

/// Persistence port for invoices and payment records
#[async_trait]
pub trait BillingStore: DomainPort {
    /// Readiness probe against the underlying storage
    async fn ping(&self) -> Result<(), PortError>;

    /// Persists a new invoice, assigning its monthly-sequence number
    /// atomically. A concurrent creation race surfaces as a Conflict from
    /// the number's uniqueness constraint; callers retry.
    async fn create_invoice(&self, new_invoice: NewInvoice) -> Result<Invoice, PortError>;

    async fn get_invoice(&self, id: InvoiceId) -> Result<Invoice, PortError>;

    /// All invoices, newest first
    async fn list_invoices(&self) -> Result<Vec<Invoice>, PortError>;

    async fn update_invoice(
        &self,
        id: InvoiceId,
        update: InvoiceUpdate,
    ) -> Result<Invoice, PortError>;

    /// Deletes the invoice and cascades to its payment records
    async fn delete_invoice(&self, id: InvoiceId) -> Result<(), PortError>;

    async fn get_record(&self, id: PaymentRecordId) -> Result<PaymentRecord, PortError>;

    async fn find_record_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<PaymentRecord>, PortError>;

    /// Payment records for an invoice, newest first
    async fn list_records_for_invoice(
        &self,
        invoice_id: InvoiceId,
    ) -> Result<Vec<PaymentRecord>, PortError>;

    async fn insert_record(&self, record: PaymentRecord) -> Result<PaymentRecord, PortError>;

    async fn update_record(&self, record: PaymentRecord) -> Result<PaymentRecord, PortError>;

    /// True when a refund ledger entry already references the given
    /// external id as its refunded original
    async fn has_refund_of(&self, original_external_id: &str) -> Result<bool, PortError>;

    /// Recomputes and persists the invoice aggregate from its records.
    ///
    /// Must run the record read, the recompute, and the invoice write in a
    /// single transaction with the invoice row locked for its duration, so
    /// concurrent reconciliations cannot clobber each other.
    async fn reconcile_invoice(&self, id: InvoiceId) -> Result<Invoice, PortError>;

    /// Applies a `payment_intent` webhook event atomically: get-or-create
    /// the record by external id (using `defaults` on a miss), apply the
    /// intent update, and reconcile the invoice only when the resulting
    /// record status is succeeded.
    async fn apply_intent_event(
        &self,
        defaults: PaymentRecord,
        intent: PaymentIntent,
    ) -> Result<IntentEventOutcome, PortError>;

    /// Inserts a refund ledger entry and reconciles its invoice in one
    /// transaction.
    async fn insert_refund_and_reconcile(
        &self,
        refund: PaymentRecord,
    ) -> Result<(PaymentRecord, Invoice), PortError>;
}

/// Persistence port for business owners and customers
///
/// Both tables are append/delete-only and need no special concurrency
/// discipline.
#[async_trait]
pub trait PartyStore: DomainPort {
    async fn create_owner(&self, owner: BusinessOwner) -> Result<BusinessOwner, PortError>;
    async fn get_owner(&self, id: OwnerId) -> Result<BusinessOwner, PortError>;
    async fn list_owners(&self) -> Result<Vec<BusinessOwner>, PortError>;
    async fn delete_owner(&self, id: OwnerId) -> Result<(), PortError>;

    async fn create_customer(&self, customer: Customer) -> Result<Customer, PortError>;
    async fn get_customer(&self, id: CustomerId) -> Result<Customer, PortError>;
    async fn list_customers(&self) -> Result<Vec<Customer>, PortError>;
    async fn delete_customer(&self, id: CustomerId) -> Result<(), PortError>;
}
