//! Test Data Builders
//!
//! Builder patterns for constructing test entities with sensible defaults.
//! Tests specify only the fields they care about.

use chrono::{DateTime, Utc};
use rust_decimal_macros::dec;

use core_kernel::{Currency, CustomerId, InvoiceId, Money, OwnerId};
use domain_billing::invoice::{Invoice, InvoiceStatus};
use domain_billing::payment_record::{PaymentRecord, PaymentStatus};

use crate::fixtures::TemporalFixtures;

/// Builder for test invoices
pub struct TestInvoiceBuilder {
    owner_id: OwnerId,
    customer_id: CustomerId,
    number: String,
    due_date: DateTime<Utc>,
    currency: Currency,
    total_amount: Money,
    amount_paid: Option<Money>,
    status: Option<InvoiceStatus>,
}

impl Default for TestInvoiceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TestInvoiceBuilder {
    /// Creates a builder with default values
    pub fn new() -> Self {
        Self {
            owner_id: OwnerId::new(),
            customer_id: CustomerId::new(),
            number: "INV-202501-0001".to_string(),
            due_date: TemporalFixtures::due_date(),
            currency: Currency::USD,
            total_amount: Money::new(dec!(1000.00), Currency::USD),
            amount_paid: None,
            status: None,
        }
    }

    /// Sets the owner
    pub fn with_owner(mut self, owner_id: OwnerId) -> Self {
        self.owner_id = owner_id;
        self
    }

    /// Sets the customer
    pub fn with_customer(mut self, customer_id: CustomerId) -> Self {
        self.customer_id = customer_id;
        self
    }

    /// Sets the invoice number
    pub fn with_number(mut self, number: impl Into<String>) -> Self {
        self.number = number.into();
        self
    }

    /// Sets the total amount
    pub fn with_total(mut self, total: Money) -> Self {
        self.total_amount = total;
        self
    }

    /// Sets the collected amount (normally written only by reconciliation)
    pub fn with_paid(mut self, paid: Money) -> Self {
        self.amount_paid = Some(paid);
        self
    }

    /// Sets the lifecycle status
    pub fn with_status(mut self, status: InvoiceStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Sets the due date
    pub fn with_due_date(mut self, due_date: DateTime<Utc>) -> Self {
        self.due_date = due_date;
        self
    }

    /// Builds the invoice
    pub fn build(self) -> Invoice {
        let mut invoice = Invoice::issue(
            self.owner_id,
            self.customer_id,
            self.number,
            self.due_date,
            self.currency,
            self.total_amount,
        );
        if let Some(paid) = self.amount_paid {
            invoice.amount_paid = paid;
        }
        if let Some(status) = self.status {
            invoice.status = status;
        }
        invoice
    }
}

/// Builder for test payment records
pub struct TestPaymentRecordBuilder {
    external_id: String,
    invoice_id: InvoiceId,
    amount: Money,
    status: PaymentStatus,
}

impl Default for TestPaymentRecordBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TestPaymentRecordBuilder {
    /// Creates a builder with default values
    pub fn new() -> Self {
        Self {
            external_id: format!("pi_{}", uuid::Uuid::new_v4().simple()),
            invoice_id: InvoiceId::new(),
            amount: Money::new(dec!(1000.00), Currency::USD),
            status: PaymentStatus::RequiresPaymentMethod,
        }
    }

    /// Sets the external transaction id
    pub fn with_external_id(mut self, external_id: impl Into<String>) -> Self {
        self.external_id = external_id.into();
        self
    }

    /// Sets the owning invoice
    pub fn for_invoice(mut self, invoice_id: InvoiceId) -> Self {
        self.invoice_id = invoice_id;
        self
    }

    /// Sets the amount
    pub fn with_amount(mut self, amount: Money) -> Self {
        self.amount = amount;
        self
    }

    /// Sets the status
    pub fn with_status(mut self, status: PaymentStatus) -> Self {
        self.status = status;
        self
    }

    /// Marks the record as succeeded
    pub fn succeeded(self) -> Self {
        self.with_status(PaymentStatus::Succeeded)
    }

    /// Builds the record
    pub fn build(self) -> PaymentRecord {
        PaymentRecord::pending(self.external_id, self.invoice_id, self.amount, Utc::now())
            .with_status(self.status)
    }
}
