//! Invoice entity and ledger rules
//!
//! This module owns the derived-state rules for invoices: amount due,
//! paid/partially-paid predicates, and invoice number generation.

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use core_kernel::{Currency, CustomerId, InvoiceId, Money, OwnerId};

use crate::payment_record::PaymentStatus;

/// Invoice lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    /// Invoice has been sent to the customer
    Sent,
    /// Partial payment received
    Partial,
    /// Fully paid
    Paid,
    /// Cancelled/voided
    Canceled,
    /// Past due date
    Overdue,
    /// Net payments fully refunded
    Refunded,
}

/// Raised when a persisted status string does not match any known variant
#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unknown status value: {0}")]
pub struct UnknownStatus(pub String);

impl InvoiceStatus {
    /// Returns the wire/database representation
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Sent => "sent",
            InvoiceStatus::Partial => "partial",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Canceled => "canceled",
            InvoiceStatus::Overdue => "overdue",
            InvoiceStatus::Refunded => "refunded",
        }
    }
}

impl std::str::FromStr for InvoiceStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sent" => Ok(InvoiceStatus::Sent),
            "partial" => Ok(InvoiceStatus::Partial),
            "paid" => Ok(InvoiceStatus::Paid),
            "canceled" => Ok(InvoiceStatus::Canceled),
            "overdue" => Ok(InvoiceStatus::Overdue),
            "refunded" => Ok(InvoiceStatus::Refunded),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

impl std::fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An invoice issued by a business owner to a customer
///
/// `amount_paid` is derived state: it is only ever written by the
/// reconciliation engine, never set directly by clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    /// Unique identifier
    pub id: InvoiceId,
    /// Issuing business owner
    pub owner_id: OwnerId,
    /// Billed customer
    pub customer_id: CustomerId,
    /// Human-readable invoice number, assigned once at creation
    pub number: String,
    /// When the invoice was issued
    pub issued_at: DateTime<Utc>,
    /// Payment due date
    pub due_date: DateTime<Utc>,
    /// Invoice currency
    pub currency: Currency,
    /// Lifecycle status
    pub status: InvoiceStatus,
    /// Aggregate payment status, mirroring the processor vocabulary
    pub payment_status: PaymentStatus,
    /// Total amount billed
    pub total_amount: Money,
    /// Net amount collected (payments minus refunds)
    pub amount_paid: Money,
    /// Last modification timestamp
    pub updated_at: DateTime<Utc>,
}

impl Invoice {
    /// Creates a newly issued invoice
    ///
    /// Status starts at `sent` with nothing collected. The invoice number
    /// must already have been allocated (see [`invoice_number`]).
    pub fn issue(
        owner_id: OwnerId,
        customer_id: CustomerId,
        number: String,
        due_date: DateTime<Utc>,
        currency: Currency,
        total_amount: Money,
    ) -> Self {
        let now = Utc::now();

        Self {
            id: InvoiceId::new_v7(),
            owner_id,
            customer_id,
            number,
            issued_at: now,
            due_date,
            currency,
            status: InvoiceStatus::Sent,
            payment_status: PaymentStatus::RequiresPaymentMethod,
            total_amount,
            amount_paid: Money::zero(currency),
            updated_at: now,
        }
    }

    /// Returns the outstanding balance
    ///
    /// May be negative when the invoice is overpaid; the value is not
    /// clamped.
    pub fn amount_due(&self) -> Money {
        self.total_amount - self.amount_paid
    }

    /// Returns true when the collected amount covers the total
    pub fn is_paid(&self) -> bool {
        self.amount_paid.amount() >= self.total_amount.amount()
    }

    /// Returns true when something has been collected but not the full total
    pub fn is_partially_paid(&self) -> bool {
        self.amount_paid.is_positive() && self.amount_paid.amount() < self.total_amount.amount()
    }
}

/// Formats an invoice number for the given issue time and monthly sequence
///
/// The sequence is 1-based and counts invoices issued in the same calendar
/// month, across all owners. Format: `INV-{year}{month:02}-{seq:04}`.
pub fn invoice_number(issued_at: DateTime<Utc>, sequence: u32) -> String {
    format!(
        "INV-{}{:02}-{:04}",
        issued_at.year(),
        issued_at.month(),
        sequence
    )
}
