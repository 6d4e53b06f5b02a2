//! Billing domain errors

use rust_decimal::Decimal;
use thiserror::Error;

use core_kernel::{MoneyError, PortError};

use crate::ports::ProcessorError;

/// Errors that can occur in the billing domain
#[derive(Debug, Error)]
pub enum BillingError {
    /// Invoice not found
    #[error("Invoice not found: {0}")]
    InvoiceNotFound(String),

    /// Payment record not found
    #[error("Payment record not found: {0}")]
    PaymentNotFound(String),

    /// Business owner not found
    #[error("Business owner not found: {0}")]
    OwnerNotFound(String),

    /// Customer not found
    #[error("Customer not found: {0}")]
    CustomerNotFound(String),

    /// Invoice is already fully paid
    #[error("Invoice is already fully paid")]
    AlreadyPaid,

    /// Payment amount must be positive
    #[error("Payment amount must be positive")]
    AmountNotPositive,

    /// Payment amount exceeds the outstanding balance
    #[error("Payment amount exceeds amount due")]
    AmountExceedsDue,

    /// Payment amount is below the processor minimum
    #[error("Payment amount must be at least {minimum}")]
    AmountTooSmall { minimum: Decimal },

    /// The referenced payment cannot be refunded
    #[error("Cannot refund: payment not found or not successful")]
    RefundInvalidPayment,

    /// The payment has already been refunded
    #[error("This payment has already been refunded")]
    AlreadyRefunded,

    /// A payment event arrived without a usable invoice reference
    #[error("Payment event is missing an invoice reference")]
    MissingInvoiceReference,

    /// Request failed validation
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// A refund failed at the processor for a reason other than
    /// already-refunded
    #[error("Refund processing error: {0}")]
    RefundProcessing(String),

    /// The processor rejected or failed an operation
    #[error(transparent)]
    Processor(#[from] ProcessorError),

    /// The persistence layer failed
    #[error(transparent)]
    Store(#[from] PortError),
}

impl From<MoneyError> for BillingError {
    fn from(error: MoneyError) -> Self {
        BillingError::InvalidRequest(error.to_string())
    }
}

impl BillingError {
    /// True for errors that map to a 404-style response
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            BillingError::InvoiceNotFound(_)
                | BillingError::PaymentNotFound(_)
                | BillingError::OwnerNotFound(_)
                | BillingError::CustomerNotFound(_)
        ) || matches!(self, BillingError::Store(e) if e.is_not_found())
    }

    /// True for errors that map to a 409-style response
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            BillingError::AlreadyPaid | BillingError::AlreadyRefunded
        ) || matches!(self, BillingError::Store(e) if e.is_conflict())
    }
}
