//! Invoice DTOs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use domain_billing::invoice::Invoice;

/// Request body for creating an invoice
#[derive(Debug, Deserialize)]
pub struct CreateInvoiceRequest {
    pub owner_id: Uuid,
    pub customer_id: Uuid,
    pub due_date: DateTime<Utc>,
    /// ISO 4217 code; defaults to USD
    pub currency: Option<String>,
    pub total_amount: Decimal,
}

/// Request body for updating an invoice
///
/// `amount_paid` is not accepted: it is derived state owned by the
/// reconciliation engine.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateInvoiceRequest {
    pub due_date: Option<DateTime<Utc>>,
    pub status: Option<String>,
    pub total_amount: Option<Decimal>,
}

/// Invoice representation returned by the API
#[derive(Debug, Serialize)]
pub struct InvoiceResponse {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub customer_id: Uuid,
    pub invoice_number: String,
    pub issued_at: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub currency: String,
    pub status: String,
    pub payment_status: String,
    pub total_amount: Decimal,
    pub amount_paid: Decimal,
    pub amount_due: Decimal,
    pub updated_at: DateTime<Utc>,
}

impl From<Invoice> for InvoiceResponse {
    fn from(invoice: Invoice) -> Self {
        Self {
            id: invoice.id.into(),
            owner_id: invoice.owner_id.into(),
            customer_id: invoice.customer_id.into(),
            invoice_number: invoice.number.clone(),
            issued_at: invoice.issued_at,
            due_date: invoice.due_date,
            currency: invoice.currency.code().to_string(),
            status: invoice.status.as_str().to_string(),
            payment_status: invoice.payment_status.as_str().to_string(),
            total_amount: invoice.total_amount.amount(),
            amount_paid: invoice.amount_paid.amount(),
            amount_due: invoice.amount_due().amount(),
            updated_at: invoice.updated_at,
        }
    }
}
