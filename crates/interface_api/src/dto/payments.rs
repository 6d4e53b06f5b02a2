//! Payment DTOs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;
use validator::Validate;

use domain_billing::payment_record::PaymentRecord;
use domain_billing::services::PaymentIntentReceipt;

/// Request body for creating a payment intent
#[derive(Debug, Deserialize, Validate)]
pub struct CreatePaymentIntentRequest {
    pub invoice_id: Uuid,
    /// Receipt email for the payer
    #[validate(email)]
    pub payer_email: Option<String>,
    /// Partial payment amount; omitted means the full amount due
    pub payment_amount: Option<Decimal>,
}

/// Response for a created payment intent
#[derive(Debug, Serialize)]
pub struct PaymentIntentResponse {
    pub intent_id: String,
    pub client_secret: Option<String>,
    pub amount: Decimal,
    pub currency: String,
    pub record_id: Uuid,
}

impl PaymentIntentResponse {
    pub fn from_receipt(receipt: PaymentIntentReceipt) -> Self {
        Self {
            intent_id: receipt.intent_id,
            client_secret: receipt.client_secret,
            amount: receipt.amount.amount(),
            currency: receipt.amount.currency().code().to_string(),
            record_id: receipt.record_id.into(),
        }
    }
}

/// Payment record representation returned by the API
#[derive(Debug, Serialize)]
pub struct PaymentRecordResponse {
    pub id: Uuid,
    pub external_id: String,
    pub invoice_id: Uuid,
    pub amount: Decimal,
    pub currency: String,
    pub status: String,
    pub payment_method_type: String,
    pub failure_code: Option<String>,
    pub failure_message: Option<String>,
    pub metadata: HashMap<String, String>,
    pub processor_created_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl From<PaymentRecord> for PaymentRecordResponse {
    fn from(record: PaymentRecord) -> Self {
        Self {
            id: record.id.into(),
            external_id: record.external_id,
            invoice_id: record.invoice_id.into(),
            amount: record.amount.amount(),
            currency: record.amount.currency().code().to_string(),
            status: record.status.as_str().to_string(),
            payment_method_type: record.payment_method_type,
            failure_code: record.failure_code,
            failure_message: record.failure_message,
            metadata: record.metadata,
            processor_created_at: record.processor_created_at,
            created_at: record.created_at,
        }
    }
}

/// Response for a processed refund
#[derive(Debug, Serialize)]
pub struct RefundResponse {
    pub message: String,
    pub refund: PaymentRecordResponse,
}
