//! Payment records
//!
//! Every processor-side payment or refund attempt against an invoice is
//! persisted as a [`PaymentRecord`] keyed by the processor's transaction id.
//! Refunds are represented as distinct ledger entries with a composite
//! external id rather than negative adjustments to the original record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use core_kernel::{InvoiceId, Money, PaymentRecordId};

use crate::invoice::UnknownStatus;
use crate::ports::PaymentIntent;

/// Metadata keys used to tie processor objects back to local entities
pub mod metadata {
    /// Invoice the payment or refund belongs to
    pub const INVOICE_ID: &str = "invoice_id";
    /// Human-readable invoice number, for processor-side dashboards
    pub const INVOICE_NUMBER: &str = "invoice_number";
    /// Amount requested when the intent was created
    pub const PAYMENT_AMOUNT: &str = "payment_amount";
    /// Local record id attached to refund requests
    pub const PAYMENT_RECORD_ID: &str = "payment_record_id";
    /// Processor refund id on refund ledger entries
    pub const REFUND_ID: &str = "refund_id";
    /// External id of the payment a refund entry reverses
    pub const ORIGINAL_PAYMENT_INTENT: &str = "original_payment_intent";
    /// Refunded amount recorded on refund ledger entries
    pub const REFUND_AMOUNT: &str = "refund_amount";
}

/// Default payment method type for card collection
pub const PAYMENT_METHOD_CARD: &str = "card";

/// Payment status vocabulary shared with the processor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    RequiresPaymentMethod,
    RequiresConfirmation,
    RequiresAction,
    Processing,
    Succeeded,
    Canceled,
    Refunded,
}

impl PaymentStatus {
    /// Returns the wire/database representation
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::RequiresPaymentMethod => "requires_payment_method",
            PaymentStatus::RequiresConfirmation => "requires_confirmation",
            PaymentStatus::RequiresAction => "requires_action",
            PaymentStatus::Processing => "processing",
            PaymentStatus::Succeeded => "succeeded",
            PaymentStatus::Canceled => "canceled",
            PaymentStatus::Refunded => "refunded",
        }
    }

    /// Maps a processor-reported intent status to the local vocabulary
    ///
    /// The mapping table is fixed; statuses outside it return `None` and
    /// leave the local status unchanged.
    pub fn from_processor(status: &str) -> Option<PaymentStatus> {
        match status {
            "requires_payment_method" => Some(PaymentStatus::RequiresPaymentMethod),
            "requires_confirmation" => Some(PaymentStatus::RequiresConfirmation),
            "requires_action" => Some(PaymentStatus::RequiresAction),
            "processing" => Some(PaymentStatus::Processing),
            "succeeded" => Some(PaymentStatus::Succeeded),
            "canceled" => Some(PaymentStatus::Canceled),
            _ => None,
        }
    }
}

impl std::str::FromStr for PaymentStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "requires_payment_method" => Ok(PaymentStatus::RequiresPaymentMethod),
            "requires_confirmation" => Ok(PaymentStatus::RequiresConfirmation),
            "requires_action" => Ok(PaymentStatus::RequiresAction),
            "processing" => Ok(PaymentStatus::Processing),
            "succeeded" => Ok(PaymentStatus::Succeeded),
            "canceled" => Ok(PaymentStatus::Canceled),
            "refunded" => Ok(PaymentStatus::Refunded),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A persisted payment or refund attempt against an invoice
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRecord {
    /// Unique identifier
    pub id: PaymentRecordId,
    /// Processor transaction id; refund entries use a composite id
    pub external_id: String,
    /// Owning invoice
    pub invoice_id: InvoiceId,
    /// Amount of the attempt; refunds store the refunded magnitude, not a
    /// negative number
    pub amount: Money,
    /// Current status
    pub status: PaymentStatus,
    /// Payment method family ("card", ...)
    pub payment_method_type: String,
    /// Processor payment method id, once attached
    pub payment_method_id: Option<String>,
    /// Client secret for completing the intent client-side
    pub client_secret: Option<String>,
    /// Failure code reported by the processor, if any
    pub failure_code: Option<String>,
    /// Failure message reported by the processor, if any
    pub failure_message: Option<String>,
    /// Opaque metadata bag
    pub metadata: HashMap<String, String>,
    /// Creation time reported by the processor
    pub processor_created_at: DateTime<Utc>,
    /// Local creation timestamp
    pub created_at: DateTime<Utc>,
    /// Local last-update timestamp
    pub updated_at: DateTime<Utc>,
}

impl PaymentRecord {
    /// Creates a pending record for a freshly created payment intent
    pub fn pending(
        external_id: impl Into<String>,
        invoice_id: InvoiceId,
        amount: Money,
        processor_created_at: DateTime<Utc>,
    ) -> Self {
        let now = Utc::now();

        Self {
            id: PaymentRecordId::new_v7(),
            external_id: external_id.into(),
            invoice_id,
            amount,
            status: PaymentStatus::RequiresPaymentMethod,
            payment_method_type: PAYMENT_METHOD_CARD.to_string(),
            payment_method_id: None,
            client_secret: None,
            failure_code: None,
            failure_message: None,
            metadata: HashMap::new(),
            processor_created_at,
            created_at: now,
            updated_at: now,
        }
    }

    /// Sets the client secret
    pub fn with_client_secret(mut self, secret: impl Into<String>) -> Self {
        self.client_secret = Some(secret.into());
        self
    }

    /// Sets the initial status
    pub fn with_status(mut self, status: PaymentStatus) -> Self {
        self.status = status;
        self
    }

    /// Replaces the metadata bag
    pub fn with_metadata(mut self, metadata: HashMap<String, String>) -> Self {
        self.metadata = metadata;
        self
    }

    /// Builds the composite external id used for refund ledger entries
    pub fn refund_external_id(original_external_id: &str, refund_id: &str) -> String {
        format!("{}_refund_{}", original_external_id, refund_id)
    }

    /// Creates a refund ledger entry reversing `original`
    ///
    /// The entry carries a composite external id and metadata linking back
    /// to the refunded transaction.
    pub fn refund_entry(
        original: &PaymentRecord,
        refund_id: &str,
        amount: Money,
        processor_created_at: DateTime<Utc>,
    ) -> Self {
        let now = Utc::now();
        let mut metadata = HashMap::new();
        metadata.insert(metadata::REFUND_ID.to_string(), refund_id.to_string());
        metadata.insert(
            metadata::ORIGINAL_PAYMENT_INTENT.to_string(),
            original.external_id.clone(),
        );
        metadata.insert(
            metadata::REFUND_AMOUNT.to_string(),
            amount.amount().to_string(),
        );

        Self {
            id: PaymentRecordId::new_v7(),
            external_id: Self::refund_external_id(&original.external_id, refund_id),
            invoice_id: original.invoice_id,
            amount,
            status: PaymentStatus::Refunded,
            payment_method_type: original.payment_method_type.clone(),
            payment_method_id: None,
            client_secret: None,
            failure_code: None,
            failure_message: None,
            metadata,
            processor_created_at,
            created_at: now,
            updated_at: now,
        }
    }

    /// True when the attempt has been captured successfully
    pub fn is_successful(&self) -> bool {
        self.status == PaymentStatus::Succeeded
    }

    /// True when this record represents a refund ledger entry
    pub fn is_refund(&self) -> bool {
        self.status == PaymentStatus::Refunded
    }

    /// External id of the payment this refund entry reverses, if any
    pub fn refunded_external_id(&self) -> Option<&str> {
        self.metadata
            .get(metadata::ORIGINAL_PAYMENT_INTENT)
            .map(String::as_str)
    }

    /// Updates mutable fields from a processor payment intent
    ///
    /// Statuses outside the fixed mapping table leave the current status
    /// unchanged. Failure details are taken from the intent's nested error
    /// structure when present.
    pub fn apply_intent_update(&mut self, intent: &PaymentIntent) {
        if let Some(status) = PaymentStatus::from_processor(&intent.status) {
            self.status = status;
        }
        self.payment_method_id = intent.payment_method.clone();
        if intent.client_secret.is_some() {
            self.client_secret = intent.client_secret.clone();
        }
        if let Some(error) = &intent.last_payment_error {
            self.failure_code = error.code.clone();
            self.failure_message = error.message.clone();
        }
        self.metadata = intent.metadata.clone();
        self.updated_at = Utc::now();
    }
}
