//! Billing services
//!
//! Application services orchestrating invoices, payment intents, refunds,
//! and reconciliation across the persistence and processor ports. All
//! collaborators are injected, so the services are fully testable with
//! in-memory and fake adapters.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::sync::Arc;

use core_kernel::{CustomerId, InvoiceId, Money, OwnerId, PaymentRecordId};

use crate::error::BillingError;
use crate::events::{DomainEvent, EventSink};
use crate::invoice::Invoice;
use crate::party::{BusinessOwner, Customer};
use crate::payment_record::{metadata, PaymentRecord, PaymentStatus, PAYMENT_METHOD_CARD};
use crate::ports::{
    BillingStore, CreateIntentRequest, CreateRefundRequest, InvoiceUpdate, NewInvoice,
    PartyStore, PaymentIntent, PaymentProcessor, ProcessorError, Refund,
};

/// Minimum chargeable amount in the invoice's currency unit
pub const MINIMUM_CHARGE: Decimal = dec!(1.00);

/// Refund status the processor reports once money has moved
pub const REFUND_STATUS_SUCCEEDED: &str = "succeeded";

/// Attempts at invoice-number assignment before giving up on the
/// same-month creation race
const NUMBER_ASSIGNMENT_ATTEMPTS: u32 = 3;

/// What a caller needs to complete a payment client-side
#[derive(Debug, Clone)]
pub struct PaymentIntentReceipt {
    /// Processor intent id
    pub intent_id: String,
    /// Secret for the payer's client
    pub client_secret: Option<String>,
    /// Resolved charge amount
    pub amount: Money,
    /// The pending local record tracking this attempt
    pub record_id: PaymentRecordId,
}

/// Service for issuing and managing invoices
pub struct InvoiceService {
    store: Arc<dyn BillingStore>,
    parties: Arc<dyn PartyStore>,
    events: Arc<dyn EventSink>,
}

impl InvoiceService {
    /// Creates a new invoice service
    pub fn new(
        store: Arc<dyn BillingStore>,
        parties: Arc<dyn PartyStore>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            store,
            parties,
            events,
        }
    }

    /// Issues a new invoice
    ///
    /// Owner and customer must exist, the total must be positive, and the
    /// due date must not be in the past. Number assignment retries a
    /// bounded number of times when a concurrent creation in the same
    /// month wins the sequence race.
    pub async fn create_invoice(&self, new_invoice: NewInvoice) -> Result<Invoice, BillingError> {
        self.parties
            .get_owner(new_invoice.owner_id)
            .await
            .map_err(|e| match e {
                e if e.is_not_found() => {
                    BillingError::OwnerNotFound(new_invoice.owner_id.to_string())
                }
                e => BillingError::Store(e),
            })?;
        self.parties
            .get_customer(new_invoice.customer_id)
            .await
            .map_err(|e| match e {
                e if e.is_not_found() => {
                    BillingError::CustomerNotFound(new_invoice.customer_id.to_string())
                }
                e => BillingError::Store(e),
            })?;

        if !new_invoice.total_amount.is_positive() {
            return Err(BillingError::InvalidRequest(
                "Total amount must be greater than zero".to_string(),
            ));
        }
        if new_invoice.due_date.date_naive() < Utc::now().date_naive() {
            return Err(BillingError::InvalidRequest(
                "Due date cannot be in the past".to_string(),
            ));
        }

        let mut attempt = 1;
        let invoice = loop {
            match self.store.create_invoice(new_invoice.clone()).await {
                Ok(invoice) => break invoice,
                Err(e) if e.is_conflict() && attempt < NUMBER_ASSIGNMENT_ATTEMPTS => {
                    tracing::warn!(attempt, "invoice number collision, retrying");
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        };

        self.events.emit(DomainEvent::InvoiceCreated {
            invoice_id: invoice.id,
            customer_id: invoice.customer_id,
        });
        self.events.emit(DomainEvent::InvoiceNumberAssigned {
            invoice_id: invoice.id,
            number: invoice.number.clone(),
        });

        Ok(invoice)
    }

    /// Fetches an invoice by id
    pub async fn get_invoice(&self, id: InvoiceId) -> Result<Invoice, BillingError> {
        self.store
            .get_invoice(id)
            .await
            .map_err(|e| invoice_not_found(e, id))
    }

    /// Lists invoices, newest first
    pub async fn list_invoices(&self) -> Result<Vec<Invoice>, BillingError> {
        Ok(self.store.list_invoices().await?)
    }

    /// Updates client-editable invoice fields
    pub async fn update_invoice(
        &self,
        id: InvoiceId,
        update: InvoiceUpdate,
    ) -> Result<Invoice, BillingError> {
        if let Some(total) = &update.total_amount {
            if !total.is_positive() {
                return Err(BillingError::InvalidRequest(
                    "Total amount must be greater than zero".to_string(),
                ));
            }
        }
        if let Some(due_date) = update.due_date {
            if due_date.date_naive() < Utc::now().date_naive() {
                return Err(BillingError::InvalidRequest(
                    "Due date cannot be in the past".to_string(),
                ));
            }
        }

        let before = self
            .store
            .get_invoice(id)
            .await
            .map_err(|e| invoice_not_found(e, id))?;
        let after = self.store.update_invoice(id, update).await?;

        if before.status != after.status {
            self.events.emit(DomainEvent::InvoiceStatusChanged {
                invoice_id: after.id,
                old_status: before.status,
                new_status: after.status,
            });
        }

        Ok(after)
    }

    /// Deletes an invoice, cascading its payment records
    pub async fn delete_invoice(&self, id: InvoiceId) -> Result<(), BillingError> {
        self.store
            .delete_invoice(id)
            .await
            .map_err(|e| invoice_not_found(e, id))?;
        self.events.emit(DomainEvent::InvoiceDeleted { invoice_id: id });
        Ok(())
    }

    /// Lists payment records for an invoice, newest first
    pub async fn list_payments(&self, id: InvoiceId) -> Result<Vec<PaymentRecord>, BillingError> {
        // Resolve the invoice first so a bad id surfaces as 404, not an
        // empty list.
        self.store
            .get_invoice(id)
            .await
            .map_err(|e| invoice_not_found(e, id))?;
        Ok(self.store.list_records_for_invoice(id).await?)
    }
}

/// Service orchestrating payment collection and refunds
pub struct PaymentService {
    store: Arc<dyn BillingStore>,
    processor: Arc<dyn PaymentProcessor>,
    events: Arc<dyn EventSink>,
}

impl PaymentService {
    /// Creates a new payment service
    pub fn new(
        store: Arc<dyn BillingStore>,
        processor: Arc<dyn PaymentProcessor>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            store,
            processor,
            events,
        }
    }

    /// Creates a processor payment intent for an invoice
    ///
    /// Validations run in order, first failure wins: invoice exists, not
    /// already paid, amount (when given) positive / within the amount due /
    /// at least [`MINIMUM_CHARGE`]. An omitted amount defaults to the full
    /// amount due. On processor success a pending [`PaymentRecord`] is
    /// persisted to keep an audit trail of the attempt.
    pub async fn create_payment_intent(
        &self,
        invoice_id: InvoiceId,
        payer_email: Option<String>,
        payment_amount: Option<Decimal>,
    ) -> Result<PaymentIntentReceipt, BillingError> {
        let invoice = self
            .store
            .get_invoice(invoice_id)
            .await
            .map_err(|e| invoice_not_found(e, invoice_id))?;

        if invoice.is_paid() {
            return Err(BillingError::AlreadyPaid);
        }

        let amount = match payment_amount {
            Some(requested) => {
                tracing::info!(%invoice_id, %requested, "creating partial payment intent");
                if requested <= Decimal::ZERO {
                    return Err(BillingError::AmountNotPositive);
                }
                if requested > invoice.amount_due().amount() {
                    return Err(BillingError::AmountExceedsDue);
                }
                if requested < MINIMUM_CHARGE {
                    return Err(BillingError::AmountTooSmall {
                        minimum: MINIMUM_CHARGE,
                    });
                }
                Money::new(requested, invoice.currency)
            }
            None => {
                let due = invoice.amount_due();
                tracing::info!(%invoice_id, amount = %due, "creating full payment intent");
                due
            }
        };

        let mut request_metadata = HashMap::new();
        request_metadata.insert(
            metadata::INVOICE_ID.to_string(),
            invoice.id.as_uuid().to_string(),
        );
        request_metadata.insert(metadata::INVOICE_NUMBER.to_string(), invoice.number.clone());
        request_metadata.insert(
            metadata::PAYMENT_AMOUNT.to_string(),
            amount.amount().to_string(),
        );

        let intent = self
            .processor
            .create_payment_intent(CreateIntentRequest {
                amount: amount.to_minor_units()?,
                currency: invoice.currency.code().to_lowercase(),
                metadata: request_metadata,
                receipt_email: payer_email,
                payment_method_types: vec![PAYMENT_METHOD_CARD.to_string()],
                automatic_payment_methods: false,
            })
            .await?;

        let mut record = PaymentRecord::pending(
            intent.id.clone(),
            invoice.id,
            amount,
            timestamp_or_now(intent.created),
        )
        .with_status(
            PaymentStatus::from_processor(&intent.status)
                .unwrap_or(PaymentStatus::RequiresPaymentMethod),
        )
        .with_metadata(intent.metadata.clone());
        record.client_secret = intent.client_secret.clone();

        let record = self.store.insert_record(record).await?;

        self.events.emit(DomainEvent::PaymentIntentCreated {
            invoice_id: invoice.id,
            external_id: record.external_id.clone(),
            amount: amount.amount(),
        });
        tracing::info!(intent_id = %intent.id, invoice = %invoice.number, "created payment intent");

        Ok(PaymentIntentReceipt {
            intent_id: intent.id,
            client_secret: intent.client_secret,
            amount,
            record_id: record.id,
        })
    }

    /// Refunds a captured payment in full
    ///
    /// The record must be succeeded and not already reversed by an earlier
    /// refund entry. The processor call happens first; record creation and
    /// reconciliation then run in one atomic transaction.
    pub async fn process_refund(
        &self,
        record_id: PaymentRecordId,
    ) -> Result<PaymentRecord, BillingError> {
        let record = match self.store.get_record(record_id).await {
            Ok(record) => record,
            Err(e) if e.is_not_found() => return Err(BillingError::RefundInvalidPayment),
            Err(e) => return Err(e.into()),
        };

        if !record.is_successful() {
            return Err(BillingError::RefundInvalidPayment);
        }
        if self.store.has_refund_of(&record.external_id).await? {
            return Err(BillingError::AlreadyRefunded);
        }

        let invoice = self.store.get_invoice(record.invoice_id).await?;

        let mut refund_metadata = HashMap::new();
        refund_metadata.insert(
            metadata::PAYMENT_RECORD_ID.to_string(),
            record.id.as_uuid().to_string(),
        );
        refund_metadata.insert(
            metadata::INVOICE_ID.to_string(),
            invoice.id.as_uuid().to_string(),
        );
        refund_metadata.insert(metadata::INVOICE_NUMBER.to_string(), invoice.number.clone());

        let refund = self
            .processor
            .create_refund(CreateRefundRequest {
                payment_intent: record.external_id.clone(),
                amount: record.amount.to_minor_units()?,
                metadata: refund_metadata,
            })
            .await
            .map_err(|e| match e {
                ProcessorError::AlreadyRefunded => BillingError::AlreadyRefunded,
                other => BillingError::RefundProcessing(other.to_string()),
            })?;

        tracing::info!(refund_id = %refund.id, payment = %record.external_id, "created processor refund");

        let entry = PaymentRecord::refund_entry(&record, &refund.id, record.amount, Utc::now());
        let (entry, reconciled) = self.store.insert_refund_and_reconcile(entry).await?;

        self.emit_refund_events(&invoice, &reconciled, &entry);
        tracing::info!(payment = %record.external_id, "processed refund");

        Ok(entry)
    }

    /// Handles a `payment_intent.succeeded` webhook event
    ///
    /// Gets or creates the record by intent id, updates it from the event
    /// object, and reconciles the invoice when the resulting record status
    /// is succeeded. Returns `None` when the record did not end up
    /// successful (nothing was reconciled).
    pub async fn process_successful_intent(
        &self,
        intent: PaymentIntent,
    ) -> Result<Option<PaymentRecord>, BillingError> {
        let invoice_id = extract_invoice_id(&intent.metadata)?;
        let currency = core_kernel::Currency::from_code(&intent.currency).ok_or_else(|| {
            BillingError::InvalidRequest(format!("Unknown currency code: {}", intent.currency))
        })?;

        let defaults = PaymentRecord::pending(
            intent.id.clone(),
            invoice_id,
            Money::from_minor(intent.amount, currency),
            timestamp_or_now(intent.created),
        );

        let intent_id = intent.id.clone();
        let outcome = self.store.apply_intent_event(defaults, intent).await?;

        match outcome.invoice {
            Some(reconciled) => {
                self.events.emit(DomainEvent::PaymentRecorded {
                    invoice_id: reconciled.id,
                    external_id: outcome.record.external_id.clone(),
                    amount: outcome.record.amount.amount(),
                });
                self.events.emit(DomainEvent::InvoiceReconciled {
                    invoice_id: reconciled.id,
                    amount_paid: reconciled.amount_paid.amount(),
                    status: reconciled.status,
                });
                tracing::info!(
                    intent_id = %intent_id,
                    invoice = %reconciled.number,
                    "processed successful payment"
                );
                Ok(Some(outcome.record))
            }
            None => {
                tracing::warn!(intent_id = %intent_id, "payment is not successful, skipping");
                Ok(None)
            }
        }
    }

    /// Handles a `payment_intent.payment_failed` webhook event
    ///
    /// Updates the record's mutable fields when it exists; an unknown
    /// intent id is logged and ignored.
    pub async fn process_failed_intent(&self, intent: PaymentIntent) -> Result<(), BillingError> {
        match self.store.find_record_by_external_id(&intent.id).await? {
            Some(mut record) => {
                record.apply_intent_update(&intent);
                self.store.update_record(record).await?;
                tracing::info!(intent_id = %intent.id, "updated failed payment record");
            }
            None => {
                tracing::warn!(intent_id = %intent.id, "no payment record found for failed payment");
            }
        }
        Ok(())
    }

    /// Handles `refund.created` / `refund.updated` webhook events
    ///
    /// Creates a refund ledger entry and reconciles when the refund
    /// succeeded; anything else is logged and ignored. Returns the refund
    /// entry when one was created.
    pub async fn process_refund_event(
        &self,
        payment_intent_id: &str,
        refund: Refund,
    ) -> Result<Option<PaymentRecord>, BillingError> {
        let Some(original) = self
            .store
            .find_record_by_external_id(payment_intent_id)
            .await?
        else {
            tracing::error!(%payment_intent_id, "payment record not found for refund");
            return Ok(None);
        };

        let amount = Money::from_minor(refund.amount, original.amount.currency());
        tracing::info!(
            refund_id = %refund.id,
            %amount,
            status = ?refund.status,
            "processing refund webhook"
        );

        if refund.status.as_deref() != Some(REFUND_STATUS_SUCCEEDED) {
            tracing::info!(refund_id = %refund.id, "refund not succeeded, not creating refund record");
            return Ok(None);
        }

        let created = refund
            .created
            .map(timestamp_or_now)
            .unwrap_or_else(Utc::now);
        let entry = PaymentRecord::refund_entry(&original, &refund.id, amount, created);

        let invoice = self.store.get_invoice(original.invoice_id).await?;
        let (entry, reconciled) = self.store.insert_refund_and_reconcile(entry).await?;

        self.emit_refund_events(&invoice, &reconciled, &entry);
        tracing::info!(%payment_intent_id, "created refund record from webhook");

        Ok(Some(entry))
    }

    /// Recomputes an invoice's aggregate state from its records
    pub async fn reconcile(&self, invoice_id: InvoiceId) -> Result<Invoice, BillingError> {
        let before = self
            .store
            .get_invoice(invoice_id)
            .await
            .map_err(|e| invoice_not_found(e, invoice_id))?;
        let after = self.store.reconcile_invoice(invoice_id).await?;

        if before.status != after.status {
            self.events.emit(DomainEvent::InvoiceStatusChanged {
                invoice_id: after.id,
                old_status: before.status,
                new_status: after.status,
            });
        }
        self.events.emit(DomainEvent::InvoiceReconciled {
            invoice_id: after.id,
            amount_paid: after.amount_paid.amount(),
            status: after.status,
        });

        Ok(after)
    }

    fn emit_refund_events(&self, before: &Invoice, after: &Invoice, entry: &PaymentRecord) {
        self.events.emit(DomainEvent::RefundRecorded {
            invoice_id: after.id,
            record_id: entry.id,
            external_id: entry.external_id.clone(),
            amount: entry.amount.amount(),
        });
        if before.status != after.status {
            self.events.emit(DomainEvent::InvoiceStatusChanged {
                invoice_id: after.id,
                old_status: before.status,
                new_status: after.status,
            });
        }
        self.events.emit(DomainEvent::InvoiceReconciled {
            invoice_id: after.id,
            amount_paid: after.amount_paid.amount(),
            status: after.status,
        });
    }
}

/// Service for managing business owners and customers
pub struct PartyService {
    parties: Arc<dyn PartyStore>,
    events: Arc<dyn EventSink>,
}

impl PartyService {
    /// Creates a new party service
    pub fn new(parties: Arc<dyn PartyStore>, events: Arc<dyn EventSink>) -> Self {
        Self { parties, events }
    }

    pub async fn create_owner(&self, owner: BusinessOwner) -> Result<BusinessOwner, BillingError> {
        let owner = self.parties.create_owner(owner).await?;
        self.events
            .emit(DomainEvent::OwnerCreated { owner_id: owner.id });
        Ok(owner)
    }

    pub async fn get_owner(&self, id: OwnerId) -> Result<BusinessOwner, BillingError> {
        self.parties.get_owner(id).await.map_err(|e| match e {
            e if e.is_not_found() => BillingError::OwnerNotFound(id.to_string()),
            e => BillingError::Store(e),
        })
    }

    pub async fn list_owners(&self) -> Result<Vec<BusinessOwner>, BillingError> {
        Ok(self.parties.list_owners().await?)
    }

    pub async fn delete_owner(&self, id: OwnerId) -> Result<(), BillingError> {
        self.parties.delete_owner(id).await.map_err(|e| match e {
            e if e.is_not_found() => BillingError::OwnerNotFound(id.to_string()),
            e => BillingError::Store(e),
        })?;
        self.events.emit(DomainEvent::OwnerDeleted { owner_id: id });
        Ok(())
    }

    pub async fn create_customer(&self, customer: Customer) -> Result<Customer, BillingError> {
        let customer = self.parties.create_customer(customer).await?;
        self.events.emit(DomainEvent::CustomerCreated {
            customer_id: customer.id,
        });
        Ok(customer)
    }

    pub async fn get_customer(&self, id: CustomerId) -> Result<Customer, BillingError> {
        self.parties.get_customer(id).await.map_err(|e| match e {
            e if e.is_not_found() => BillingError::CustomerNotFound(id.to_string()),
            e => BillingError::Store(e),
        })
    }

    pub async fn list_customers(&self) -> Result<Vec<Customer>, BillingError> {
        Ok(self.parties.list_customers().await?)
    }

    pub async fn delete_customer(&self, id: CustomerId) -> Result<(), BillingError> {
        self.parties.delete_customer(id).await.map_err(|e| match e {
            e if e.is_not_found() => BillingError::CustomerNotFound(id.to_string()),
            e => BillingError::Store(e),
        })?;
        self.events
            .emit(DomainEvent::CustomerDeleted { customer_id: id });
        Ok(())
    }
}

fn invoice_not_found(error: core_kernel::PortError, id: InvoiceId) -> BillingError {
    if error.is_not_found() {
        BillingError::InvoiceNotFound(id.to_string())
    } else {
        BillingError::Store(error)
    }
}

fn extract_invoice_id(
    event_metadata: &HashMap<String, String>,
) -> Result<InvoiceId, BillingError> {
    event_metadata
        .get(metadata::INVOICE_ID)
        .and_then(|raw| raw.parse().ok())
        .ok_or(BillingError::MissingInvoiceReference)
}

fn timestamp_or_now(unix_seconds: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(unix_seconds, 0).unwrap_or_else(Utc::now)
}
