//! In-memory implementations of the persistence ports
//!
//! These adapters mirror the transactional semantics of the PostgreSQL
//! implementations closely enough for service-level tests: one mutex
//! guards all state, so every compound operation is atomic and
//! reconciliations are serialized per store, matching the row-locking
//! discipline of the production adapter.

use async_trait::async_trait;
use chrono::{Datelike, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

use core_kernel::{CustomerId, DomainPort, InvoiceId, OwnerId, PaymentRecordId, PortError};
use domain_billing::invoice::{invoice_number, Invoice};
use domain_billing::party::{BusinessOwner, Customer};
use domain_billing::payment_record::PaymentRecord;
use domain_billing::ports::{
    BillingStore, IntentEventOutcome, InvoiceUpdate, NewInvoice, PartyStore, PaymentIntent,
};
use domain_billing::reconciliation::reconcile;

#[derive(Default)]
struct BillingState {
    invoices: HashMap<InvoiceId, Invoice>,
    records: HashMap<PaymentRecordId, PaymentRecord>,
}

impl BillingState {
    fn invoice(&self, id: InvoiceId) -> Result<&Invoice, PortError> {
        self.invoices
            .get(&id)
            .ok_or_else(|| PortError::not_found("Invoice", id))
    }

    fn records_for(&self, invoice_id: InvoiceId) -> Vec<PaymentRecord> {
        let mut records: Vec<_> = self
            .records
            .values()
            .filter(|r| r.invoice_id == invoice_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        records
    }

    fn insert_record_checked(&mut self, record: PaymentRecord) -> Result<PaymentRecord, PortError> {
        if self
            .records
            .values()
            .any(|r| r.external_id == record.external_id)
        {
            return Err(PortError::conflict(format!(
                "payment record with external id '{}' already exists",
                record.external_id
            )));
        }
        if !self.invoices.contains_key(&record.invoice_id) {
            return Err(PortError::validation(format!(
                "invoice {} does not exist",
                record.invoice_id
            )));
        }
        self.records.insert(record.id, record.clone());
        Ok(record)
    }

    fn reconcile_locked(&mut self, id: InvoiceId) -> Result<Invoice, PortError> {
        let invoice = self.invoice(id)?.clone();
        let records = self.records_for(id);
        let outcome = reconcile(&invoice, &records);

        let mut updated = invoice;
        outcome.apply(&mut updated);
        self.invoices.insert(id, updated.clone());
        Ok(updated)
    }
}

/// In-memory [`BillingStore`] adapter
#[derive(Default)]
pub struct InMemoryBillingStore {
    state: Mutex<BillingState>,
}

impl InMemoryBillingStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds an invoice directly, bypassing number assignment
    pub fn seed_invoice(&self, invoice: Invoice) {
        self.state
            .lock()
            .unwrap()
            .invoices
            .insert(invoice.id, invoice);
    }

    /// Seeds a payment record directly
    pub fn seed_record(&self, record: PaymentRecord) {
        self.state.lock().unwrap().records.insert(record.id, record);
    }

    /// Number of stored payment records
    pub fn record_count(&self) -> usize {
        self.state.lock().unwrap().records.len()
    }
}

impl DomainPort for InMemoryBillingStore {}

#[async_trait]
impl BillingStore for InMemoryBillingStore {
    async fn ping(&self) -> Result<(), PortError> {
        Ok(())
    }

    async fn create_invoice(&self, new_invoice: NewInvoice) -> Result<Invoice, PortError> {
        let mut state = self.state.lock().unwrap();
        let now = Utc::now();

        let sequence = state
            .invoices
            .values()
            .filter(|i| {
                i.issued_at.year() == now.year() && i.issued_at.month() == now.month()
            })
            .count() as u32
            + 1;
        let number = invoice_number(now, sequence);

        if state.invoices.values().any(|i| i.number == number) {
            return Err(PortError::conflict(format!(
                "invoice number '{}' already exists",
                number
            )));
        }

        let invoice = Invoice::issue(
            new_invoice.owner_id,
            new_invoice.customer_id,
            number,
            new_invoice.due_date,
            new_invoice.currency,
            new_invoice.total_amount,
        );
        state.invoices.insert(invoice.id, invoice.clone());
        Ok(invoice)
    }

    async fn get_invoice(&self, id: InvoiceId) -> Result<Invoice, PortError> {
        Ok(self.state.lock().unwrap().invoice(id)?.clone())
    }

    async fn list_invoices(&self) -> Result<Vec<Invoice>, PortError> {
        let state = self.state.lock().unwrap();
        let mut invoices: Vec<_> = state.invoices.values().cloned().collect();
        invoices.sort_by(|a, b| b.issued_at.cmp(&a.issued_at));
        Ok(invoices)
    }

    async fn update_invoice(
        &self,
        id: InvoiceId,
        update: InvoiceUpdate,
    ) -> Result<Invoice, PortError> {
        let mut state = self.state.lock().unwrap();
        let invoice = state
            .invoices
            .get_mut(&id)
            .ok_or_else(|| PortError::not_found("Invoice", id))?;

        if let Some(due_date) = update.due_date {
            invoice.due_date = due_date;
        }
        if let Some(status) = update.status {
            invoice.status = status;
        }
        if let Some(total) = update.total_amount {
            invoice.total_amount = total;
        }
        invoice.updated_at = Utc::now();
        Ok(invoice.clone())
    }

    async fn delete_invoice(&self, id: InvoiceId) -> Result<(), PortError> {
        let mut state = self.state.lock().unwrap();
        if state.invoices.remove(&id).is_none() {
            return Err(PortError::not_found("Invoice", id));
        }
        state.records.retain(|_, r| r.invoice_id != id);
        Ok(())
    }

    async fn get_record(&self, id: PaymentRecordId) -> Result<PaymentRecord, PortError> {
        self.state
            .lock()
            .unwrap()
            .records
            .get(&id)
            .cloned()
            .ok_or_else(|| PortError::not_found("PaymentRecord", id))
    }

    async fn find_record_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<PaymentRecord>, PortError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .records
            .values()
            .find(|r| r.external_id == external_id)
            .cloned())
    }

    async fn list_records_for_invoice(
        &self,
        invoice_id: InvoiceId,
    ) -> Result<Vec<PaymentRecord>, PortError> {
        Ok(self.state.lock().unwrap().records_for(invoice_id))
    }

    async fn insert_record(&self, record: PaymentRecord) -> Result<PaymentRecord, PortError> {
        self.state.lock().unwrap().insert_record_checked(record)
    }

    async fn update_record(&self, record: PaymentRecord) -> Result<PaymentRecord, PortError> {
        let mut state = self.state.lock().unwrap();
        if !state.records.contains_key(&record.id) {
            return Err(PortError::not_found("PaymentRecord", record.id));
        }
        state.records.insert(record.id, record.clone());
        Ok(record)
    }

    async fn has_refund_of(&self, original_external_id: &str) -> Result<bool, PortError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .records
            .values()
            .any(|r| r.is_refund() && r.refunded_external_id() == Some(original_external_id)))
    }

    async fn reconcile_invoice(&self, id: InvoiceId) -> Result<Invoice, PortError> {
        self.state.lock().unwrap().reconcile_locked(id)
    }

    async fn apply_intent_event(
        &self,
        defaults: PaymentRecord,
        intent: PaymentIntent,
    ) -> Result<IntentEventOutcome, PortError> {
        let mut state = self.state.lock().unwrap();

        let existing = state
            .records
            .values()
            .find(|r| r.external_id == intent.id)
            .cloned();
        let mut record = match existing {
            Some(record) => record,
            None => state.insert_record_checked(defaults)?,
        };

        record.apply_intent_update(&intent);
        state.records.insert(record.id, record.clone());

        let invoice = if record.is_successful() {
            Some(state.reconcile_locked(record.invoice_id)?)
        } else {
            None
        };

        Ok(IntentEventOutcome { record, invoice })
    }

    async fn insert_refund_and_reconcile(
        &self,
        refund: PaymentRecord,
    ) -> Result<(PaymentRecord, Invoice), PortError> {
        let mut state = self.state.lock().unwrap();
        let refund = state.insert_record_checked(refund)?;
        let invoice = state.reconcile_locked(refund.invoice_id)?;
        Ok((refund, invoice))
    }
}

#[derive(Default)]
struct PartyState {
    owners: HashMap<OwnerId, BusinessOwner>,
    customers: HashMap<CustomerId, Customer>,
}

/// In-memory [`PartyStore`] adapter
#[derive(Default)]
pub struct InMemoryPartyStore {
    state: Mutex<PartyState>,
}

impl InMemoryPartyStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

impl DomainPort for InMemoryPartyStore {}

#[async_trait]
impl PartyStore for InMemoryPartyStore {
    async fn create_owner(&self, owner: BusinessOwner) -> Result<BusinessOwner, PortError> {
        self.state
            .lock()
            .unwrap()
            .owners
            .insert(owner.id, owner.clone());
        Ok(owner)
    }

    async fn get_owner(&self, id: OwnerId) -> Result<BusinessOwner, PortError> {
        self.state
            .lock()
            .unwrap()
            .owners
            .get(&id)
            .cloned()
            .ok_or_else(|| PortError::not_found("BusinessOwner", id))
    }

    async fn list_owners(&self) -> Result<Vec<BusinessOwner>, PortError> {
        Ok(self.state.lock().unwrap().owners.values().cloned().collect())
    }

    async fn delete_owner(&self, id: OwnerId) -> Result<(), PortError> {
        self.state
            .lock()
            .unwrap()
            .owners
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| PortError::not_found("BusinessOwner", id))
    }

    async fn create_customer(&self, customer: Customer) -> Result<Customer, PortError> {
        self.state
            .lock()
            .unwrap()
            .customers
            .insert(customer.id, customer.clone());
        Ok(customer)
    }

    async fn get_customer(&self, id: CustomerId) -> Result<Customer, PortError> {
        self.state
            .lock()
            .unwrap()
            .customers
            .get(&id)
            .cloned()
            .ok_or_else(|| PortError::not_found("Customer", id))
    }

    async fn list_customers(&self) -> Result<Vec<Customer>, PortError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .customers
            .values()
            .cloned()
            .collect())
    }

    async fn delete_customer(&self, id: CustomerId) -> Result<(), PortError> {
        self.state
            .lock()
            .unwrap()
            .customers
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| PortError::not_found("Customer", id))
    }
}
