//! Billing repository
//!
//! PostgreSQL implementation of the `BillingStore` port. The three compound
//! operations (`reconcile_invoice`, `apply_intent_event`,
//! `insert_refund_and_reconcile`) each run inside one transaction with the
//! invoice row locked (`SELECT ... FOR UPDATE`), so concurrent webhook
//! deliveries for the same invoice serialize instead of clobbering each
//! other's aggregate writes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use std::collections::HashMap;
use uuid::Uuid;

use core_kernel::{Currency, DomainPort, InvoiceId, Money, PaymentRecordId, PortError};
use domain_billing::invoice::{invoice_number, Invoice};
use domain_billing::payment_record::PaymentRecord;
use domain_billing::ports::{
    BillingStore, IntentEventOutcome, InvoiceUpdate, NewInvoice, PaymentIntent,
};
use domain_billing::reconciliation::reconcile;

use crate::error::DatabaseError;

const SELECT_INVOICE: &str = "SELECT id, owner_id, customer_id, number, issued_at, due_date, \
     currency, status, payment_status, total_amount, amount_paid, updated_at FROM invoices";

const SELECT_RECORD: &str = "SELECT id, external_id, invoice_id, amount, currency, status, \
     payment_method_type, payment_method_id, client_secret, failure_code, failure_message, \
     metadata, processor_created_at, created_at, updated_at FROM payment_records";

/// Repository implementing [`BillingStore`] on PostgreSQL
#[derive(Debug, Clone)]
pub struct PostgresBillingStore {
    pool: PgPool,
}

#[derive(Debug, FromRow)]
struct InvoiceRow {
    id: Uuid,
    owner_id: Uuid,
    customer_id: Uuid,
    number: String,
    issued_at: DateTime<Utc>,
    due_date: DateTime<Utc>,
    currency: String,
    status: String,
    payment_status: String,
    total_amount: Decimal,
    amount_paid: Decimal,
    updated_at: DateTime<Utc>,
}

impl TryFrom<InvoiceRow> for Invoice {
    type Error = DatabaseError;

    fn try_from(row: InvoiceRow) -> Result<Self, Self::Error> {
        let currency = Currency::from_code(&row.currency).ok_or_else(|| {
            DatabaseError::SerializationError(format!("unknown currency '{}'", row.currency))
        })?;
        let status = row
            .status
            .parse()
            .map_err(|e: domain_billing::UnknownStatus| {
                DatabaseError::SerializationError(e.to_string())
            })?;
        let payment_status =
            row.payment_status
                .parse()
                .map_err(|e: domain_billing::UnknownStatus| {
                    DatabaseError::SerializationError(e.to_string())
                })?;

        Ok(Invoice {
            id: InvoiceId::from(row.id),
            owner_id: row.owner_id.into(),
            customer_id: row.customer_id.into(),
            number: row.number,
            issued_at: row.issued_at,
            due_date: row.due_date,
            currency,
            status,
            payment_status,
            total_amount: Money::new(row.total_amount, currency),
            amount_paid: Money::new(row.amount_paid, currency),
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct RecordRow {
    id: Uuid,
    external_id: String,
    invoice_id: Uuid,
    amount: Decimal,
    currency: String,
    status: String,
    payment_method_type: String,
    payment_method_id: Option<String>,
    client_secret: Option<String>,
    failure_code: Option<String>,
    failure_message: Option<String>,
    metadata: serde_json::Value,
    processor_created_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<RecordRow> for PaymentRecord {
    type Error = DatabaseError;

    fn try_from(row: RecordRow) -> Result<Self, Self::Error> {
        let currency = Currency::from_code(&row.currency).ok_or_else(|| {
            DatabaseError::SerializationError(format!("unknown currency '{}'", row.currency))
        })?;
        let status = row
            .status
            .parse()
            .map_err(|e: domain_billing::UnknownStatus| {
                DatabaseError::SerializationError(e.to_string())
            })?;
        let metadata: HashMap<String, String> = serde_json::from_value(row.metadata)
            .map_err(|e| DatabaseError::SerializationError(e.to_string()))?;

        Ok(PaymentRecord {
            id: PaymentRecordId::from(row.id),
            external_id: row.external_id,
            invoice_id: row.invoice_id.into(),
            amount: Money::new(row.amount, currency),
            status,
            payment_method_type: row.payment_method_type,
            payment_method_id: row.payment_method_id,
            client_secret: row.client_secret,
            failure_code: row.failure_code,
            failure_message: row.failure_message,
            metadata,
            processor_created_at: row.processor_created_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn metadata_json(record: &PaymentRecord) -> Result<serde_json::Value, DatabaseError> {
    serde_json::to_value(&record.metadata)
        .map_err(|e| DatabaseError::SerializationError(e.to_string()))
}

impl PostgresBillingStore {
    /// Creates a new repository on the given connection pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_invoice(&self, id: InvoiceId) -> Result<Invoice, DatabaseError> {
        let sql = format!("{} WHERE id = $1", SELECT_INVOICE);
        let row = sqlx::query_as::<_, InvoiceRow>(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DatabaseError::not_found("Invoice", id))?;
        row.try_into()
    }

    async fn insert_record_tx(
        tx: &mut Transaction<'_, Postgres>,
        record: &PaymentRecord,
    ) -> Result<(), DatabaseError> {
        sqlx::query(
            "INSERT INTO payment_records (id, external_id, invoice_id, amount, currency, \
             status, payment_method_type, payment_method_id, client_secret, failure_code, \
             failure_message, metadata, processor_created_at, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)",
        )
        .bind(record.id.as_uuid())
        .bind(&record.external_id)
        .bind(record.invoice_id.as_uuid())
        .bind(record.amount.amount())
        .bind(record.amount.currency().code())
        .bind(record.status.as_str())
        .bind(&record.payment_method_type)
        .bind(&record.payment_method_id)
        .bind(&record.client_secret)
        .bind(&record.failure_code)
        .bind(&record.failure_message)
        .bind(metadata_json(record)?)
        .bind(record.processor_created_at)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    async fn update_record_tx(
        tx: &mut Transaction<'_, Postgres>,
        record: &PaymentRecord,
    ) -> Result<(), DatabaseError> {
        let result = sqlx::query(
            "UPDATE payment_records SET status = $2, payment_method_id = $3, \
             client_secret = $4, failure_code = $5, failure_message = $6, metadata = $7, \
             updated_at = $8 WHERE id = $1",
        )
        .bind(record.id.as_uuid())
        .bind(record.status.as_str())
        .bind(&record.payment_method_id)
        .bind(&record.client_secret)
        .bind(&record.failure_code)
        .bind(&record.failure_message)
        .bind(metadata_json(record)?)
        .bind(record.updated_at)
        .execute(&mut **tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::not_found("PaymentRecord", record.id));
        }
        Ok(())
    }

    /// Recomputes the invoice aggregate inside the caller's transaction.
    ///
    /// Locks the invoice row for the remainder of the transaction before
    /// reading the records, so the read-recompute-write sequence is atomic
    /// with respect to concurrent reconciliations.
    async fn reconcile_tx(
        tx: &mut Transaction<'_, Postgres>,
        id: InvoiceId,
    ) -> Result<Invoice, DatabaseError> {
        let sql = format!("{} WHERE id = $1 FOR UPDATE", SELECT_INVOICE);
        let row = sqlx::query_as::<_, InvoiceRow>(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&mut **tx)
            .await?
            .ok_or_else(|| DatabaseError::not_found("Invoice", id))?;
        let mut invoice: Invoice = row.try_into()?;

        let sql = format!("{} WHERE invoice_id = $1", SELECT_RECORD);
        let record_rows = sqlx::query_as::<_, RecordRow>(&sql)
            .bind(id.as_uuid())
            .fetch_all(&mut **tx)
            .await?;
        let records: Vec<PaymentRecord> = record_rows
            .into_iter()
            .map(PaymentRecord::try_from)
            .collect::<Result<_, _>>()?;

        let outcome = reconcile(&invoice, &records);
        outcome.apply(&mut invoice);

        sqlx::query(
            "UPDATE invoices SET amount_paid = $2, status = $3, payment_status = $4, \
             updated_at = $5 WHERE id = $1",
        )
        .bind(id.as_uuid())
        .bind(invoice.amount_paid.amount())
        .bind(invoice.status.as_str())
        .bind(invoice.payment_status.as_str())
        .bind(invoice.updated_at)
        .execute(&mut **tx)
        .await?;

        tracing::debug!(
            invoice = %invoice.number,
            amount_paid = %invoice.amount_paid.amount(),
            total_payments = %outcome.total_payments.amount(),
            total_refunds = %outcome.total_refunds.amount(),
            "reconciled invoice"
        );

        Ok(invoice)
    }
}

impl DomainPort for PostgresBillingStore {}

#[async_trait]
impl BillingStore for PostgresBillingStore {
    async fn ping(&self) -> Result<(), PortError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(DatabaseError::from)?;
        Ok(())
    }

    async fn create_invoice(&self, new_invoice: NewInvoice) -> Result<Invoice, PortError> {
        let mut tx = self.pool.begin().await.map_err(DatabaseError::from)?;

        let mut invoice = Invoice::issue(
            new_invoice.owner_id,
            new_invoice.customer_id,
            String::new(),
            new_invoice.due_date,
            new_invoice.currency,
            new_invoice.total_amount,
        );

        // Monthly sequence is owner-agnostic. Two concurrent creations can
        // compute the same sequence; the uniqueness constraint on `number`
        // turns that race into a visible conflict for the caller to retry.
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM invoices \
             WHERE date_trunc('month', issued_at) = date_trunc('month', $1::timestamptz)",
        )
        .bind(invoice.issued_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(DatabaseError::from)?;
        invoice.number = invoice_number(invoice.issued_at, count as u32 + 1);

        sqlx::query(
            "INSERT INTO invoices (id, owner_id, customer_id, number, issued_at, due_date, \
             currency, status, payment_status, total_amount, amount_paid, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
        )
        .bind(invoice.id.as_uuid())
        .bind(invoice.owner_id.as_uuid())
        .bind(invoice.customer_id.as_uuid())
        .bind(&invoice.number)
        .bind(invoice.issued_at)
        .bind(invoice.due_date)
        .bind(invoice.currency.code())
        .bind(invoice.status.as_str())
        .bind(invoice.payment_status.as_str())
        .bind(invoice.total_amount.amount())
        .bind(invoice.amount_paid.amount())
        .bind(invoice.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(DatabaseError::from)?;

        tx.commit().await.map_err(DatabaseError::from)?;
        Ok(invoice)
    }

    async fn get_invoice(&self, id: InvoiceId) -> Result<Invoice, PortError> {
        Ok(self.fetch_invoice(id).await?)
    }

    async fn list_invoices(&self) -> Result<Vec<Invoice>, PortError> {
        let sql = format!("{} ORDER BY issued_at DESC", SELECT_INVOICE);
        let rows = sqlx::query_as::<_, InvoiceRow>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(DatabaseError::from)?;
        let invoices = rows
            .into_iter()
            .map(Invoice::try_from)
            .collect::<Result<_, _>>()?;
        Ok(invoices)
    }

    async fn update_invoice(
        &self,
        id: InvoiceId,
        update: InvoiceUpdate,
    ) -> Result<Invoice, PortError> {
        let mut tx = self.pool.begin().await.map_err(DatabaseError::from)?;

        let sql = format!("{} WHERE id = $1 FOR UPDATE", SELECT_INVOICE);
        let row = sqlx::query_as::<_, InvoiceRow>(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(DatabaseError::from)?
            .ok_or_else(|| DatabaseError::not_found("Invoice", id))?;
        let mut invoice: Invoice = row.try_into().map_err(PortError::from)?;

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

        sqlx::query(
            "UPDATE invoices SET due_date = $2, status = $3, total_amount = $4, \
             updated_at = $5 WHERE id = $1",
        )
        .bind(id.as_uuid())
        .bind(invoice.due_date)
        .bind(invoice.status.as_str())
        .bind(invoice.total_amount.amount())
        .bind(invoice.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(DatabaseError::from)?;

        tx.commit().await.map_err(DatabaseError::from)?;
        Ok(invoice)
    }

    async fn delete_invoice(&self, id: InvoiceId) -> Result<(), PortError> {
        let result = sqlx::query("DELETE FROM invoices WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(DatabaseError::from)?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::not_found("Invoice", id).into());
        }
        Ok(())
    }

    async fn get_record(&self, id: PaymentRecordId) -> Result<PaymentRecord, PortError> {
        let sql = format!("{} WHERE id = $1", SELECT_RECORD);
        let row = sqlx::query_as::<_, RecordRow>(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(DatabaseError::from)?
            .ok_or_else(|| DatabaseError::not_found("PaymentRecord", id))?;
        Ok(PaymentRecord::try_from(row)?)
    }

    async fn find_record_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<PaymentRecord>, PortError> {
        let sql = format!("{} WHERE external_id = $1", SELECT_RECORD);
        let row = sqlx::query_as::<_, RecordRow>(&sql)
            .bind(external_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(DatabaseError::from)?;
        Ok(row.map(PaymentRecord::try_from).transpose()?)
    }

    async fn list_records_for_invoice(
        &self,
        invoice_id: InvoiceId,
    ) -> Result<Vec<PaymentRecord>, PortError> {
        let sql = format!(
            "{} WHERE invoice_id = $1 ORDER BY created_at DESC",
            SELECT_RECORD
        );
        let rows = sqlx::query_as::<_, RecordRow>(&sql)
            .bind(invoice_id.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(DatabaseError::from)?;
        let records = rows
            .into_iter()
            .map(PaymentRecord::try_from)
            .collect::<Result<_, _>>()?;
        Ok(records)
    }

    async fn insert_record(&self, record: PaymentRecord) -> Result<PaymentRecord, PortError> {
        let mut tx = self.pool.begin().await.map_err(DatabaseError::from)?;
        Self::insert_record_tx(&mut tx, &record).await?;
        tx.commit().await.map_err(DatabaseError::from)?;
        Ok(record)
    }

    async fn update_record(&self, record: PaymentRecord) -> Result<PaymentRecord, PortError> {
        let mut tx = self.pool.begin().await.map_err(DatabaseError::from)?;
        Self::update_record_tx(&mut tx, &record).await?;
        tx.commit().await.map_err(DatabaseError::from)?;
        Ok(record)
    }

    async fn has_refund_of(&self, original_external_id: &str) -> Result<bool, PortError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM payment_records \
             WHERE status = 'refunded' AND metadata ->> 'original_payment_intent' = $1)",
        )
        .bind(original_external_id)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from)?;
        Ok(exists)
    }

    async fn reconcile_invoice(&self, id: InvoiceId) -> Result<Invoice, PortError> {
        let mut tx = self.pool.begin().await.map_err(DatabaseError::from)?;
        let invoice = Self::reconcile_tx(&mut tx, id).await?;
        tx.commit().await.map_err(DatabaseError::from)?;
        Ok(invoice)
    }

    async fn apply_intent_event(
        &self,
        defaults: PaymentRecord,
        intent: PaymentIntent,
    ) -> Result<IntentEventOutcome, PortError> {
        let mut tx = self.pool.begin().await.map_err(DatabaseError::from)?;

        let sql = format!("{} WHERE external_id = $1 FOR UPDATE", SELECT_RECORD);
        let existing = sqlx::query_as::<_, RecordRow>(&sql)
            .bind(&intent.id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(DatabaseError::from)?;

        let mut record = match existing {
            Some(row) => PaymentRecord::try_from(row)?,
            None => {
                Self::insert_record_tx(&mut tx, &defaults).await?;
                defaults
            }
        };

        record.apply_intent_update(&intent);
        Self::update_record_tx(&mut tx, &record).await?;

        let invoice = if record.is_successful() {
            Some(Self::reconcile_tx(&mut tx, record.invoice_id).await?)
        } else {
            None
        };

        tx.commit().await.map_err(DatabaseError::from)?;
        Ok(IntentEventOutcome { record, invoice })
    }

    async fn insert_refund_and_reconcile(
        &self,
        refund: PaymentRecord,
    ) -> Result<(PaymentRecord, Invoice), PortError> {
        let mut tx = self.pool.begin().await.map_err(DatabaseError::from)?;
        Self::insert_record_tx(&mut tx, &refund).await?;
        let invoice = Self::reconcile_tx(&mut tx, refund.invoice_id).await?;
        tx.commit().await.map_err(DatabaseError::from)?;
        Ok((refund, invoice))
    }
}
