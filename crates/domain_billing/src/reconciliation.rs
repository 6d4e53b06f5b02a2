//! Reconciliation engine
//!
//! Recomputes an invoice's aggregate paid/refunded state from the full set
//! of payment records belonging to it. The computation is a pure function
//! of the record set: re-running it against the same records always yields
//! the same result, regardless of the order in which the records were
//! persisted. This is what makes out-of-order webhook delivery safe.
//!
//! Persistence of the result is the store adapter's job and must happen in
//! the same transaction as the record read, with the invoice row locked
//! (see `BillingStore::reconcile_invoice`).

use rust_decimal::Decimal;

use core_kernel::Money;

use crate::invoice::{Invoice, InvoiceStatus};
use crate::payment_record::{PaymentRecord, PaymentStatus};

/// Result of recomputing an invoice's aggregate state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    /// Net collected amount: succeeded payments minus refunds. Not clamped;
    /// goes negative when refunds exceed captured payments.
    pub amount_paid: Money,
    /// Derived lifecycle status
    pub status: InvoiceStatus,
    /// Derived aggregate payment status
    pub payment_status: PaymentStatus,
    /// Sum of succeeded payment amounts
    pub total_payments: Money,
    /// Sum of refunded amounts
    pub total_refunds: Money,
}

impl Reconciliation {
    /// Applies the computed aggregate state to the invoice
    pub fn apply(&self, invoice: &mut Invoice) {
        invoice.amount_paid = self.amount_paid;
        invoice.status = self.status;
        invoice.payment_status = self.payment_status;
        invoice.updated_at = chrono::Utc::now();
    }
}

/// Recomputes the invoice aggregate from its payment records
///
/// Status derivation, first match wins:
/// 1. net <= 0 with refunds present: `refunded` / `refunded`
/// 2. fully covered: `paid` / `succeeded`
/// 3. partially covered: `partial`, payment status untouched
/// 4. otherwise both fields keep their current values
pub fn reconcile(invoice: &Invoice, records: &[PaymentRecord]) -> Reconciliation {
    let total_payments: Decimal = records
        .iter()
        .filter(|r| r.status == PaymentStatus::Succeeded && r.amount.is_positive())
        .map(|r| r.amount.amount())
        .sum();

    let total_refunds: Decimal = records
        .iter()
        .filter(|r| r.status == PaymentStatus::Refunded && r.amount.is_positive())
        .map(|r| r.amount.amount())
        .sum();

    let net = total_payments - total_refunds;
    let total = invoice.total_amount.amount();

    let (status, payment_status) = if net <= Decimal::ZERO && total_refunds > Decimal::ZERO {
        (InvoiceStatus::Refunded, PaymentStatus::Refunded)
    } else if net >= total {
        (InvoiceStatus::Paid, PaymentStatus::Succeeded)
    } else if net > Decimal::ZERO {
        (InvoiceStatus::Partial, invoice.payment_status)
    } else {
        (invoice.status, invoice.payment_status)
    };

    Reconciliation {
        amount_paid: Money::new(net, invoice.currency),
        status,
        payment_status,
        total_payments: Money::new(total_payments, invoice.currency),
        total_refunds: Money::new(total_refunds, invoice.currency),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use core_kernel::{Currency, CustomerId, InvoiceId, OwnerId};
    use rust_decimal_macros::dec;

    fn invoice(total: Decimal) -> Invoice {
        Invoice::issue(
            OwnerId::new(),
            CustomerId::new(),
            "INV-202501-0001".to_string(),
            Utc::now(),
            Currency::USD,
            Money::new(total, Currency::USD),
        )
    }

    fn record(invoice_id: InvoiceId, amount: Decimal, status: PaymentStatus) -> PaymentRecord {
        let mut r = PaymentRecord::pending(
            format!("pi_{}", uuid::Uuid::new_v4().simple()),
            invoice_id,
            Money::new(amount, Currency::USD),
            Utc::now(),
        );
        r.status = status;
        r
    }

    #[test]
    fn test_full_payment_marks_paid() {
        let inv = invoice(dec!(1000.00));
        let records = vec![record(inv.id, dec!(1000.00), PaymentStatus::Succeeded)];

        let result = reconcile(&inv, &records);

        assert_eq!(result.amount_paid.amount(), dec!(1000.00));
        assert_eq!(result.status, InvoiceStatus::Paid);
        assert_eq!(result.payment_status, PaymentStatus::Succeeded);
    }

    #[test]
    fn test_full_refund_marks_refunded() {
        let inv = invoice(dec!(1000.00));
        let records = vec![
            record(inv.id, dec!(1000.00), PaymentStatus::Succeeded),
            record(inv.id, dec!(1000.00), PaymentStatus::Refunded),
        ];

        let result = reconcile(&inv, &records);

        assert_eq!(result.amount_paid.amount(), dec!(0.00));
        assert_eq!(result.status, InvoiceStatus::Refunded);
        assert_eq!(result.payment_status, PaymentStatus::Refunded);
    }

    #[test]
    fn test_partial_payment_marks_partial() {
        let inv = invoice(dec!(1000.00));
        let records = vec![record(inv.id, dec!(500.00), PaymentStatus::Succeeded)];

        let result = reconcile(&inv, &records);

        assert_eq!(result.amount_paid.amount(), dec!(500.00));
        assert_eq!(result.status, InvoiceStatus::Partial);
        // payment_status keeps its current value on the partial branch
        assert_eq!(result.payment_status, inv.payment_status);
    }

    #[test]
    fn test_over_refund_goes_negative_unclamped() {
        let inv = invoice(dec!(1000.00));
        let records = vec![
            record(inv.id, dec!(500.00), PaymentStatus::Succeeded),
            record(inv.id, dec!(800.00), PaymentStatus::Refunded),
        ];

        let result = reconcile(&inv, &records);

        assert_eq!(result.amount_paid.amount(), dec!(-300.00));
        assert_eq!(result.status, InvoiceStatus::Refunded);
    }

    #[test]
    fn test_no_records_leaves_status_unchanged() {
        let inv = invoice(dec!(1000.00));

        let result = reconcile(&inv, &[]);

        assert_eq!(result.amount_paid.amount(), dec!(0));
        assert_eq!(result.status, inv.status);
        assert_eq!(result.payment_status, inv.payment_status);
    }

    #[test]
    fn test_pending_and_failed_records_are_excluded() {
        let inv = invoice(dec!(1000.00));
        let records = vec![
            record(inv.id, dec!(400.00), PaymentStatus::Succeeded),
            record(inv.id, dec!(999.00), PaymentStatus::Processing),
            record(inv.id, dec!(999.00), PaymentStatus::RequiresPaymentMethod),
            record(inv.id, dec!(999.00), PaymentStatus::Canceled),
        ];

        let result = reconcile(&inv, &records);

        assert_eq!(result.amount_paid.amount(), dec!(400.00));
        assert_eq!(result.status, InvoiceStatus::Partial);
    }

    #[test]
    fn test_overpayment_is_paid_with_negative_due() {
        let mut inv = invoice(dec!(1000.00));
        let records = vec![
            record(inv.id, dec!(700.00), PaymentStatus::Succeeded),
            record(inv.id, dec!(700.00), PaymentStatus::Succeeded),
        ];

        let result = reconcile(&inv, &records);
        result.apply(&mut inv);

        assert_eq!(inv.amount_paid.amount(), dec!(1400.00));
        assert_eq!(inv.status, InvoiceStatus::Paid);
        assert_eq!(inv.amount_due().amount(), dec!(-400.00));
    }

    #[test]
    fn test_reconcile_is_idempotent() {
        let mut inv = invoice(dec!(1000.00));
        let records = vec![
            record(inv.id, dec!(600.00), PaymentStatus::Succeeded),
            record(inv.id, dec!(100.00), PaymentStatus::Refunded),
        ];

        let first = reconcile(&inv, &records);
        first.apply(&mut inv);
        let second = reconcile(&inv, &records);

        assert_eq!(first, second);
    }

    #[test]
    fn test_amount_due_plus_paid_equals_total_after_apply() {
        let mut inv = invoice(dec!(1000.00));
        let records = vec![
            record(inv.id, dec!(250.00), PaymentStatus::Succeeded),
            record(inv.id, dec!(100.00), PaymentStatus::Refunded),
        ];

        reconcile(&inv, &records).apply(&mut inv);

        assert_eq!(
            inv.amount_due().amount() + inv.amount_paid.amount(),
            inv.total_amount.amount()
        );
    }
}
