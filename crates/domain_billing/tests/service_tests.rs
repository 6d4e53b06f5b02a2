//! Service-level tests for payment orchestration and reconciliation
//!
//! Run against the in-memory store and fake processor from test_utils,
//! which mirror the transactional semantics of the production adapters.

use std::collections::HashMap;
use std::sync::Arc;

use rust_decimal_macros::dec;

use core_kernel::{Currency, InvoiceId, Money, PaymentRecordId};
use domain_billing::error::BillingError;
use domain_billing::events::DomainEvent;
use domain_billing::invoice::{Invoice, InvoiceStatus};
use domain_billing::payment_record::{metadata, PaymentStatus};
use domain_billing::ports::{BillingStore, NewInvoice, PaymentIntent, ProcessorError, Refund};
use domain_billing::services::{InvoiceService, PaymentService};

use test_utils::{
    FakeProcessor, InMemoryBillingStore, InMemoryPartyStore, MoneyFixtures, RecordingEventSink,
    TemporalFixtures, TestInvoiceBuilder, TestPaymentRecordBuilder,
};

struct Harness {
    store: Arc<InMemoryBillingStore>,
    processor: Arc<FakeProcessor>,
    events: Arc<RecordingEventSink>,
    payments: PaymentService,
}

fn harness() -> Harness {
    let store = Arc::new(InMemoryBillingStore::new());
    let processor = Arc::new(FakeProcessor::new());
    let events = Arc::new(RecordingEventSink::new());
    let payments = PaymentService::new(store.clone(), processor.clone(), events.clone());

    Harness {
        store,
        processor,
        events,
        payments,
    }
}

fn seed_invoice(harness: &Harness, total: Money) -> Invoice {
    let invoice = TestInvoiceBuilder::new().with_total(total).build();
    harness.store.seed_invoice(invoice.clone());
    invoice
}

fn succeeded_intent(id: &str, invoice_id: InvoiceId, amount_minor: i64) -> PaymentIntent {
    let mut event_metadata = HashMap::new();
    event_metadata.insert(
        metadata::INVOICE_ID.to_string(),
        invoice_id.as_uuid().to_string(),
    );

    PaymentIntent {
        id: id.to_string(),
        amount: amount_minor,
        currency: "usd".to_string(),
        status: "succeeded".to_string(),
        client_secret: Some(format!("{}_secret", id)),
        payment_method: Some("pm_789".to_string()),
        created: TemporalFixtures::processor_created(),
        metadata: event_metadata,
        last_payment_error: None,
    }
}

// ============================================================================
// Payment intent creation
// ============================================================================

mod create_payment_intent {
    use super::*;

    #[tokio::test]
    async fn full_amount_intent_creates_pending_record() {
        let h = harness();
        let invoice = seed_invoice(&h, MoneyFixtures::usd_invoice_total());

        let receipt = h
            .payments
            .create_payment_intent(invoice.id, Some("payer@example.com".to_string()), None)
            .await
            .unwrap();

        assert_eq!(receipt.amount.amount(), dec!(1000.00));
        assert!(receipt.client_secret.is_some());

        let sent = h.processor.last_intent().unwrap();
        assert_eq!(sent.amount, 100_000);
        assert_eq!(sent.currency, "usd");
        assert_eq!(sent.payment_method_types, vec!["card".to_string()]);
        assert!(!sent.automatic_payment_methods);
        assert_eq!(
            sent.metadata.get(metadata::INVOICE_NUMBER),
            Some(&invoice.number)
        );

        let record = h.store.get_record(receipt.record_id).await.unwrap();
        assert_eq!(record.status, PaymentStatus::RequiresPaymentMethod);
        assert_eq!(record.amount.amount(), dec!(1000.00));
        assert_eq!(record.invoice_id, invoice.id);

        // A pending intent never touches the invoice aggregate
        let unchanged = h.store.get_invoice(invoice.id).await.unwrap();
        assert_eq!(unchanged.amount_paid.amount(), dec!(0));
    }

    #[tokio::test]
    async fn partial_amount_defaults_to_remaining_due() {
        let h = harness();
        let invoice = TestInvoiceBuilder::new()
            .with_total(MoneyFixtures::usd_invoice_total())
            .with_paid(MoneyFixtures::usd(dec!(400.00)))
            .build();
        h.store.seed_invoice(invoice.clone());

        let receipt = h
            .payments
            .create_payment_intent(invoice.id, None, None)
            .await
            .unwrap();

        assert_eq!(receipt.amount.amount(), dec!(600.00));
        assert_eq!(h.processor.last_intent().unwrap().amount, 60_000);
    }

    #[tokio::test]
    async fn amount_below_minimum_is_rejected() {
        let h = harness();
        let invoice = seed_invoice(&h, MoneyFixtures::usd_invoice_total());

        let result = h
            .payments
            .create_payment_intent(invoice.id, None, Some(dec!(0.50)))
            .await;

        assert!(matches!(
            result,
            Err(BillingError::AmountTooSmall { minimum }) if minimum == dec!(1.00)
        ));
        assert_eq!(h.processor.intent_count(), 0);
        assert_eq!(h.store.record_count(), 0);
    }

    #[tokio::test]
    async fn amount_exceeding_due_is_rejected() {
        let h = harness();
        let invoice = seed_invoice(&h, MoneyFixtures::usd_invoice_total());

        let result = h
            .payments
            .create_payment_intent(invoice.id, None, Some(dec!(1000.01)))
            .await;

        assert!(matches!(result, Err(BillingError::AmountExceedsDue)));
        assert_eq!(h.store.record_count(), 0);
    }

    #[tokio::test]
    async fn non_positive_amount_is_rejected() {
        let h = harness();
        let invoice = seed_invoice(&h, MoneyFixtures::usd_invoice_total());

        let result = h
            .payments
            .create_payment_intent(invoice.id, None, Some(dec!(-5.00)))
            .await;

        assert!(matches!(result, Err(BillingError::AmountNotPositive)));
    }

    #[tokio::test]
    async fn paid_invoice_is_rejected() {
        let h = harness();
        let invoice = TestInvoiceBuilder::new()
            .with_total(MoneyFixtures::usd_invoice_total())
            .with_paid(MoneyFixtures::usd_invoice_total())
            .build();
        h.store.seed_invoice(invoice.clone());

        let result = h.payments.create_payment_intent(invoice.id, None, None).await;

        assert!(matches!(result, Err(BillingError::AlreadyPaid)));
    }

    #[tokio::test]
    async fn unknown_invoice_is_rejected() {
        let h = harness();

        let result = h
            .payments
            .create_payment_intent(InvoiceId::new(), None, None)
            .await;

        assert!(matches!(result, Err(BillingError::InvoiceNotFound(_))));
    }

    #[tokio::test]
    async fn processor_failure_leaves_no_record() {
        let h = harness();
        let invoice = seed_invoice(&h, MoneyFixtures::usd_invoice_total());
        h.processor.fail_next_intent(ProcessorError::Api {
            code: "rate_limited".to_string(),
            message: "Too many requests".to_string(),
        });

        let result = h.payments.create_payment_intent(invoice.id, None, None).await;

        assert!(matches!(result, Err(BillingError::Processor(_))));
        assert_eq!(h.store.record_count(), 0);
    }
}

// ============================================================================
// Webhook-driven payment processing
// ============================================================================

mod successful_intent {
    use super::*;

    #[tokio::test]
    async fn lazily_creates_record_and_reconciles() {
        let h = harness();
        let invoice = seed_invoice(&h, MoneyFixtures::usd_invoice_total());

        let record = h
            .payments
            .process_successful_intent(succeeded_intent("pi_hook", invoice.id, 100_000))
            .await
            .unwrap()
            .expect("record should be processed");

        assert!(record.is_successful());
        assert_eq!(record.amount.amount(), dec!(1000.00));

        let reconciled = h.store.get_invoice(invoice.id).await.unwrap();
        assert_eq!(reconciled.amount_paid.amount(), dec!(1000.00));
        assert_eq!(reconciled.status, InvoiceStatus::Paid);
        assert_eq!(reconciled.payment_status, PaymentStatus::Succeeded);
    }

    #[tokio::test]
    async fn partial_payment_marks_invoice_partial() {
        let h = harness();
        let invoice = seed_invoice(&h, MoneyFixtures::usd_invoice_total());

        h.payments
            .process_successful_intent(succeeded_intent("pi_half", invoice.id, 50_000))
            .await
            .unwrap();

        let reconciled = h.store.get_invoice(invoice.id).await.unwrap();
        assert_eq!(reconciled.amount_paid.amount(), dec!(500.00));
        assert_eq!(reconciled.status, InvoiceStatus::Partial);
    }

    #[tokio::test]
    async fn updates_existing_pending_record() {
        let h = harness();
        let invoice = seed_invoice(&h, MoneyFixtures::usd_invoice_total());

        h.payments
            .create_payment_intent(invoice.id, None, None)
            .await
            .unwrap();
        assert_eq!(h.store.record_count(), 1);

        let external_id = "pi_fake_0001";
        h.payments
            .process_successful_intent(succeeded_intent(external_id, invoice.id, 100_000))
            .await
            .unwrap();

        // Still one record; the pending one was updated in place
        assert_eq!(h.store.record_count(), 1);
        let record = h
            .store
            .find_record_by_external_id(external_id)
            .await
            .unwrap()
            .unwrap();
        assert!(record.is_successful());
    }

    #[tokio::test]
    async fn redelivery_is_idempotent() {
        let h = harness();
        let invoice = seed_invoice(&h, MoneyFixtures::usd_invoice_total());

        let event = succeeded_intent("pi_dup", invoice.id, 100_000);
        h.payments
            .process_successful_intent(event.clone())
            .await
            .unwrap();
        h.payments.process_successful_intent(event).await.unwrap();

        assert_eq!(h.store.record_count(), 1);
        let reconciled = h.store.get_invoice(invoice.id).await.unwrap();
        assert_eq!(reconciled.amount_paid.amount(), dec!(1000.00));
        assert_eq!(reconciled.status, InvoiceStatus::Paid);
    }

    #[tokio::test]
    async fn non_successful_status_skips_reconciliation() {
        let h = harness();
        let invoice = seed_invoice(&h, MoneyFixtures::usd_invoice_total());

        let mut intent = succeeded_intent("pi_processing", invoice.id, 100_000);
        intent.status = "processing".to_string();

        let outcome = h.payments.process_successful_intent(intent).await.unwrap();

        assert!(outcome.is_none());
        let unchanged = h.store.get_invoice(invoice.id).await.unwrap();
        assert_eq!(unchanged.amount_paid.amount(), dec!(0));
        assert_eq!(unchanged.status, InvoiceStatus::Sent);
    }

    #[tokio::test]
    async fn missing_invoice_metadata_is_a_hard_failure() {
        let h = harness();

        let mut intent = succeeded_intent("pi_orphan", InvoiceId::new(), 100_000);
        intent.metadata.clear();

        let result = h.payments.process_successful_intent(intent).await;
        assert!(matches!(result, Err(BillingError::MissingInvoiceReference)));
    }

    #[tokio::test]
    async fn emits_reconciliation_events() {
        let h = harness();
        let invoice = seed_invoice(&h, MoneyFixtures::usd_invoice_total());

        h.payments
            .process_successful_intent(succeeded_intent("pi_evt", invoice.id, 100_000))
            .await
            .unwrap();

        assert!(h
            .events
            .any(|e| matches!(e, DomainEvent::PaymentRecorded { .. })));
        assert!(h.events.any(|e| matches!(
            e,
            DomainEvent::InvoiceReconciled { status: InvoiceStatus::Paid, .. }
        )));
    }
}

mod failed_intent {
    use super::*;
    use domain_billing::ports::PaymentIntentError;

    #[tokio::test]
    async fn updates_failure_details_on_existing_record() {
        let h = harness();
        let invoice = seed_invoice(&h, MoneyFixtures::usd_invoice_total());
        let record = TestPaymentRecordBuilder::new()
            .with_external_id("pi_fail")
            .for_invoice(invoice.id)
            .build();
        h.store.seed_record(record);

        let mut intent = succeeded_intent("pi_fail", invoice.id, 100_000);
        intent.status = "requires_payment_method".to_string();
        intent.last_payment_error = Some(PaymentIntentError {
            code: Some("card_declined".to_string()),
            message: Some("Your card was declined.".to_string()),
        });

        h.payments.process_failed_intent(intent).await.unwrap();

        let updated = h
            .store
            .find_record_by_external_id("pi_fail")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.failure_code.as_deref(), Some("card_declined"));
        assert_eq!(updated.status, PaymentStatus::RequiresPaymentMethod);
    }

    #[tokio::test]
    async fn unknown_intent_is_a_no_op() {
        let h = harness();

        let intent = succeeded_intent("pi_ghost", InvoiceId::new(), 100_000);
        let result = h.payments.process_failed_intent(intent).await;

        assert!(result.is_ok());
        assert_eq!(h.store.record_count(), 0);
    }
}

// ============================================================================
// Refunds
// ============================================================================

mod refunds {
    use super::*;

    async fn paid_invoice_with_record(h: &Harness) -> (Invoice, PaymentRecordId) {
        let invoice = seed_invoice(h, MoneyFixtures::usd_invoice_total());
        let record = TestPaymentRecordBuilder::new()
            .with_external_id("pi_paid")
            .for_invoice(invoice.id)
            .with_amount(MoneyFixtures::usd_invoice_total())
            .succeeded()
            .build();
        let record_id = record.id;
        h.store.seed_record(record);
        h.payments.reconcile(invoice.id).await.unwrap();
        (invoice, record_id)
    }

    #[tokio::test]
    async fn full_refund_reverses_paid_invoice() {
        let h = harness();
        let (invoice, record_id) = paid_invoice_with_record(&h).await;

        let entry = h.payments.process_refund(record_id).await.unwrap();

        assert!(entry.external_id.starts_with("pi_paid_refund_"));
        assert_eq!(entry.status, PaymentStatus::Refunded);
        assert_eq!(entry.amount.amount(), dec!(1000.00));
        assert_eq!(entry.refunded_external_id(), Some("pi_paid"));

        let reconciled = h.store.get_invoice(invoice.id).await.unwrap();
        assert_eq!(reconciled.amount_paid.amount(), dec!(0.00));
        assert_eq!(reconciled.status, InvoiceStatus::Refunded);
        assert_eq!(reconciled.payment_status, PaymentStatus::Refunded);

        let sent = h.processor.last_refund().unwrap();
        assert_eq!(sent.payment_intent, "pi_paid");
        assert_eq!(sent.amount, 100_000);
    }

    #[tokio::test]
    async fn second_refund_is_rejected() {
        let h = harness();
        let (_, record_id) = paid_invoice_with_record(&h).await;

        h.payments.process_refund(record_id).await.unwrap();
        let result = h.payments.process_refund(record_id).await;

        assert!(matches!(result, Err(BillingError::AlreadyRefunded)));
        assert_eq!(h.processor.refund_count(), 1);
    }

    #[tokio::test]
    async fn pending_payment_cannot_be_refunded() {
        let h = harness();
        let invoice = seed_invoice(&h, MoneyFixtures::usd_invoice_total());
        let record = TestPaymentRecordBuilder::new()
            .for_invoice(invoice.id)
            .build();
        let record_id = record.id;
        h.store.seed_record(record);

        let result = h.payments.process_refund(record_id).await;

        assert!(matches!(result, Err(BillingError::RefundInvalidPayment)));
        assert_eq!(h.processor.refund_count(), 0);
    }

    #[tokio::test]
    async fn missing_record_maps_to_invalid_payment() {
        let h = harness();

        let result = h.payments.process_refund(PaymentRecordId::new()).await;

        assert!(matches!(result, Err(BillingError::RefundInvalidPayment)));
    }

    #[tokio::test]
    async fn processor_already_refunded_maps_to_conflict() {
        let h = harness();
        let (_, record_id) = paid_invoice_with_record(&h).await;
        h.processor.fail_next_refund(ProcessorError::AlreadyRefunded);

        let result = h.payments.process_refund(record_id).await;

        assert!(matches!(result, Err(BillingError::AlreadyRefunded)));
        assert_eq!(h.store.record_count(), 1);
    }

    #[tokio::test]
    async fn other_processor_errors_wrap_as_refund_processing() {
        let h = harness();
        let (_, record_id) = paid_invoice_with_record(&h).await;
        h.processor.fail_next_refund(ProcessorError::Api {
            code: "insufficient_funds".to_string(),
            message: "Account balance too low".to_string(),
        });

        let result = h.payments.process_refund(record_id).await;

        match result {
            Err(BillingError::RefundProcessing(message)) => {
                assert!(message.contains("insufficient_funds"));
            }
            other => panic!("expected RefundProcessing, got {:?}", other.err()),
        }
    }

    #[tokio::test]
    async fn partial_refund_via_webhook_leaves_partial_invoice() {
        let h = harness();
        let (invoice, _) = paid_invoice_with_record(&h).await;

        let refund = Refund {
            id: "re_partial".to_string(),
            amount: 40_000,
            currency: Some("usd".to_string()),
            status: Some("succeeded".to_string()),
            payment_intent: Some("pi_paid".to_string()),
            created: Some(TemporalFixtures::processor_created()),
            metadata: HashMap::new(),
        };

        let entry = h
            .payments
            .process_refund_event("pi_paid", refund)
            .await
            .unwrap()
            .expect("refund entry should be created");

        assert_eq!(entry.amount.amount(), dec!(400.00));

        let reconciled = h.store.get_invoice(invoice.id).await.unwrap();
        assert_eq!(reconciled.amount_paid.amount(), dec!(600.00));
        assert_eq!(reconciled.status, InvoiceStatus::Partial);
    }

    #[tokio::test]
    async fn refund_event_for_unknown_intent_is_a_no_op() {
        let h = harness();

        let refund = Refund {
            id: "re_ghost".to_string(),
            amount: 1000,
            currency: None,
            status: Some("succeeded".to_string()),
            payment_intent: Some("pi_ghost".to_string()),
            created: None,
            metadata: HashMap::new(),
        };

        let outcome = h
            .payments
            .process_refund_event("pi_ghost", refund)
            .await
            .unwrap();

        assert!(outcome.is_none());
        assert_eq!(h.store.record_count(), 0);
    }

    #[tokio::test]
    async fn non_succeeded_refund_event_creates_nothing() {
        let h = harness();
        let (invoice, _) = paid_invoice_with_record(&h).await;

        let refund = Refund {
            id: "re_pending".to_string(),
            amount: 100_000,
            currency: None,
            status: Some("pending".to_string()),
            payment_intent: Some("pi_paid".to_string()),
            created: None,
            metadata: HashMap::new(),
        };

        let outcome = h
            .payments
            .process_refund_event("pi_paid", refund)
            .await
            .unwrap();

        assert!(outcome.is_none());
        let unchanged = h.store.get_invoice(invoice.id).await.unwrap();
        assert_eq!(unchanged.status, InvoiceStatus::Paid);
    }
}

// ============================================================================
// Invoice service
// ============================================================================

mod invoices {
    use super::*;
    use domain_billing::party::{BusinessOwner, Customer};
    use domain_billing::ports::PartyStore;

    async fn invoice_service() -> (InvoiceService, NewInvoice) {
        let store = Arc::new(InMemoryBillingStore::new());
        let parties = Arc::new(InMemoryPartyStore::new());
        let events = Arc::new(RecordingEventSink::new());

        let owner = parties
            .create_owner(BusinessOwner::new("Acme Corp"))
            .await
            .unwrap();
        let customer = parties
            .create_customer(Customer::new("Jo Client", "jo@example.com"))
            .await
            .unwrap();

        let new_invoice = NewInvoice {
            owner_id: owner.id,
            customer_id: customer.id,
            due_date: TemporalFixtures::due_date(),
            currency: Currency::USD,
            total_amount: MoneyFixtures::usd_invoice_total(),
        };

        (InvoiceService::new(store, parties, events), new_invoice)
    }

    #[tokio::test]
    async fn creation_assigns_sequential_monthly_numbers() {
        let (service, new_invoice) = invoice_service().await;

        let first = service.create_invoice(new_invoice.clone()).await.unwrap();
        let second = service.create_invoice(new_invoice).await.unwrap();

        assert!(first.number.starts_with("INV-"));
        assert_ne!(first.number, second.number);
        assert!(first.number.ends_with("-0001"));
        assert!(second.number.ends_with("-0002"));
    }

    #[tokio::test]
    async fn number_matches_expected_pattern() {
        let (service, new_invoice) = invoice_service().await;
        let invoice = service.create_invoice(new_invoice).await.unwrap();

        // INV-YYYYMM-NNNN
        let parts: Vec<&str> = invoice.number.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "INV");
        assert_eq!(parts[1].len(), 6);
        assert_eq!(parts[2].len(), 4);
        assert!(parts[1].chars().all(|c| c.is_ascii_digit()));
        assert!(parts[2].chars().all(|c| c.is_ascii_digit()));
    }

    #[tokio::test]
    async fn past_due_date_is_rejected() {
        let (service, mut new_invoice) = invoice_service().await;
        new_invoice.due_date = TemporalFixtures::past_due_date();

        let result = service.create_invoice(new_invoice).await;
        assert!(matches!(result, Err(BillingError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn zero_total_is_rejected() {
        let (service, mut new_invoice) = invoice_service().await;
        new_invoice.total_amount = MoneyFixtures::usd(dec!(0));

        let result = service.create_invoice(new_invoice).await;
        assert!(matches!(result, Err(BillingError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn unknown_owner_is_rejected() {
        let (service, mut new_invoice) = invoice_service().await;
        new_invoice.owner_id = core_kernel::OwnerId::new();

        let result = service.create_invoice(new_invoice).await;
        assert!(matches!(result, Err(BillingError::OwnerNotFound(_))));
    }
}
