//! End-to-end API tests
//!
//! Drive the full router over in-memory adapters and the fake processor,
//! including signed webhook deliveries with real HMAC signatures.

use std::sync::Arc;

use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum_test::TestServer;
use rust_decimal_macros::dec;
use secrecy::Secret;
use serde_json::{json, Value};

use domain_billing::adapters::{sign_payload, ProcessorConfig};
use interface_api::{create_router, AppState};
use test_utils::{FakeProcessor, InMemoryBillingStore, InMemoryPartyStore, RecordingEventSink};

const WEBHOOK_SECRET: &str = "whsec_test_secret";
const SIGNATURE_HEADER: &str = "x-webhook-signature";

fn test_state(webhook_secret: &str) -> AppState {
    AppState {
        store: Arc::new(InMemoryBillingStore::new()),
        parties: Arc::new(InMemoryPartyStore::new()),
        processor: Arc::new(FakeProcessor::new()),
        events: Arc::new(RecordingEventSink::new()),
        processor_config: ProcessorConfig {
            api_base_url: "http://processor.local/v1".to_string(),
            secret_key: Secret::new("sk_test_123".to_string()),
            webhook_secret: Secret::new(webhook_secret.to_string()),
        },
    }
}

fn server() -> TestServer {
    TestServer::new(create_router(test_state(WEBHOOK_SECRET))).unwrap()
}

/// Creates owner, customer, and a 1000.00 USD invoice; returns the invoice id
async fn issue_invoice(server: &TestServer) -> String {
    let owner = server
        .post("/api/v1/owners")
        .json(&json!({"company_name": "Acme Corp"}))
        .await;
    owner.assert_status(StatusCode::CREATED);
    let owner_id = owner.json::<Value>()["id"].as_str().unwrap().to_string();

    let customer = server
        .post("/api/v1/customers")
        .json(&json!({"name": "Jo Client", "email": "jo@example.com"}))
        .await;
    customer.assert_status(StatusCode::CREATED);
    let customer_id = customer.json::<Value>()["id"].as_str().unwrap().to_string();

    let due_date = chrono::Utc::now() + chrono::Duration::days(30);
    let invoice = server
        .post("/api/v1/invoices")
        .json(&json!({
            "owner_id": owner_id,
            "customer_id": customer_id,
            "due_date": due_date,
            "currency": "USD",
            "total_amount": "1000.00"
        }))
        .await;
    invoice.assert_status(StatusCode::CREATED);
    invoice.json::<Value>()["id"].as_str().unwrap().to_string()
}

async fn deliver_webhook(server: &TestServer, payload: Value, secret: &str) -> axum_test::TestResponse {
    let body = payload.to_string().into_bytes();
    let signature = sign_payload(&body, secret);

    server
        .post("/api/v1/webhooks/processor")
        .add_header(
            HeaderName::from_static(SIGNATURE_HEADER),
            HeaderValue::from_str(&signature).unwrap(),
        )
        .content_type("application/json")
        .bytes(body.into())
        .await
}

fn succeeded_event(invoice_id: &str, intent_id: &str, amount_minor: i64) -> Value {
    json!({
        "id": "evt_1",
        "type": "payment_intent.succeeded",
        "data": {"object": {
            "id": intent_id,
            "amount": amount_minor,
            "currency": "usd",
            "status": "succeeded",
            "created": 1_700_000_000,
            "metadata": {"invoice_id": invoice_id}
        }}
    })
}

#[tokio::test]
async fn health_endpoints_respond() {
    let server = server();

    let health = server.get("/health").await;
    health.assert_status_ok();
    assert_eq!(health.json::<Value>()["status"], "healthy");

    let ready = server.get("/health/ready").await;
    ready.assert_status_ok();
    assert_eq!(ready.json::<Value>()["status"], "ready");
}

#[tokio::test]
async fn invoice_lifecycle_with_payment_and_refund() {
    let server = server();
    let invoice_id = issue_invoice(&server).await;

    // Fresh invoice: sent, nothing collected
    let fresh = server
        .get(&format!("/api/v1/invoices/{}", invoice_id))
        .await
        .json::<Value>();
    assert_eq!(fresh["status"], "sent");
    assert_eq!(fresh["amount_due"], "1000.00");
    assert!(fresh["invoice_number"]
        .as_str()
        .unwrap()
        .starts_with("INV-"));

    // Processor confirms the payment asynchronously
    let delivery = deliver_webhook(
        &server,
        succeeded_event(&invoice_id, "pi_e2e", 100_000),
        WEBHOOK_SECRET,
    )
    .await;
    delivery.assert_status_ok();
    assert_eq!(delivery.text(), "success");

    let paid = server
        .get(&format!("/api/v1/invoices/{}", invoice_id))
        .await
        .json::<Value>();
    assert_eq!(paid["status"], "paid");
    assert_eq!(paid["payment_status"], "succeeded");
    assert_eq!(paid["amount_paid"], "1000.00");

    // Refund through the synchronous path
    let payments = server
        .get(&format!("/api/v1/invoices/{}/payments", invoice_id))
        .await
        .json::<Value>();
    let record_id = payments[0]["id"].as_str().unwrap();

    let refund = server
        .post(&format!("/api/v1/payments/{}/refund", record_id))
        .await;
    refund.assert_status_ok();
    assert_eq!(
        refund.json::<Value>()["message"],
        "Refund processed successfully"
    );

    let refunded = server
        .get(&format!("/api/v1/invoices/{}", invoice_id))
        .await
        .json::<Value>();
    assert_eq!(refunded["status"], "refunded");
    assert_eq!(refunded["payment_status"], "refunded");
    assert_eq!(refunded["amount_paid"], "0.00");

    // Second refund attempt conflicts
    let again = server
        .post(&format!("/api/v1/payments/{}/refund", record_id))
        .await;
    again.assert_status(StatusCode::CONFLICT);
}

#[tokio::test]
async fn create_invoice_rejects_past_due_date() {
    let server = server();

    let owner = server
        .post("/api/v1/owners")
        .json(&json!({"company_name": "Acme Corp"}))
        .await
        .json::<Value>();
    let customer = server
        .post("/api/v1/customers")
        .json(&json!({"name": "Jo", "email": "jo@example.com"}))
        .await
        .json::<Value>();

    let past = chrono::Utc::now() - chrono::Duration::days(3);
    let response = server
        .post("/api/v1/invoices")
        .json(&json!({
            "owner_id": owner["id"],
            "customer_id": customer["id"],
            "due_date": past,
            "total_amount": "100.00"
        }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn payment_intent_endpoint_validates_amount() {
    let server = server();
    let invoice_id = issue_invoice(&server).await;

    let ok = server
        .post("/api/v1/payments/intents")
        .json(&json!({
            "invoice_id": invoice_id,
            "payer_email": "payer@example.com",
            "payment_amount": "250.00"
        }))
        .await;
    ok.assert_status_ok();
    let body = ok.json::<Value>();
    assert_eq!(body["amount"], "250.00");
    assert!(body["client_secret"].as_str().unwrap().ends_with("_secret"));

    let too_small = server
        .post("/api/v1/payments/intents")
        .json(&json!({"invoice_id": invoice_id, "payment_amount": "0.50"}))
        .await;
    too_small.assert_status(StatusCode::BAD_REQUEST);

    let too_big = server
        .post("/api/v1/payments/intents")
        .json(&json!({"invoice_id": invoice_id, "payment_amount": "5000.00"}))
        .await;
    too_big.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn partial_payment_marks_invoice_partial() {
    let server = server();
    let invoice_id = issue_invoice(&server).await;

    deliver_webhook(
        &server,
        succeeded_event(&invoice_id, "pi_half", 50_000),
        WEBHOOK_SECRET,
    )
    .await
    .assert_status_ok();

    let invoice = server
        .get(&format!("/api/v1/invoices/{}", invoice_id))
        .await
        .json::<Value>();
    assert_eq!(invoice["status"], "partial");
    assert_eq!(invoice["amount_paid"], "500.00");
    assert_eq!(invoice["amount_due"], "500.00");
}

#[tokio::test]
async fn webhook_without_signature_is_rejected() {
    let server = server();

    let response = server
        .post("/api/v1/webhooks/processor")
        .content_type("application/json")
        .bytes(b"{}".to_vec().into())
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(response.text(), "Missing signature header");
}

#[tokio::test]
async fn webhook_with_bad_signature_is_rejected() {
    let server = server();
    let invoice_id = issue_invoice(&server).await;

    let response = deliver_webhook(
        &server,
        succeeded_event(&invoice_id, "pi_forged", 100_000),
        "wrong_secret",
    )
    .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(response.text(), "Invalid signature");

    // Nothing was mutated
    let invoice = server
        .get(&format!("/api/v1/invoices/{}", invoice_id))
        .await
        .json::<Value>();
    assert_eq!(invoice["status"], "sent");
}

#[tokio::test]
async fn webhook_without_configured_secret_is_rejected() {
    let server = TestServer::new(create_router(test_state(""))).unwrap();

    let body = b"{}".to_vec();
    let signature = sign_payload(&body, WEBHOOK_SECRET);
    let response = server
        .post("/api/v1/webhooks/processor")
        .add_header(
            HeaderName::from_static(SIGNATURE_HEADER),
            HeaderValue::from_str(&signature).unwrap(),
        )
        .content_type("application/json")
        .bytes(body.into())
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(response.text(), "Webhook not configured");
}

#[tokio::test]
async fn webhook_with_unknown_event_type_returns_success() {
    let server = server();
    let invoice_id = issue_invoice(&server).await;

    let response = deliver_webhook(
        &server,
        json!({
            "id": "evt_x",
            "type": "customer.subscription.deleted",
            "data": {"object": {"id": "sub_1"}}
        }),
        WEBHOOK_SECRET,
    )
    .await;

    response.assert_status_ok();
    assert_eq!(response.text(), "success");

    let invoice = server
        .get(&format!("/api/v1/invoices/{}", invoice_id))
        .await
        .json::<Value>();
    assert_eq!(invoice["status"], "sent");
    // Never reconciled, so amount_paid is the untouched zero default
    let paid: rust_decimal::Decimal = invoice["amount_paid"].as_str().unwrap().parse().unwrap();
    assert!(paid.is_zero());
}

#[tokio::test]
async fn refund_webhook_reconciles_invoice() {
    let server = server();
    let invoice_id = issue_invoice(&server).await;

    deliver_webhook(
        &server,
        succeeded_event(&invoice_id, "pi_hooked", 100_000),
        WEBHOOK_SECRET,
    )
    .await
    .assert_status_ok();

    let refund_event = json!({
        "id": "evt_refund",
        "type": "refund.created",
        "data": {"object": {
            "id": "re_hooked",
            "amount": 100_000,
            "status": "succeeded",
            "payment_intent": "pi_hooked",
            "created": 1_700_000_500
        }}
    });
    deliver_webhook(&server, refund_event, WEBHOOK_SECRET)
        .await
        .assert_status_ok();

    let invoice = server
        .get(&format!("/api/v1/invoices/{}", invoice_id))
        .await
        .json::<Value>();
    assert_eq!(invoice["status"], "refunded");
    assert_eq!(invoice["amount_paid"], "0.00");

    let payments = server
        .get(&format!("/api/v1/invoices/{}/payments", invoice_id))
        .await
        .json::<Value>();
    assert_eq!(payments.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn amounts_survive_decimal_round_trip() {
    let server = server();
    let invoice_id = issue_invoice(&server).await;

    deliver_webhook(
        &server,
        succeeded_event(&invoice_id, "pi_cents", 33_333),
        WEBHOOK_SECRET,
    )
    .await
    .assert_status_ok();

    let invoice = server
        .get(&format!("/api/v1/invoices/{}", invoice_id))
        .await
        .json::<Value>();
    let paid: rust_decimal::Decimal = invoice["amount_paid"].as_str().unwrap().parse().unwrap();
    assert_eq!(paid, dec!(333.33));
}
