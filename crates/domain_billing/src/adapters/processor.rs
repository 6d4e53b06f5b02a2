//! HTTP payment processor client
//!
//! Implements the [`PaymentProcessor`] port against the processor's REST
//! API: payment-intent creation and refund creation. Credentials are
//! injected through [`ProcessorConfig`] at construction time; nothing is
//! read from the process environment at call time.

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use core_kernel::DomainPort;

use crate::ports::{
    CreateIntentRequest, CreateRefundRequest, PaymentIntent, PaymentProcessor, ProcessorError,
    Refund,
};

/// Processor error code for a charge that was already refunded
const CODE_CHARGE_ALREADY_REFUNDED: &str = "charge_already_refunded";

/// Configuration for the processor client
///
/// `secret_key` authenticates API calls; `webhook_secret` verifies inbound
/// webhook signatures (see [`crate::adapters::signature`]).
#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    /// Base URL of the processor API (e.g. "https://api.processor.com/v1")
    pub api_base_url: String,
    /// API secret key
    pub secret_key: Secret<String>,
    /// Shared secret for webhook signature verification
    pub webhook_secret: Secret<String>,
}

impl ProcessorConfig {
    /// Returns true when API credentials are present
    pub fn is_configured(&self) -> bool {
        !self.secret_key.expose_secret().is_empty()
    }

    /// Returns true when a webhook secret is present
    pub fn webhook_configured(&self) -> bool {
        !self.webhook_secret.expose_secret().is_empty()
    }
}

/// Payment processor client speaking the REST API
#[derive(Clone)]
pub struct HttpPaymentProcessor {
    client: Client,
    config: ProcessorConfig,
}

#[derive(Serialize)]
struct IntentBody<'a> {
    amount: i64,
    currency: &'a str,
    metadata: &'a HashMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    receipt_email: Option<&'a str>,
    payment_method_types: &'a [String],
    automatic_payment_methods: AutomaticPaymentMethods,
}

#[derive(Serialize)]
struct AutomaticPaymentMethods {
    enabled: bool,
}

#[derive(Serialize)]
struct RefundBody<'a> {
    payment_intent: &'a str,
    amount: i64,
    metadata: &'a HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl HttpPaymentProcessor {
    /// Creates a new processor client
    pub fn new(config: ProcessorConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    /// Returns the configuration this client was built with
    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    async fn post_json<B: Serialize, R: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R, ProcessorError> {
        if !self.config.is_configured() {
            return Err(ProcessorError::NotConfigured);
        }

        let url = format!("{}/{}", self.config.api_base_url, path);
        let response = self
            .client
            .post(&url)
            .bearer_auth(self.config.secret_key.expose_secret())
            .json(body)
            .send()
            .await
            .map_err(|e| ProcessorError::Transport(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ProcessorError::Transport(e.to_string()))?;

        tracing::debug!(%status, path, "processor response");

        if status.is_success() {
            serde_json::from_str(&text).map_err(|e| {
                ProcessorError::Transport(format!("Malformed processor response: {}", e))
            })
        } else {
            let detail = serde_json::from_str::<ApiErrorBody>(&text)
                .map(|b| b.error)
                .unwrap_or(ApiErrorDetail {
                    code: None,
                    message: Some(text),
                });
            let code = detail.code.unwrap_or_else(|| status.as_u16().to_string());
            let message = detail.message.unwrap_or_default();

            tracing::error!(%code, %message, path, "processor request failed");

            if code == CODE_CHARGE_ALREADY_REFUNDED {
                Err(ProcessorError::AlreadyRefunded)
            } else {
                Err(ProcessorError::Api { code, message })
            }
        }
    }
}

impl DomainPort for HttpPaymentProcessor {}

#[async_trait]
impl PaymentProcessor for HttpPaymentProcessor {
    async fn create_payment_intent(
        &self,
        request: CreateIntentRequest,
    ) -> Result<PaymentIntent, ProcessorError> {
        let body = IntentBody {
            amount: request.amount,
            currency: &request.currency,
            metadata: &request.metadata,
            receipt_email: request.receipt_email.as_deref(),
            payment_method_types: &request.payment_method_types,
            automatic_payment_methods: AutomaticPaymentMethods {
                enabled: request.automatic_payment_methods,
            },
        };

        let intent: PaymentIntent = self.post_json("payment_intents", &body).await?;
        tracing::info!(
            intent_id = %intent.id,
            amount = intent.amount,
            currency = %intent.currency,
            "payment intent created at processor"
        );
        Ok(intent)
    }

    async fn create_refund(&self, request: CreateRefundRequest) -> Result<Refund, ProcessorError> {
        let body = RefundBody {
            payment_intent: &request.payment_intent,
            amount: request.amount,
            metadata: &request.metadata,
        };

        let refund: Refund = self.post_json("refunds", &body).await?;
        tracing::info!(refund_id = %refund.id, "refund created at processor");
        Ok(refund)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{bearer_token, body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(base_url: &str) -> ProcessorConfig {
        ProcessorConfig {
            api_base_url: base_url.to_string(),
            secret_key: Secret::new("sk_test_123".to_string()),
            webhook_secret: Secret::new("whsec_test".to_string()),
        }
    }

    fn intent_request() -> CreateIntentRequest {
        CreateIntentRequest {
            amount: 100_000,
            currency: "usd".to_string(),
            metadata: HashMap::new(),
            receipt_email: Some("payer@example.com".to_string()),
            payment_method_types: vec!["card".to_string()],
            automatic_payment_methods: false,
        }
    }

    #[test]
    fn test_is_configured() {
        assert!(config("https://api.example.com/v1").is_configured());

        let empty = ProcessorConfig {
            api_base_url: String::new(),
            secret_key: Secret::new(String::new()),
            webhook_secret: Secret::new(String::new()),
        };
        assert!(!empty.is_configured());
        assert!(!empty.webhook_configured());
    }

    #[tokio::test]
    async fn test_create_payment_intent_success() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/payment_intents"))
            .and(bearer_token("sk_test_123"))
            .and(body_partial_json(serde_json::json!({
                "amount": 100_000,
                "currency": "usd",
                "automatic_payment_methods": {"enabled": false}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "pi_abc",
                "amount": 100_000,
                "currency": "usd",
                "status": "requires_payment_method",
                "client_secret": "pi_abc_secret",
                "created": 1700000000,
                "metadata": {"invoice_id": "whatever"}
            })))
            .mount(&server)
            .await;

        let processor = HttpPaymentProcessor::new(config(&server.uri()));
        let intent = processor
            .create_payment_intent(intent_request())
            .await
            .unwrap();

        assert_eq!(intent.id, "pi_abc");
        assert_eq!(intent.client_secret.as_deref(), Some("pi_abc_secret"));
        assert_eq!(intent.status, "requires_payment_method");
    }

    #[tokio::test]
    async fn test_create_refund_maps_already_refunded() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/refunds"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": {
                    "code": "charge_already_refunded",
                    "message": "Charge has already been refunded."
                }
            })))
            .mount(&server)
            .await;

        let processor = HttpPaymentProcessor::new(config(&server.uri()));
        let result = processor
            .create_refund(CreateRefundRequest {
                payment_intent: "pi_abc".to_string(),
                amount: 100_000,
                metadata: HashMap::new(),
            })
            .await;

        assert!(matches!(result, Err(ProcessorError::AlreadyRefunded)));
    }

    #[tokio::test]
    async fn test_api_error_surfaces_code_and_message() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/payment_intents"))
            .respond_with(ResponseTemplate::new(402).set_body_json(serde_json::json!({
                "error": {"code": "card_declined", "message": "Your card was declined."}
            })))
            .mount(&server)
            .await;

        let processor = HttpPaymentProcessor::new(config(&server.uri()));
        let result = processor.create_payment_intent(intent_request()).await;

        match result {
            Err(ProcessorError::Api { code, message }) => {
                assert_eq!(code, "card_declined");
                assert_eq!(message, "Your card was declined.");
            }
            other => panic!("expected Api error, got {:?}", other.map(|i| i.id)),
        }
    }

    #[tokio::test]
    async fn test_unconfigured_client_refuses_to_call() {
        let processor = HttpPaymentProcessor::new(ProcessorConfig {
            api_base_url: "http://localhost:1".to_string(),
            secret_key: Secret::new(String::new()),
            webhook_secret: Secret::new(String::new()),
        });

        let result = processor.create_payment_intent(intent_request()).await;
        assert!(matches!(result, Err(ProcessorError::NotConfigured)));
    }
}
