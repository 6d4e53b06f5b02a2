//! Processor webhook handler
//!
//! Single entry point for signed webhook deliveries. Verification order:
//! signature header present, webhook secret configured, signature valid
//! against the raw body bytes, payload parses. Only then is the event
//! dispatched. Responses are 200 on any handled outcome (including no-op
//! branches) and 400 for verification or processing failures; the
//! processor owns redelivery.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use secrecy::ExposeSecret;

use domain_billing::adapters::{construct_event, WebhookVerifyError};

use crate::AppState;

/// Header carrying the HMAC signature of the raw request body
pub const SIGNATURE_HEADER: &str = "x-webhook-signature";

const SUCCESS_BODY: &str = "success";

/// Handles an inbound processor webhook delivery
pub async fn processor_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    tracing::info!("received webhook call");

    let Some(signature) = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
    else {
        tracing::error!("missing webhook signature header");
        return (StatusCode::BAD_REQUEST, "Missing signature header").into_response();
    };

    if !state.processor_config.webhook_configured() {
        tracing::error!("webhook secret is not configured");
        return (StatusCode::BAD_REQUEST, "Webhook not configured").into_response();
    }

    let secret = state.processor_config.webhook_secret.expose_secret();
    let event = match construct_event(&body, signature, secret) {
        Ok(event) => event,
        Err(WebhookVerifyError::InvalidSignature) => {
            return (StatusCode::BAD_REQUEST, "Invalid signature").into_response();
        }
        Err(WebhookVerifyError::InvalidPayload(e)) => {
            tracing::error!(error = %e, "invalid webhook payload");
            return (StatusCode::BAD_REQUEST, "Invalid payload").into_response();
        }
    };

    match state.webhook_dispatcher().dispatch(event).await {
        Ok(_) => (StatusCode::OK, SUCCESS_BODY).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "webhook processing error");
            (
                StatusCode::BAD_REQUEST,
                format!("Webhook processing failed: {}", e),
            )
                .into_response()
        }
    }
}
