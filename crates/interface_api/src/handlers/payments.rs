//! Payment and refund handlers

use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::dto::payments::{
    CreatePaymentIntentRequest, PaymentIntentResponse, RefundResponse,
};
use crate::error::ApiError;
use crate::AppState;

/// Creates a payment intent for an invoice
pub async fn create_payment_intent(
    State(state): State<AppState>,
    Json(request): Json<CreatePaymentIntentRequest>,
) -> Result<Json<PaymentIntentResponse>, ApiError> {
    request.validate()?;

    let receipt = state
        .payment_service()
        .create_payment_intent(
            request.invoice_id.into(),
            request.payer_email,
            request.payment_amount,
        )
        .await?;

    Ok(Json(PaymentIntentResponse::from_receipt(receipt)))
}

/// Refunds a captured payment in full
pub async fn refund_payment(
    State(state): State<AppState>,
    Path(record_id): Path<Uuid>,
) -> Result<Json<RefundResponse>, ApiError> {
    let refund = state
        .payment_service()
        .process_refund(record_id.into())
        .await?;

    Ok(Json(RefundResponse {
        message: "Refund processed successfully".to_string(),
        refund: refund.into(),
    }))
}
