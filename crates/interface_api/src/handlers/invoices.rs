//! Invoice handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use core_kernel::{Currency, Money};
use domain_billing::ports::{InvoiceUpdate, NewInvoice};

use crate::dto::invoices::{CreateInvoiceRequest, InvoiceResponse, UpdateInvoiceRequest};
use crate::dto::payments::PaymentRecordResponse;
use crate::error::ApiError;
use crate::AppState;

fn parse_currency(code: Option<&str>) -> Result<Currency, ApiError> {
    match code {
        None => Ok(Currency::USD),
        Some(raw) => Currency::from_code(raw)
            .ok_or_else(|| ApiError::BadRequest(format!("Unknown currency code: {}", raw))),
    }
}

/// Creates a new invoice
pub async fn create_invoice(
    State(state): State<AppState>,
    Json(request): Json<CreateInvoiceRequest>,
) -> Result<(StatusCode, Json<InvoiceResponse>), ApiError> {
    let currency = parse_currency(request.currency.as_deref())?;

    let invoice = state
        .invoice_service()
        .create_invoice(NewInvoice {
            owner_id: request.owner_id.into(),
            customer_id: request.customer_id.into(),
            due_date: request.due_date,
            currency,
            total_amount: Money::new(request.total_amount, currency),
        })
        .await?;

    Ok((StatusCode::CREATED, Json(invoice.into())))
}

/// Lists invoices, newest first
pub async fn list_invoices(
    State(state): State<AppState>,
) -> Result<Json<Vec<InvoiceResponse>>, ApiError> {
    let invoices = state.invoice_service().list_invoices().await?;
    Ok(Json(invoices.into_iter().map(InvoiceResponse::from).collect()))
}

/// Gets an invoice by id
pub async fn get_invoice(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<InvoiceResponse>, ApiError> {
    let invoice = state.invoice_service().get_invoice(id.into()).await?;
    Ok(Json(invoice.into()))
}

/// Updates client-editable invoice fields
pub async fn update_invoice(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateInvoiceRequest>,
) -> Result<Json<InvoiceResponse>, ApiError> {
    let status = request
        .status
        .as_deref()
        .map(|raw| {
            raw.parse()
                .map_err(|_| ApiError::BadRequest("Invalid status".to_string()))
        })
        .transpose()?;

    // A total_amount edit keeps the invoice's existing currency
    let total_amount = match request.total_amount {
        Some(amount) => {
            let current = state.invoice_service().get_invoice(id.into()).await?;
            Some(Money::new(amount, current.currency))
        }
        None => None,
    };

    let invoice = state
        .invoice_service()
        .update_invoice(
            id.into(),
            InvoiceUpdate {
                due_date: request.due_date,
                status,
                total_amount,
            },
        )
        .await?;

    Ok(Json(invoice.into()))
}

/// Deletes an invoice and its payment records
pub async fn delete_invoice(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.invoice_service().delete_invoice(id.into()).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Lists payment records for an invoice, newest first
pub async fn list_invoice_payments(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<PaymentRecordResponse>>, ApiError> {
    let records = state.invoice_service().list_payments(id.into()).await?;
    Ok(Json(
        records.into_iter().map(PaymentRecordResponse::from).collect(),
    ))
}
