//! HTTP API Layer
//!
//! This crate provides the REST API for the invoicing system using Axum.
//!
//! # Architecture
//!
//! - **Handlers**: Request handlers for invoices, payments, parties,
//!   webhooks, and health
//! - **DTOs**: Request/response data transfer objects
//! - **Error Handling**: Consistent error responses mapped from the
//!   domain error taxonomy
//!
//! The application state carries port trait objects, so the same router
//! runs over PostgreSQL adapters in production and in-memory adapters in
//! tests.
//!
//! # Example
//!
//! ```rust,ignore
//! use interface_api::{create_router, AppState};
//!
//! let app = create_router(state);
//! axum::serve(listener, app).await?;
//! ```

pub mod config;
pub mod dto;
pub mod error;
pub mod handlers;

use axum::{
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use domain_billing::adapters::ProcessorConfig;
use domain_billing::events::EventSink;
use domain_billing::ports::{BillingStore, PartyStore, PaymentProcessor};
use domain_billing::services::{InvoiceService, PartyService, PaymentService};
use domain_billing::webhook::WebhookDispatcher;

use crate::handlers::{health, invoices, parties, payments, webhooks};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn BillingStore>,
    pub parties: Arc<dyn PartyStore>,
    pub processor: Arc<dyn PaymentProcessor>,
    pub events: Arc<dyn EventSink>,
    pub processor_config: ProcessorConfig,
}

impl AppState {
    /// Builds the invoice service over the configured ports
    pub fn invoice_service(&self) -> InvoiceService {
        InvoiceService::new(self.store.clone(), self.parties.clone(), self.events.clone())
    }

    /// Builds the payment service over the configured ports
    pub fn payment_service(&self) -> PaymentService {
        PaymentService::new(
            self.store.clone(),
            self.processor.clone(),
            self.events.clone(),
        )
    }

    /// Builds the party service over the configured ports
    pub fn party_service(&self) -> PartyService {
        PartyService::new(self.parties.clone(), self.events.clone())
    }

    /// Builds the webhook dispatcher
    pub fn webhook_dispatcher(&self) -> WebhookDispatcher {
        WebhookDispatcher::new(self.payment_service())
    }
}

/// Creates the main API router
///
/// # Arguments
///
/// * `state` - Application state carrying the port implementations
///
/// # Returns
///
/// Configured Axum router with all routes and middleware
pub fn create_router(state: AppState) -> Router {
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/health", get(health::health_check))
        .route("/health/ready", get(health::readiness_check));

    // Invoice routes
    let invoice_routes = Router::new()
        .route("/", post(invoices::create_invoice))
        .route("/", get(invoices::list_invoices))
        .route("/:id", get(invoices::get_invoice))
        .route("/:id", put(invoices::update_invoice))
        .route("/:id", axum::routing::delete(invoices::delete_invoice))
        .route("/:id/payments", get(invoices::list_invoice_payments));

    // Payment routes
    let payment_routes = Router::new()
        .route("/intents", post(payments::create_payment_intent))
        .route("/:id/refund", post(payments::refund_payment));

    // Party routes
    let owner_routes = Router::new()
        .route("/", post(parties::create_owner))
        .route("/", get(parties::list_owners))
        .route("/:id", get(parties::get_owner))
        .route("/:id", axum::routing::delete(parties::delete_owner));

    let customer_routes = Router::new()
        .route("/", post(parties::create_customer))
        .route("/", get(parties::list_customers))
        .route("/:id", get(parties::get_customer))
        .route("/:id", axum::routing::delete(parties::delete_customer));

    // Webhook route (verified by signature, not by auth middleware)
    let webhook_routes = Router::new().route("/processor", post(webhooks::processor_webhook));

    let api_routes = Router::new()
        .nest("/invoices", invoice_routes)
        .nest("/payments", payment_routes)
        .nest("/owners", owner_routes)
        .nest("/customers", customer_routes)
        .nest("/webhooks", webhook_routes);

    // Combine all routes
    Router::new()
        .merge(public_routes)
        .nest("/api/v1", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
