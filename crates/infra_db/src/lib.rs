//! Infrastructure Database Layer
//!
//! This crate provides the PostgreSQL infrastructure for the invoicing
//! system, implementing the billing domain's persistence ports with SQLx.
//!
//! # Architecture
//!
//! The crate follows the repository pattern: `PostgresBillingStore` and
//! `PostgresPartyStore` implement the port traits defined in
//! `domain_billing::ports`, hiding all SQL from the domain layer.
//!
//! # Concurrency discipline
//!
//! Reconciliation reads an invoice's payment records, recomputes the
//! aggregate, and writes it back. The repository runs that sequence in a
//! single transaction with the invoice row locked (`SELECT ... FOR
//! UPDATE`), which serializes concurrent reconciliations of the same
//! invoice - the one genuine concurrency hazard in the system.
//!
//! # Example
//!
//! ```rust,ignore
//! use infra_db::{create_pool_from_url, run_migrations, PostgresBillingStore};
//!
//! let pool = create_pool_from_url("postgres://localhost/invoicing").await?;
//! run_migrations(&pool).await?;
//! let store = PostgresBillingStore::new(pool);
//! ```

pub mod error;
pub mod pool;
pub mod repositories;

pub use error::DatabaseError;
pub use pool::{
    create_pool, create_pool_from_url, run_migrations, DatabaseConfig, DatabasePool,
};
pub use repositories::{PostgresBillingStore, PostgresPartyStore};
