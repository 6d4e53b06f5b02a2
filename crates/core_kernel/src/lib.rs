//! Core Kernel - Foundational types and utilities for the invoicing system
//!
//! This crate provides the fundamental building blocks used across all domain modules:
//! - Money types with precise decimal arithmetic
//! - Strongly-typed identifiers
//! - Port infrastructure for the hexagonal architecture

pub mod error;
pub mod identifiers;
pub mod money;
pub mod ports;

pub use error::CoreError;
pub use identifiers::{AuditEventId, CustomerId, InvoiceId, OwnerId, PaymentRecordId};
pub use money::{Currency, Money, MoneyError};
pub use ports::{DomainPort, PortError};
