//! Business owners and customers
//!
//! Reference entities for the two sides of an invoice. Both are
//! append/delete-only; invoices cascade away with their owner or customer.

use serde::{Deserialize, Serialize};

use core_kernel::{CustomerId, OwnerId};

/// A business owner who issues invoices
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusinessOwner {
    pub id: OwnerId,
    pub company_name: String,
}

impl BusinessOwner {
    /// Creates a new business owner
    pub fn new(company_name: impl Into<String>) -> Self {
        Self {
            id: OwnerId::new_v7(),
            company_name: company_name.into(),
        }
    }
}

/// A customer who receives and pays invoices
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub name: String,
    pub email: String,
}

impl Customer {
    /// Creates a new customer
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: CustomerId::new_v7(),
            name: name.into(),
            email: email.into(),
        }
    }
}
