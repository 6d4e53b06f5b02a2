//! Party DTOs

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use domain_billing::party::{BusinessOwner, Customer};

/// Request body for creating a business owner
#[derive(Debug, Deserialize, Validate)]
pub struct CreateOwnerRequest {
    #[validate(length(min = 1, max = 255))]
    pub company_name: String,
}

/// Request body for creating a customer
#[derive(Debug, Deserialize, Validate)]
pub struct CreateCustomerRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(email)]
    pub email: String,
}

/// Business owner representation returned by the API
#[derive(Debug, Serialize)]
pub struct OwnerResponse {
    pub id: Uuid,
    pub company_name: String,
}

impl From<BusinessOwner> for OwnerResponse {
    fn from(owner: BusinessOwner) -> Self {
        Self {
            id: owner.id.into(),
            company_name: owner.company_name,
        }
    }
}

/// Customer representation returned by the API
#[derive(Debug, Serialize)]
pub struct CustomerResponse {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

impl From<Customer> for CustomerResponse {
    fn from(customer: Customer) -> Self {
        Self {
            id: customer.id.into(),
            name: customer.name,
            email: customer.email,
        }
    }
}
