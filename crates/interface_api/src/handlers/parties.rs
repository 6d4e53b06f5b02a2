//! Business owner and customer handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;
use validator::Validate;

use domain_billing::party::{BusinessOwner, Customer};

use crate::dto::parties::{
    CreateCustomerRequest, CreateOwnerRequest, CustomerResponse, OwnerResponse,
};
use crate::error::ApiError;
use crate::AppState;

/// Creates a business owner
pub async fn create_owner(
    State(state): State<AppState>,
    Json(request): Json<CreateOwnerRequest>,
) -> Result<(StatusCode, Json<OwnerResponse>), ApiError> {
    request.validate()?;

    let owner = state
        .party_service()
        .create_owner(BusinessOwner::new(request.company_name))
        .await?;
    Ok((StatusCode::CREATED, Json(owner.into())))
}

/// Lists business owners
pub async fn list_owners(
    State(state): State<AppState>,
) -> Result<Json<Vec<OwnerResponse>>, ApiError> {
    let owners = state.party_service().list_owners().await?;
    Ok(Json(owners.into_iter().map(OwnerResponse::from).collect()))
}

/// Gets a business owner by id
pub async fn get_owner(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<OwnerResponse>, ApiError> {
    let owner = state.party_service().get_owner(id.into()).await?;
    Ok(Json(owner.into()))
}

/// Deletes a business owner
pub async fn delete_owner(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.party_service().delete_owner(id.into()).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Creates a customer
pub async fn create_customer(
    State(state): State<AppState>,
    Json(request): Json<CreateCustomerRequest>,
) -> Result<(StatusCode, Json<CustomerResponse>), ApiError> {
    request.validate()?;

    let customer = state
        .party_service()
        .create_customer(Customer::new(request.name, request.email))
        .await?;
    Ok((StatusCode::CREATED, Json(customer.into())))
}

/// Lists customers
pub async fn list_customers(
    State(state): State<AppState>,
) -> Result<Json<Vec<CustomerResponse>>, ApiError> {
    let customers = state.party_service().list_customers().await?;
    Ok(Json(
        customers.into_iter().map(CustomerResponse::from).collect(),
    ))
}

/// Gets a customer by id
pub async fn get_customer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<CustomerResponse>, ApiError> {
    let customer = state.party_service().get_customer(id.into()).await?;
    Ok(Json(customer.into()))
}

/// Deletes a customer
pub async fn delete_customer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.party_service().delete_customer(id.into()).await?;
    Ok(StatusCode::NO_CONTENT)
}
