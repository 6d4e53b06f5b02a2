//! Party repository
//!
//! PostgreSQL implementation of the `PartyStore` port. Owners and
//! customers are append/delete-only; deleting either cascades to their
//! invoices and payment records at the schema level.

use async_trait::async_trait;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use core_kernel::{CustomerId, DomainPort, OwnerId, PortError};
use domain_billing::party::{BusinessOwner, Customer};
use domain_billing::ports::PartyStore;

use crate::error::DatabaseError;

/// Repository implementing [`PartyStore`] on PostgreSQL
#[derive(Debug, Clone)]
pub struct PostgresPartyStore {
    pool: PgPool,
}

#[derive(Debug, FromRow)]
struct OwnerRow {
    id: Uuid,
    company_name: String,
}

impl From<OwnerRow> for BusinessOwner {
    fn from(row: OwnerRow) -> Self {
        BusinessOwner {
            id: OwnerId::from(row.id),
            company_name: row.company_name,
        }
    }
}

#[derive(Debug, FromRow)]
struct CustomerRow {
    id: Uuid,
    name: String,
    email: String,
}

impl From<CustomerRow> for Customer {
    fn from(row: CustomerRow) -> Self {
        Customer {
            id: CustomerId::from(row.id),
            name: row.name,
            email: row.email,
        }
    }
}

impl PostgresPartyStore {
    /// Creates a new repository on the given connection pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl DomainPort for PostgresPartyStore {}

#[async_trait]
impl PartyStore for PostgresPartyStore {
    async fn create_owner(&self, owner: BusinessOwner) -> Result<BusinessOwner, PortError> {
        sqlx::query("INSERT INTO business_owners (id, company_name) VALUES ($1, $2)")
            .bind(owner.id.as_uuid())
            .bind(&owner.company_name)
            .execute(&self.pool)
            .await
            .map_err(DatabaseError::from)?;
        Ok(owner)
    }

    async fn get_owner(&self, id: OwnerId) -> Result<BusinessOwner, PortError> {
        let row = sqlx::query_as::<_, OwnerRow>(
            "SELECT id, company_name FROM business_owners WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from)?
        .ok_or_else(|| DatabaseError::not_found("BusinessOwner", id))?;
        Ok(row.into())
    }

    async fn list_owners(&self) -> Result<Vec<BusinessOwner>, PortError> {
        let rows = sqlx::query_as::<_, OwnerRow>(
            "SELECT id, company_name FROM business_owners ORDER BY company_name",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from)?;
        Ok(rows.into_iter().map(BusinessOwner::from).collect())
    }

    async fn delete_owner(&self, id: OwnerId) -> Result<(), PortError> {
        let result = sqlx::query("DELETE FROM business_owners WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(DatabaseError::from)?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::not_found("BusinessOwner", id).into());
        }
        Ok(())
    }

    async fn create_customer(&self, customer: Customer) -> Result<Customer, PortError> {
        sqlx::query("INSERT INTO customers (id, name, email) VALUES ($1, $2, $3)")
            .bind(customer.id.as_uuid())
            .bind(&customer.name)
            .bind(&customer.email)
            .execute(&self.pool)
            .await
            .map_err(DatabaseError::from)?;
        Ok(customer)
    }

    async fn get_customer(&self, id: CustomerId) -> Result<Customer, PortError> {
        let row =
            sqlx::query_as::<_, CustomerRow>("SELECT id, name, email FROM customers WHERE id = $1")
                .bind(id.as_uuid())
                .fetch_optional(&self.pool)
                .await
                .map_err(DatabaseError::from)?
                .ok_or_else(|| DatabaseError::not_found("Customer", id))?;
        Ok(row.into())
    }

    async fn list_customers(&self) -> Result<Vec<Customer>, PortError> {
        let rows = sqlx::query_as::<_, CustomerRow>(
            "SELECT id, name, email FROM customers ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from)?;
        Ok(rows.into_iter().map(Customer::from).collect())
    }

    async fn delete_customer(&self, id: CustomerId) -> Result<(), PortError> {
        let result = sqlx::query("DELETE FROM customers WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(DatabaseError::from)?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::not_found("Customer", id).into());
        }
        Ok(())
    }
}
