//! Repository implementations of the billing persistence ports

pub mod billing;
pub mod party;

pub use billing::PostgresBillingStore;
pub use party::PostgresPartyStore;
