//! Test Utilities Crate
//!
//! Provides shared test infrastructure for the invoicing test suite.
//!
//! # Modules
//!
//! - `fixtures`: Pre-built test data for common entities
//! - `builders`: Builder patterns for test data construction
//! - `memory`: In-memory implementations of the persistence ports
//! - `fakes`: Fake processor and recording event sink

pub mod builders;
pub mod fakes;
pub mod fixtures;
pub mod memory;

pub use builders::*;
pub use fakes::*;
pub use fixtures::*;
pub use memory::*;
