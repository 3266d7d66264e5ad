//! Postgres access helpers for the ingest workspace.
//!
//! Everything here is thin sqlx plumbing over dynamically named tables. Transaction
//! boundaries are owned by the caller.

pub mod pool;
pub mod records;
#[cfg(feature = "test-utils")]
pub mod test_utils;

mod identifier;

pub use identifier::quote_qualified_identifier;
