//! Helpers shared by unit and integration tests.

pub mod mapper;
pub mod record;
pub mod stage;
