//! Tracing setup shared by the consumer binary and the test suites.

pub mod tracing;
