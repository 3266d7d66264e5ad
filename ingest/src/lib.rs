//! Batch-windowed record ingestion.
//!
//! Records arrive on an unbounded stream, are grouped into bounded batches by
//! [`concurrency::stream::take`], transformed by an ordered list of [`stages::Stage`]s,
//! filtered against already persisted keys and finally written to several tables inside a
//! single transaction.
//!
//! The moving parts are:
//! - [`types::Record`], the unit of data flowing through the pipeline.
//! - [`stages`], per-record and whole-batch transforms, including parallel groups,
//!   deduplication and the transactional writer.
//! - [`processor::PriorityProcessorChain`], run on each record as it is built.
//! - [`store::RecordStore`], the persistence boundary with memory and Postgres backends.
//! - [`pipeline::Pipeline`], which drives one batch at a time until the source closes.

pub mod concurrency;
pub mod error;
pub mod failpoints;
mod macros;
pub mod mapping;
pub mod migrations;
pub mod pipeline;
pub mod processor;
pub mod source;
pub mod stages;
pub mod store;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod types;
