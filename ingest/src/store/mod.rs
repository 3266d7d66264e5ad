//! Persistence boundary of the pipeline.

mod base;
pub mod memory;
pub mod postgres;

pub use base::{RecordStore, TableWriteCount, key_text};
