//! Processors run on a record while it is being constructed, before it enters the pipeline.

mod chain;
mod registry;

pub use chain::{PriorityProcessorChain, ProcessorEntry, ProcessorLayer};
pub use registry::{ProcessorFn, ProcessorRegistry, RegisteredProcessor};

use crate::error::IngestResult;
use crate::types::Record;

/// A processor mutating a record in place.
pub trait Processor: Send + Sync {
    fn process(&self, record: &mut Record) -> IngestResult<()>;
}
