//! Inbound transports producing the record stream the pipeline batches.

mod channel;
mod ndjson;

pub use channel::channel_source;
pub use ndjson::{NdjsonReader, ndjson_records, open_reader};
