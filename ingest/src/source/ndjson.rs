use std::sync::Arc;

use config::shared::SourceConfig;
use futures::Stream;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tracing::{error, info, warn};

use crate::error::IngestResult;
use crate::processor::PriorityProcessorChain;
use crate::types::Record;

pub type NdjsonReader = Box<dyn AsyncBufRead + Send + Unpin>;

/// Opens the reader described by `config`.
pub async fn open_reader(config: &SourceConfig) -> IngestResult<NdjsonReader> {
    match config {
        SourceConfig::Stdin => {
            info!("reading records from stdin");
            Ok(Box::new(BufReader::new(tokio::io::stdin())))
        }
        SourceConfig::File { path } => {
            info!(path = %path.display(), "reading records from file");
            let file = tokio::fs::File::open(path).await?;
            Ok(Box::new(BufReader::new(file)))
        }
    }
}

struct NdjsonState<R> {
    lines: Lines<R>,
    chain: Arc<PriorityProcessorChain>,
    line_number: u64,
}

/// Streams the records of a newline-delimited JSON document.
///
/// Each non-blank line is parsed and run through `chain`. Lines that fail to parse or construct
/// are logged and skipped. The stream ends at end of input or on the first read error.
pub fn ndjson_records<R>(
    reader: R,
    chain: Arc<PriorityProcessorChain>,
) -> impl Stream<Item = Record> + Send
where
    R: AsyncBufRead + Send + Unpin + 'static,
{
    let state = NdjsonState {
        lines: reader.lines(),
        chain,
        line_number: 0,
    };

    futures::stream::unfold(state, |mut state| async move {
        loop {
            let line = match state.lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => return None,
                Err(err) => {
                    error!(error = %err, line = state.line_number + 1, "failed to read record source");
                    return None;
                }
            };
            state.line_number += 1;

            if line.trim().is_empty() {
                continue;
            }

            match state.chain.construct_from_json(&line) {
                Ok(record) => return Some((record, state)),
                Err(err) => {
                    warn!(
                        line = state.line_number,
                        record_type = state.chain.record_type(),
                        error = %err,
                        "skipping record that could not be constructed"
                    );
                }
            }
        }
    })
}
