use std::sync::{Arc, OnceLock};

use config::shared::ProcessorConfig;
use tracing::warn;

use crate::error::{ErrorKind, IngestError, IngestResult};
use crate::ingest_error;
use crate::processor::{Processor, ProcessorFn, ProcessorRegistry, RegisteredProcessor};
use crate::types::Record;

/// One element of a processor list.
#[derive(Clone)]
pub enum ProcessorEntry {
    /// Constructor called for every record, so no state is shared between records.
    Type(fn() -> Box<dyn Processor>),
    /// A single shared instance, which must therefore be stateless.
    Instance(Arc<dyn Processor>),
    Function(ProcessorFn),
    /// Looked up in the registry the first time a record is constructed.
    Named(String),
}

/// Processors contributed by one layer of a record type, with their priorities.
#[derive(Clone, Default)]
pub struct ProcessorLayer {
    entries: Vec<(i32, ProcessorEntry)>,
}

impl ProcessorLayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, priority: i32, entry: ProcessorEntry) -> Self {
        self.entries.push((priority, entry));
        self
    }

    /// A layer of named entries taken from configuration.
    pub fn from_config(processors: &[ProcessorConfig]) -> Self {
        processors.iter().fold(Self::new(), |layer, processor| {
            layer.with(
                processor.priority,
                ProcessorEntry::Named(processor.name.clone()),
            )
        })
    }
}

#[derive(Clone)]
enum ResolvedProcessor {
    Type(fn() -> Box<dyn Processor>),
    Instance(Arc<dyn Processor>),
    Function(ProcessorFn),
}

impl ResolvedProcessor {
    fn run(&self, record: &mut Record) -> IngestResult<()> {
        match self {
            ResolvedProcessor::Type(constructor) => constructor().process(record),
            ResolvedProcessor::Instance(processor) => processor.process(record),
            ResolvedProcessor::Function(function) => function(record),
        }
    }
}

/// The processors attached to a record type, sorted by ascending priority.
///
/// Layers are concatenated base first, and the sort is stable, so entries with equal priority
/// keep their collection order. Named entries are resolved once, on the first construction;
/// the outcome is cached, so a name that cannot be resolved fails every construction of this
/// type with the same error.
pub struct PriorityProcessorChain {
    record_type: String,
    entries: Vec<(i32, ProcessorEntry)>,
    registry: ProcessorRegistry,
    resolved: OnceLock<Result<Vec<ResolvedProcessor>, IngestError>>,
}

impl PriorityProcessorChain {
    pub fn from_layers(
        record_type: impl Into<String>,
        layers: Vec<ProcessorLayer>,
        registry: ProcessorRegistry,
    ) -> Self {
        let mut entries: Vec<(i32, ProcessorEntry)> =
            layers.into_iter().flat_map(|layer| layer.entries).collect();
        entries.sort_by_key(|(priority, _)| *priority);

        Self {
            record_type: record_type.into(),
            entries,
            registry,
            resolved: OnceLock::new(),
        }
    }

    /// A chain that runs nothing.
    pub fn empty(record_type: impl Into<String>) -> Self {
        Self::from_layers(record_type, vec![], ProcessorRegistry::new())
    }

    pub fn record_type(&self) -> &str {
        &self.record_type
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolves named entries ahead of the first construction, so that a bad configuration is
    /// reported at startup. The outcome is cached exactly as if a record had been constructed.
    pub fn ensure_resolved(&self) -> IngestResult<()> {
        self.processors().map(|_| ())
    }

    /// Runs every processor exactly once on `record` and returns it ready for the pipeline.
    pub fn construct(&self, mut record: Record) -> IngestResult<Record> {
        for processor in self.processors()? {
            processor.run(&mut record)?;
        }

        Ok(record)
    }

    /// Parses a JSON document and constructs the record.
    pub fn construct_from_json(&self, json: &str) -> IngestResult<Record> {
        let record: Record = serde_json::from_str(json)?;
        self.construct(record)
    }

    fn processors(&self) -> IngestResult<&[ResolvedProcessor]> {
        self.resolved
            .get_or_init(|| self.resolve())
            .as_deref()
            .map_err(Clone::clone)
    }

    fn resolve(&self) -> Result<Vec<ResolvedProcessor>, IngestError> {
        let resolved = self
            .entries
            .iter()
            .map(|(_, entry)| match entry {
                ProcessorEntry::Type(constructor) => Ok(ResolvedProcessor::Type(*constructor)),
                ProcessorEntry::Instance(processor) => {
                    Ok(ResolvedProcessor::Instance(processor.clone()))
                }
                ProcessorEntry::Function(function) => Ok(ResolvedProcessor::Function(*function)),
                ProcessorEntry::Named(name) => self.resolve_name(name),
            })
            .collect::<IngestResult<Vec<_>>>();

        if let Err(err) = &resolved {
            warn!(record_type = %self.record_type, error = %err, "processor chain cannot be resolved");
        }

        resolved
    }

    fn resolve_name(&self, name: &str) -> IngestResult<ResolvedProcessor> {
        match self.registry.get(name) {
            Some(RegisteredProcessor::Type(constructor)) => {
                Ok(ResolvedProcessor::Type(*constructor))
            }
            Some(RegisteredProcessor::Instance(processor)) => {
                Ok(ResolvedProcessor::Instance(processor.clone()))
            }
            Some(RegisteredProcessor::Function(function)) => {
                Ok(ResolvedProcessor::Function(*function))
            }
            Some(RegisteredProcessor::Opaque(kind)) => Err(ingest_error!(
                ErrorKind::ProcessorNotResolvable,
                "Processor entry is neither a processor nor a function",
                format!("{name} ({kind}) on record type {}", self.record_type)
            )),
            None => Err(ingest_error!(
                ErrorKind::ProcessorNotResolvable,
                "Processor name is not registered",
                format!("{name} on record type {}", self.record_type)
            )),
        }
    }
}
