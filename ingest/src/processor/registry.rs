use std::collections::HashMap;
use std::sync::Arc;

use config::shared::BuiltinStage;

use crate::error::IngestResult;
use crate::processor::Processor;
use crate::stages::normalize::builtin_function;
use crate::types::Record;

pub type ProcessorFn = fn(&mut Record) -> IngestResult<()>;

/// What a name in the [`ProcessorRegistry`] stands for.
#[derive(Clone)]
pub enum RegisteredProcessor {
    /// Builds a fresh processor for every record.
    Type(fn() -> Box<dyn Processor>),
    Instance(Arc<dyn Processor>),
    Function(ProcessorFn),
    /// A registered name that is neither a processor nor a function, such as a placeholder
    /// reserved by configuration. Resolving it is a configuration error.
    Opaque(String),
}

/// Processors that configuration can refer to by name.
#[derive(Clone, Default)]
pub struct ProcessorRegistry {
    entries: HashMap<String, RegisteredProcessor>,
}

impl ProcessorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the field normalizers under their stage names.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for stage in [
            BuiltinStage::StripTitle,
            BuiltinStage::NormalizeAuthor,
            BuiltinStage::ClampViewCount,
            BuiltinStage::NormalizeDate,
        ] {
            registry.register(
                stage.as_str(),
                RegisteredProcessor::Function(builtin_function(stage)),
            );
        }

        registry
    }

    pub fn register(&mut self, name: impl Into<String>, processor: RegisteredProcessor) {
        self.entries.insert(name.into(), processor);
    }

    pub fn get(&self, name: &str) -> Option<&RegisteredProcessor> {
        self.entries.get(name)
    }
}
