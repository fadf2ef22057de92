//! Streaming sources, one per service, resolved by [`ServiceKind`].

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::SourceError;
use crate::recording::{ProgramInfo, RecordingCommand, RecordingOptions, ServiceKind};

/// Everything the pipeline needs once a service has accepted a command.
#[derive(Debug, Clone)]
pub struct SourceResult {
    pub stream_url: String,
    /// HTTP headers the stream requires (auth tokens and the like).
    pub headers: Vec<(String, String)>,
    pub program_info: ProgramInfo,
    pub options: RecordingOptions,
}

#[async_trait]
pub trait RecordingSource: Send + Sync {
    fn service_kind(&self) -> ServiceKind;

    /// Resolves program metadata and a playable stream for `command`.
    async fn prepare(&self, command: &RecordingCommand) -> Result<SourceResult, SourceError>;
}

#[derive(Default, Clone)]
pub struct SourceRegistry {
    sources: HashMap<ServiceKind, Arc<dyn RecordingSource>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `source` under its service kind, returning any source it replaced.
    pub fn register(&mut self, source: Arc<dyn RecordingSource>) -> Option<Arc<dyn RecordingSource>> {
        self.sources.insert(source.service_kind(), source)
    }

    pub fn with_source(mut self, source: Arc<dyn RecordingSource>) -> Self {
        self.register(source);
        self
    }

    pub fn get(&self, kind: ServiceKind) -> Option<Arc<dyn RecordingSource>> {
        self.sources.get(&kind).cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}
