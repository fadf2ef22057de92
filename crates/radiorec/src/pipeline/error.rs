use thiserror::Error;

use crate::db::DatabaseError;
use crate::error::{SourceError, StorageError, TranscodeError};
use crate::recording::ServiceKind;

/// Why a recording run did not produce a file.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("No recording source registered for {0}")]
    NoSource(ServiceKind),

    #[error("Source rejected the program: {0}")]
    SourceRejected(#[from] SourceError),

    #[error("Storage preparation failed: {0}")]
    Prepare(StorageError),

    #[error("Failed to create recording row: {0}")]
    Persistence(#[from] DatabaseError),

    #[error("Transcode failed: {0}")]
    Transcode(TranscodeError),

    #[error("Commit failed: {0}")]
    Commit(StorageError),

    #[error("Recording was cancelled")]
    Cancelled,
}

impl PipelineError {
    /// Bad save root or similar; retrying will not help until the config changes.
    pub fn is_configuration(&self) -> bool {
        matches!(self, PipelineError::Prepare(e) if e.is_configuration())
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, PipelineError::Cancelled)
    }
}
