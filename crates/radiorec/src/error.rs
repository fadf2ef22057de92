use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RadioRecError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Transcode error: {0}")]
    Transcode(#[from] TranscodeError),

    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("Scheduler error: {0}")]
    Scheduler(#[from] crate::scheduler::SchedulerError),

    #[error("Telemetry error: {0}")]
    Telemetry(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },

    #[error("Invalid timezone offset '{value}': expected +HH:MM or -HH:MM")]
    InvalidTimezone { value: String },
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Invalid save directory '{path}': {reason}")]
    InvalidSaveDirectory { path: PathBuf, reason: String },

    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to move file from '{from}' to '{to}': {source}")]
    MoveFile {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Temporary file is missing: {0}")]
    MissingTempFile(PathBuf),

    #[error("No free file name available near: {0}")]
    FileExists(PathBuf),
}

impl StorageError {
    /// True for errors caused by a bad save root rather than a failed file operation.
    pub fn is_configuration(&self) -> bool {
        matches!(self, StorageError::InvalidSaveDirectory { .. })
    }
}

/// Failure of a single external process invocation.
#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("Failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed waiting for '{program}': {source}")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Process timed out after {0} seconds")]
    TimedOut(u64),

    #[error("Process was cancelled")]
    Cancelled,
}

#[derive(Error, Debug)]
pub enum TranscodeError {
    #[error("Precondition failed: {0}")]
    Precondition(String),

    #[error("{pass} pass exited with failure")]
    PassFailed { pass: &'static str },

    #[error("{pass} pass could not run: {source}")]
    Process {
        pass: &'static str,
        #[source]
        source: ProcessError,
    },

    #[error("Chunk was not produced: {0}")]
    MissingChunk(PathBuf),

    #[error("Failed to prepare chunk workspace '{path}': {source}")]
    Workspace {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Transcode was cancelled")]
    Cancelled,
}

impl TranscodeError {
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            TranscodeError::Cancelled
                | TranscodeError::Process {
                    source: ProcessError::Cancelled,
                    ..
                }
        )
    }
}

/// Domain rejections raised by a streaming service while preparing a recording.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    #[error("Program not found: {0}")]
    ProgramNotFound(String),

    #[error("Program is not available in this region: {0}")]
    RegionRestricted(String),

    #[error("Authentication with the streaming service failed: {0}")]
    Authentication(String),

    #[error("Streaming service unavailable: {0}")]
    Unavailable(String),
}

pub type Result<T> = std::result::Result<T, RadioRecError>;
