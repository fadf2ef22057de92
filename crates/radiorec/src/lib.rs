pub mod config;
pub mod db;
pub mod error;
pub mod notify;
pub mod pipeline;
pub mod recording;
pub mod sanitize;
pub mod scheduler;
pub mod source;
pub mod storage;
pub mod telemetry;
pub mod transcode;

pub use config::{load_config, Config, PathTemplateEngine};
pub use db::{Database, DatabaseError};
pub use error::{
    ConfigError, ProcessError, RadioRecError, Result, SourceError, StorageError, TranscodeError,
};
pub use notify::{LogNotifier, Notification, NotificationLevel, Notifier};
pub use pipeline::{PipelineError, RecordingOrchestrator, RecordingResult};
pub use recording::{
    ProgramInfo, Recording, RecordingCommand, RecordingRepository, RecordingState,
    SqliteRecordingRepository,
};
pub use scheduler::{
    JobScheduler, LocalTimerService, RecordingDispatcher, ScheduleJob, ScheduleStore,
    ScheduleWakeup, SchedulerError, SqliteScheduleStore, TimerService,
};
pub use source::{RecordingSource, SourceRegistry, SourceResult};
pub use storage::{MediaPath, MediaStorage};
pub use transcode::{FfmpegRunner, ProcessRunner, Transcoder};
