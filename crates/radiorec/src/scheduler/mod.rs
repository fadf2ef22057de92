pub mod config;
pub mod dispatcher;
pub mod error;
pub mod job;
pub mod job_scheduler;
pub mod running;
pub mod store;
pub mod timer;
pub mod wakeup;

pub use config::SchedulerConfig;
pub use dispatcher::RecordingDispatcher;
pub use error::{SchedulerError, TimerError};
pub use job::ScheduleJob;
pub use job_scheduler::{JobScheduler, ReconcileReport, Registration};
pub use running::{RunningGuard, RunningRecordings};
pub use store::{ScheduleStore, SqliteScheduleStore};
pub use timer::{LocalTimerService, TimerService, TriggerHandler, TriggerPayload};
pub use wakeup::ScheduleWakeup;
