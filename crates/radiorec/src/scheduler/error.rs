use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::db::DatabaseError;

/// Failure reported by a [`TimerService`](super::TimerService).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TimerError {
    #[error("Trigger '{0}' is already scheduled")]
    AlreadyScheduled(String),

    #[error("Trigger '{key}' was rejected: {reason}")]
    Rejected { key: String, reason: String },

    #[error("Timer service is shut down")]
    Closed,
}

#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("Schedule job {job_id} ended at {ends_at} and can no longer be recorded")]
    Expired {
        job_id: String,
        ends_at: DateTime<Utc>,
    },

    #[error("Schedule job {job_id} has a margin of {margin_secs}s that is out of range")]
    InvalidMargin { job_id: String, margin_secs: u64 },

    #[error("Failed to register trigger '{key}': {source}")]
    Timer {
        key: String,
        #[source]
        source: TimerError,
    },

    #[error("Schedule store error: {0}")]
    Store(#[from] DatabaseError),
}
