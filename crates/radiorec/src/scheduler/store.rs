use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use crate::db::schedule_repo::{self, ScheduleJobRow};
use crate::db::{format_timestamp, parse_column, parse_timestamp, Database, DatabaseError};

use super::job::ScheduleJob;

/// Durable storage for [`ScheduleJob`]s.
///
/// At most one enabled job may exist per occurrence; violating inserts and
/// re-enables fail with [`DatabaseError::Duplicate`].
#[async_trait]
pub trait ScheduleStore: Send + Sync {
    async fn insert(&self, job: &ScheduleJob) -> Result<(), DatabaseError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<ScheduleJob>, DatabaseError>;

    /// Enabled jobs, earliest start first.
    async fn list_enabled(&self) -> Result<Vec<ScheduleJob>, DatabaseError>;

    /// Returns `false` if the job does not exist.
    async fn set_enabled(&self, id: &str, enabled: bool) -> Result<bool, DatabaseError>;

    /// Returns `false` if the job does not exist.
    async fn delete(&self, id: &str) -> Result<bool, DatabaseError>;

    async fn increment_retry_count(&self, id: &str) -> Result<u32, DatabaseError>;
}

#[derive(Clone)]
pub struct SqliteScheduleStore {
    db: Database,
}

impl SqliteScheduleStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

fn saturating_seconds(duration: Duration) -> i64 {
    i64::try_from(duration.as_secs()).unwrap_or(i64::MAX)
}

fn to_row(job: &ScheduleJob) -> ScheduleJobRow {
    let now = format_timestamp(&Utc::now());
    ScheduleJobRow {
        id: job.id.clone(),
        keyword_reserve_id: job.keyword_reserve_id.clone(),
        service_kind: job.service_kind.to_string(),
        station_id: job.station_id.clone(),
        area_id: job.area_id.clone(),
        program_id: job.program_id.clone(),
        title: job.title.clone(),
        start_date_time: format_timestamp(&job.start),
        end_date_time: format_timestamp(&job.end),
        start_delay_seconds: job.start_delay.map(saturating_seconds),
        end_delay_seconds: job.end_delay.map(saturating_seconds),
        recording_type: job.recording_type.to_string(),
        reserve_type: job.reserve_type.to_string(),
        is_enabled: job.is_enabled,
        retry_count: job.retry_count,
        created_at: now.clone(),
        updated_at: now,
    }
}

fn seconds(column: &'static str, value: Option<i64>) -> Result<Option<Duration>, DatabaseError> {
    value
        .map(|secs| {
            u64::try_from(secs)
                .map(Duration::from_secs)
                .map_err(|_| DatabaseError::Corrupt {
                    column,
                    value: secs.to_string(),
                })
        })
        .transpose()
}

fn from_row(row: ScheduleJobRow) -> Result<ScheduleJob, DatabaseError> {
    Ok(ScheduleJob {
        service_kind: parse_column("service_kind", &row.service_kind)?,
        start: parse_timestamp("start_date_time", &row.start_date_time)?,
        end: parse_timestamp("end_date_time", &row.end_date_time)?,
        start_delay: seconds("start_delay_seconds", row.start_delay_seconds)?,
        end_delay: seconds("end_delay_seconds", row.end_delay_seconds)?,
        recording_type: parse_column("recording_type", &row.recording_type)?,
        reserve_type: parse_column("reserve_type", &row.reserve_type)?,
        id: row.id,
        keyword_reserve_id: row.keyword_reserve_id,
        station_id: row.station_id,
        area_id: row.area_id,
        program_id: row.program_id,
        title: row.title,
        is_enabled: row.is_enabled,
        retry_count: row.retry_count,
    })
}

#[async_trait]
impl ScheduleStore for SqliteScheduleStore {
    async fn insert(&self, job: &ScheduleJob) -> Result<(), DatabaseError> {
        let row = to_row(job);
        self.db
            .run_blocking(move |db| schedule_repo::insert(db, &row))
            .await?;
        log::debug!("Stored schedule job {} for program {}", job.id, job.program_id);
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<ScheduleJob>, DatabaseError> {
        let id = id.to_string();
        let row = self
            .db
            .run_blocking(move |db| schedule_repo::find_by_id(db, &id))
            .await?;
        row.map(from_row).transpose()
    }

    async fn list_enabled(&self) -> Result<Vec<ScheduleJob>, DatabaseError> {
        let rows = self.db.run_blocking(schedule_repo::list_enabled).await?;
        rows.into_iter().map(from_row).collect()
    }

    async fn set_enabled(&self, id: &str, enabled: bool) -> Result<bool, DatabaseError> {
        let id = id.to_string();
        let now = format_timestamp(&Utc::now());
        self.db
            .run_blocking(move |db| schedule_repo::set_enabled(db, &id, enabled, &now))
            .await
    }

    async fn delete(&self, id: &str) -> Result<bool, DatabaseError> {
        let id = id.to_string();
        self.db
            .run_blocking(move |db| schedule_repo::delete(db, &id))
            .await
    }

    async fn increment_retry_count(&self, id: &str) -> Result<u32, DatabaseError> {
        let id = id.to_string();
        let now = format_timestamp(&Utc::now());
        self.db
            .run_blocking(move |db| schedule_repo::increment_retry_count(db, &id, &now))
            .await
    }
}
