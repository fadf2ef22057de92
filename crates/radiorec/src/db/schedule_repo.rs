//! Schedule job repository: CRUD operations for the `schedule_jobs` table.

use rusqlite::{params, Row};

use super::{Database, DatabaseError};

/// A raw schedule job row.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleJobRow {
    pub id: String,
    pub keyword_reserve_id: Option<String>,
    pub service_kind: String,
    pub station_id: String,
    pub area_id: String,
    pub program_id: String,
    pub title: String,
    pub start_date_time: String,
    pub end_date_time: String,
    pub start_delay_seconds: Option<i64>,
    pub end_delay_seconds: Option<i64>,
    pub recording_type: String,
    pub reserve_type: String,
    pub is_enabled: bool,
    pub retry_count: u32,
    pub created_at: String,
    pub updated_at: String,
}

impl ScheduleJobRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            keyword_reserve_id: row.get("keyword_reserve_id")?,
            service_kind: row.get("service_kind")?,
            station_id: row.get("station_id")?,
            area_id: row.get("area_id")?,
            program_id: row.get("program_id")?,
            title: row.get("title")?,
            start_date_time: row.get("start_date_time")?,
            end_date_time: row.get("end_date_time")?,
            start_delay_seconds: row.get("start_delay_seconds")?,
            end_delay_seconds: row.get("end_delay_seconds")?,
            recording_type: row.get("recording_type")?,
            reserve_type: row.get("reserve_type")?,
            is_enabled: row.get("is_enabled")?,
            retry_count: row.get("retry_count")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

/// Inserts a job. A second enabled job for the same occurrence is rejected
/// with [`DatabaseError::Duplicate`].
pub fn insert(db: &Database, job: &ScheduleJobRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO schedule_jobs (id, keyword_reserve_id, service_kind, station_id, area_id,
             program_id, title, start_date_time, end_date_time, start_delay_seconds,
             end_delay_seconds, recording_type, reserve_type, is_enabled, retry_count,
             created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
            params![
                job.id,
                job.keyword_reserve_id,
                job.service_kind,
                job.station_id,
                job.area_id,
                job.program_id,
                job.title,
                job.start_date_time,
                job.end_date_time,
                job.start_delay_seconds,
                job.end_delay_seconds,
                job.recording_type,
                job.reserve_type,
                job.is_enabled,
                job.retry_count,
                job.created_at,
                job.updated_at,
            ],
        )
        .map_err(|e| DatabaseError::from_insert("schedule job", e))?;
        Ok(())
    })
}

pub fn find_by_id(db: &Database, id: &str) -> Result<Option<ScheduleJobRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM schedule_jobs WHERE id = ?1")?;
        let mut rows = stmt.query_map(params![id], ScheduleJobRow::from_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

/// Enabled jobs, earliest start first.
pub fn list_enabled(db: &Database) -> Result<Vec<ScheduleJobRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT * FROM schedule_jobs WHERE is_enabled = 1
             ORDER BY start_date_time ASC, id ASC",
        )?;
        let rows = stmt
            .query_map([], ScheduleJobRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Returns `false` if no job has this id. Re-enabling can collide with
/// another enabled job for the same occurrence.
pub fn set_enabled(
    db: &Database,
    id: &str,
    enabled: bool,
    updated_at: &str,
) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn
            .execute(
                "UPDATE schedule_jobs SET is_enabled = ?2, updated_at = ?3 WHERE id = ?1",
                params![id, enabled, updated_at],
            )
            .map_err(|e| DatabaseError::from_insert("schedule job", e))?;
        Ok(changed > 0)
    })
}

/// Returns `false` if no job has this id.
pub fn delete(db: &Database, id: &str) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute("DELETE FROM schedule_jobs WHERE id = ?1", params![id])?;
        Ok(changed > 0)
    })
}

/// Increments the retry counter and returns its new value.
pub fn increment_retry_count(
    db: &Database,
    id: &str,
    updated_at: &str,
) -> Result<u32, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE schedule_jobs SET retry_count = retry_count + 1, updated_at = ?2 WHERE id = ?1",
            params![id, updated_at],
        )?;
        if changed == 0 {
            return Err(DatabaseError::NotFound {
                entity: "schedule job",
                id: id.to_string(),
            });
        }
        let count = conn.query_row(
            "SELECT retry_count FROM schedule_jobs WHERE id = ?1",
            params![id],
            |r| r.get(0),
        )?;
        Ok(count)
    })
}
