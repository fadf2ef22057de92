//! Recording repository: rows of `recordings` joined with their metadata
//! and file records.

use rusqlite::{params, Row};

use super::{Database, DatabaseError};

const SELECT_RECORDING: &str = "SELECT r.*, m.station_name, m.title, m.subtitle, m.performer,
        m.description, m.program_url, f.file_relative_path, f.has_hls_file, f.hls_directory_path
     FROM recordings r
     JOIN recording_metadata m ON m.recording_id = r.id
     JOIN recording_files f ON f.recording_id = r.id";

/// A recording with its metadata and file record, as stored.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingRow {
    pub id: String,
    pub service_kind: String,
    pub program_id: String,
    pub station_id: String,
    pub area_id: String,
    pub start_date_time: String,
    pub end_date_time: String,
    pub is_time_free: bool,
    pub state: String,
    pub error_message: Option<String>,
    pub source_type: String,
    pub is_listened: bool,
    pub created_at: String,
    pub updated_at: String,
    pub station_name: String,
    pub title: String,
    pub subtitle: String,
    pub performer: String,
    pub description: String,
    pub program_url: String,
    pub file_relative_path: String,
    pub has_hls_file: bool,
    pub hls_directory_path: Option<String>,
}

impl RecordingRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            service_kind: row.get("service_kind")?,
            program_id: row.get("program_id")?,
            station_id: row.get("station_id")?,
            area_id: row.get("area_id")?,
            start_date_time: row.get("start_date_time")?,
            end_date_time: row.get("end_date_time")?,
            is_time_free: row.get("is_time_free")?,
            state: row.get("state")?,
            error_message: row.get("error_message")?,
            source_type: row.get("source_type")?,
            is_listened: row.get("is_listened")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
            station_name: row.get("station_name")?,
            title: row.get("title")?,
            subtitle: row.get("subtitle")?,
            performer: row.get("performer")?,
            description: row.get("description")?,
            program_url: row.get("program_url")?,
            file_relative_path: row.get("file_relative_path")?,
            has_hls_file: row.get("has_hls_file")?,
            hls_directory_path: row.get("hls_directory_path")?,
        })
    }
}

/// Inserts the recording, its metadata and its file record in one transaction.
pub fn insert(db: &Database, rec: &RecordingRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        let tx = conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO recordings (id, service_kind, program_id, station_id, area_id,
             start_date_time, end_date_time, is_time_free, state, error_message, source_type,
             is_listened, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                rec.id,
                rec.service_kind,
                rec.program_id,
                rec.station_id,
                rec.area_id,
                rec.start_date_time,
                rec.end_date_time,
                rec.is_time_free,
                rec.state,
                rec.error_message,
                rec.source_type,
                rec.is_listened,
                rec.created_at,
                rec.updated_at,
            ],
        )
        .map_err(|e| DatabaseError::from_insert("recording", e))?;
        tx.execute(
            "INSERT INTO recording_metadata (recording_id, station_name, title, subtitle,
             performer, description, program_url)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                rec.id,
                rec.station_name,
                rec.title,
                rec.subtitle,
                rec.performer,
                rec.description,
                rec.program_url,
            ],
        )?;
        tx.execute(
            "INSERT INTO recording_files (recording_id, file_relative_path, has_hls_file,
             hls_directory_path)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                rec.id,
                rec.file_relative_path,
                rec.has_hls_file,
                rec.hls_directory_path,
            ],
        )?;
        tx.commit()?;
        Ok(())
    })
}

/// Sets the state and error message of a recording.
pub fn update_state(
    db: &Database,
    id: &str,
    state: &str,
    error_message: Option<&str>,
    updated_at: &str,
) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE recordings SET state = ?2, error_message = ?3, updated_at = ?4 WHERE id = ?1",
            params![id, state, error_message, updated_at],
        )?;
        if changed == 0 {
            return Err(DatabaseError::NotFound {
                entity: "recording",
                id: id.to_string(),
            });
        }
        Ok(())
    })
}

/// Points the file record at a new relative path.
pub fn update_file_path(
    db: &Database,
    id: &str,
    file_relative_path: &str,
    updated_at: &str,
) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        let tx = conn.unchecked_transaction()?;
        let changed = tx.execute(
            "UPDATE recording_files SET file_relative_path = ?2 WHERE recording_id = ?1",
            params![id, file_relative_path],
        )?;
        if changed == 0 {
            return Err(DatabaseError::NotFound {
                entity: "recording",
                id: id.to_string(),
            });
        }
        tx.execute(
            "UPDATE recordings SET updated_at = ?2 WHERE id = ?1",
            params![id, updated_at],
        )?;
        tx.commit()?;
        Ok(())
    })
}

pub fn find_by_id(db: &Database, id: &str) -> Result<Option<RecordingRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(&format!("{} WHERE r.id = ?1", SELECT_RECORDING))?;
        let mut rows = stmt.query_map(params![id], RecordingRow::from_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

/// Lists recordings in `state`, oldest program first.
pub fn list_by_state(db: &Database, state: &str) -> Result<Vec<RecordingRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(&format!(
            "{} WHERE r.state = ?1 ORDER BY r.start_date_time ASC, r.id ASC",
            SELECT_RECORDING
        ))?;
        let rows = stmt
            .query_map(params![state], RecordingRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}
