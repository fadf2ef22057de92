use async_trait::async_trait;
use chrono::Utc;

use crate::db::recording_repo::{self, RecordingRow};
use crate::db::{format_timestamp, parse_column, parse_timestamp, Database, DatabaseError};
use crate::storage::MediaPath;

use super::model::{
    new_recording_id, ProgramInfo, Recording, RecordingFile, RecordingMetadata, RecordingOptions,
    RecordingState,
};

/// Persists [`Recording`] aggregates and their state transitions.
#[async_trait]
pub trait RecordingRepository: Send + Sync {
    /// Creates a `Pending` recording with its metadata and file record.
    async fn create(
        &self,
        program: &ProgramInfo,
        path: &MediaPath,
        options: &RecordingOptions,
    ) -> Result<String, DatabaseError>;

    async fn update_state(
        &self,
        id: &str,
        state: RecordingState,
        error_message: Option<&str>,
    ) -> Result<(), DatabaseError>;

    async fn update_file_path(&self, id: &str, path: &MediaPath) -> Result<(), DatabaseError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<Recording>, DatabaseError>;

    async fn list_by_state(&self, state: RecordingState) -> Result<Vec<Recording>, DatabaseError>;
}

/// [`RecordingRepository`] on the shared SQLite database.
#[derive(Clone)]
pub struct SqliteRecordingRepository {
    db: Database,
}

impl SqliteRecordingRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

fn to_row(id: &str, program: &ProgramInfo, path: &MediaPath, options: &RecordingOptions) -> RecordingRow {
    let now = format_timestamp(&Utc::now());
    RecordingRow {
        id: id.to_string(),
        service_kind: program.service_kind.to_string(),
        program_id: program.program_id.clone(),
        station_id: program.station_id.clone(),
        area_id: program.area_id.clone(),
        start_date_time: format_timestamp(&program.start),
        end_date_time: format_timestamp(&program.end),
        is_time_free: options.is_time_free,
        state: RecordingState::Pending.to_string(),
        error_message: None,
        source_type: options.source_type.to_string(),
        is_listened: false,
        created_at: now.clone(),
        updated_at: now,
        station_name: program.station_name.clone(),
        title: program.title.clone(),
        subtitle: program.subtitle.clone(),
        performer: program.performer.clone(),
        description: program.description.clone(),
        program_url: program.program_url.clone(),
        file_relative_path: path.relative_path_string(),
        has_hls_file: false,
        hls_directory_path: None,
    }
}

fn from_row(row: RecordingRow) -> Result<Recording, DatabaseError> {
    Ok(Recording {
        service_kind: parse_column("service_kind", &row.service_kind)?,
        start: parse_timestamp("start_date_time", &row.start_date_time)?,
        end: parse_timestamp("end_date_time", &row.end_date_time)?,
        state: parse_column("state", &row.state)?,
        created_at: parse_timestamp("created_at", &row.created_at)?,
        updated_at: parse_timestamp("updated_at", &row.updated_at)?,
        source_type: parse_column("source_type", &row.source_type)?,
        id: row.id,
        program_id: row.program_id,
        station_id: row.station_id,
        area_id: row.area_id,
        is_time_free: row.is_time_free,
        error_message: row.error_message,
        is_listened: row.is_listened,
        metadata: RecordingMetadata {
            station_name: row.station_name,
            title: row.title,
            subtitle: row.subtitle,
            performer: row.performer,
            description: row.description,
            program_url: row.program_url,
        },
        file: RecordingFile {
            file_relative_path: row.file_relative_path,
            has_hls_file: row.has_hls_file,
            hls_directory_path: row.hls_directory_path,
        },
    })
}

#[async_trait]
impl RecordingRepository for SqliteRecordingRepository {
    async fn create(
        &self,
        program: &ProgramInfo,
        path: &MediaPath,
        options: &RecordingOptions,
    ) -> Result<String, DatabaseError> {
        let id = new_recording_id();
        let row = to_row(&id, program, path, options);
        self.db
            .run_blocking(move |db| recording_repo::insert(db, &row))
            .await?;
        log::debug!("Created recording {} for program {}", id, program.program_id);
        Ok(id)
    }

    async fn update_state(
        &self,
        id: &str,
        state: RecordingState,
        error_message: Option<&str>,
    ) -> Result<(), DatabaseError> {
        let id = id.to_string();
        let error_message = error_message.map(str::to_string);
        let now = format_timestamp(&Utc::now());
        self.db
            .run_blocking(move |db| {
                recording_repo::update_state(db, &id, state.as_str(), error_message.as_deref(), &now)
            })
            .await
    }

    async fn update_file_path(&self, id: &str, path: &MediaPath) -> Result<(), DatabaseError> {
        let id = id.to_string();
        let relative = path.relative_path_string();
        let now = format_timestamp(&Utc::now());
        self.db
            .run_blocking(move |db| recording_repo::update_file_path(db, &id, &relative, &now))
            .await
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Recording>, DatabaseError> {
        let id = id.to_string();
        let row = self
            .db
            .run_blocking(move |db| recording_repo::find_by_id(db, &id))
            .await?;
        row.map(from_row).transpose()
    }

    async fn list_by_state(&self, state: RecordingState) -> Result<Vec<Recording>, DatabaseError> {
        let rows = self
            .db
            .run_blocking(move |db| recording_repo::list_by_state(db, state.as_str()))
            .await?;
        rows.into_iter().map(from_row).collect()
    }
}
