use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::recording::model::{shift_back, shift_forward};
use crate::recording::{
    ProgramInfo, RecordingCommand, RecordingType, ReserveType, ServiceKind, SourceType,
};

use super::config::SchedulerConfig;
use super::error::SchedulerError;

/// Time-free delivery becomes available a few minutes after the airing ends.
pub const TIME_FREE_READY_DELAY: Duration = Duration::from_secs(180);

/// A durable request to record one occurrence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleJob {
    pub id: String,
    pub keyword_reserve_id: Option<String>,
    pub service_kind: ServiceKind,
    pub station_id: String,
    pub area_id: String,
    pub program_id: String,
    pub title: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Overrides the global start margin when set.
    pub start_delay: Option<Duration>,
    /// Overrides the global end margin when set.
    pub end_delay: Option<Duration>,
    pub recording_type: RecordingType,
    pub reserve_type: ReserveType,
    pub is_enabled: bool,
    pub retry_count: u32,
}

impl ScheduleJob {
    /// An enabled program reservation for `program` with a fresh id.
    pub fn for_program(program: &ProgramInfo, recording_type: RecordingType) -> Self {
        Self {
            id: uuid::Uuid::now_v7().to_string(),
            keyword_reserve_id: None,
            service_kind: program.service_kind,
            station_id: program.station_id.clone(),
            area_id: program.area_id.clone(),
            program_id: program.program_id.clone(),
            title: program.title.clone(),
            start: program.start,
            end: program.end,
            start_delay: None,
            end_delay: None,
            recording_type,
            reserve_type: ReserveType::Program,
            is_enabled: true,
            retry_count: 0,
        }
    }

    /// Timer key; stable for the lifetime of the job.
    pub fn trigger_key(&self) -> String {
        trigger_key(&self.id)
    }

    pub fn start_margin(&self, config: &SchedulerConfig) -> Duration {
        self.start_delay.unwrap_or(config.start_margin)
    }

    pub fn end_margin(&self, config: &SchedulerConfig) -> Duration {
        self.end_delay.unwrap_or(config.end_margin)
    }

    /// End of the capture window including the end margin.
    pub fn capture_end(&self, config: &SchedulerConfig) -> Result<DateTime<Utc>, SchedulerError> {
        let margin = self.end_margin(config);
        shift_forward(self.end, margin).ok_or_else(|| self.invalid_margin(margin))
    }

    /// When the trigger should fire.
    ///
    /// Live jobs fire at the start minus the start margin. Time-free jobs fire
    /// once the program is downloadable, or immediately if that is already past.
    pub fn fire_at(
        &self,
        config: &SchedulerConfig,
        now: DateTime<Utc>,
    ) -> Result<DateTime<Utc>, SchedulerError> {
        match self.recording_type {
            RecordingType::RealTime => {
                let margin = self.start_margin(config);
                shift_back(self.start, margin).ok_or_else(|| self.invalid_margin(margin))
            }
            RecordingType::TimeFree => {
                let ready = shift_forward(self.end, TIME_FREE_READY_DELAY)
                    .ok_or_else(|| self.invalid_margin(TIME_FREE_READY_DELAY))?;
                Ok(ready.max(now))
            }
        }
    }

    /// A live job whose capture window has closed can no longer be recorded.
    pub fn is_expired(
        &self,
        config: &SchedulerConfig,
        now: DateTime<Utc>,
    ) -> Result<bool, SchedulerError> {
        if self.recording_type != RecordingType::RealTime {
            return Ok(false);
        }
        Ok(self.capture_end(config)? <= now)
    }

    fn invalid_margin(&self, margin: Duration) -> SchedulerError {
        SchedulerError::InvalidMargin {
            job_id: self.id.clone(),
            margin_secs: margin.as_secs(),
        }
    }

    pub fn to_command(&self, config: &SchedulerConfig) -> RecordingCommand {
        RecordingCommand {
            service_kind: self.service_kind,
            program_id: self.program_id.clone(),
            station_id: self.station_id.clone(),
            area_id: self.area_id.clone(),
            start: self.start,
            end: self.end,
            recording_type: self.recording_type,
            start_delay: self.start_margin(config),
            end_delay: self.end_margin(config),
            source_type: SourceType::Scheduled,
        }
    }
}

pub fn trigger_key(job_id: &str) -> String {
    format!("recording-{}", job_id)
}
