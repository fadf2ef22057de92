//! Builder patterns for creating test data programmatically.

#![allow(dead_code)]

use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};

use radiorec::recording::{
    RecordingCommand, RecordingType, ReserveType, ServiceKind, SourceType,
};
use radiorec::ScheduleJob;

/// Start of a program that aired in the past, suitable for time-free tests.
pub fn aired_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 5, 2, 0, 0).unwrap()
}

/// Builder for `RecordingCommand` instances.
pub struct CommandBuilder {
    service_kind: ServiceKind,
    program_id: String,
    station_id: String,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    recording_type: RecordingType,
}

impl CommandBuilder {
    /// A ten-minute time-free command for an aired program.
    pub fn new() -> Self {
        let start = aired_start();
        Self {
            service_kind: ServiceKind::Radiko,
            program_id: "TBS_20260105110000".to_string(),
            station_id: "TBS".to_string(),
            start,
            end: start + chrono::Duration::minutes(10),
            recording_type: RecordingType::TimeFree,
        }
    }

    pub fn service_kind(mut self, kind: ServiceKind) -> Self {
        self.service_kind = kind;
        self
    }

    pub fn program_id(mut self, id: &str) -> Self {
        self.program_id = id.to_string();
        self
    }

    pub fn station_id(mut self, id: &str) -> Self {
        self.station_id = id.to_string();
        self
    }

    pub fn window(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.start = start;
        self.end = end;
        self
    }

    pub fn live(mut self) -> Self {
        self.recording_type = RecordingType::RealTime;
        self
    }

    pub fn build(self) -> RecordingCommand {
        RecordingCommand {
            service_kind: self.service_kind,
            program_id: self.program_id,
            station_id: self.station_id,
            area_id: "JP13".to_string(),
            start: self.start,
            end: self.end,
            recording_type: self.recording_type,
            start_delay: Duration::ZERO,
            end_delay: Duration::ZERO,
            source_type: SourceType::Scheduled,
        }
    }
}

/// Builder for `ScheduleJob` instances.
pub struct ScheduleJobBuilder {
    job: ScheduleJob,
}

impl ScheduleJobBuilder {
    /// An enabled live job starting an hour from now.
    pub fn new(id: &str) -> Self {
        let start = Utc::now() + chrono::Duration::hours(1);
        Self {
            job: ScheduleJob {
                id: id.to_string(),
                keyword_reserve_id: None,
                service_kind: ServiceKind::Radiko,
                station_id: "TBS".to_string(),
                area_id: "JP13".to_string(),
                program_id: format!("program-{}", id),
                title: "Night Talk".to_string(),
                start,
                end: start + chrono::Duration::hours(1),
                start_delay: None,
                end_delay: None,
                recording_type: RecordingType::RealTime,
                reserve_type: ReserveType::Program,
                is_enabled: true,
                retry_count: 0,
            },
        }
    }

    pub fn program_id(mut self, id: &str) -> Self {
        self.job.program_id = id.to_string();
        self
    }

    pub fn window(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.job.start = start;
        self.job.end = end;
        self
    }

    pub fn start_delay(mut self, delay: Duration) -> Self {
        self.job.start_delay = Some(delay);
        self
    }

    pub fn time_free(mut self) -> Self {
        self.job.recording_type = RecordingType::TimeFree;
        self
    }

    /// Moves the airing into the past so a live job is expired.
    pub fn already_aired(mut self) -> Self {
        let start = Utc::now() - chrono::Duration::hours(3);
        self.job.start = start;
        self.job.end = start + chrono::Duration::hours(1);
        self
    }

    pub fn build(self) -> ScheduleJob {
        self.job
    }
}
