//! Domain types shared by the recording pipeline and the scheduler.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Returned when a persisted enum column holds an unknown value.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown {kind} value: '{value}'")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

macro_rules! string_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ParseEnumError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(ParseEnumError {
                        kind: $kind,
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

/// Streaming service a program is acquired from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceKind {
    Radiko,
    Radiru,
}

string_enum!(ServiceKind, "service kind", {
    Radiko => "radiko",
    Radiru => "radiru",
});

impl ServiceKind {
    /// Only one service offers time-shifted (after the fact) delivery.
    pub fn supports_time_free(&self) -> bool {
        matches!(self, ServiceKind::Radiko)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordingState {
    Pending,
    Completed,
    Failed,
}

string_enum!(RecordingState, "recording state", {
    Pending => "pending",
    Completed => "completed",
    Failed => "failed",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Scheduled,
    Imported,
}

string_enum!(SourceType, "source type", {
    Scheduled => "scheduled",
    Imported => "imported",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordingType {
    RealTime,
    TimeFree,
}

string_enum!(RecordingType, "recording type", {
    RealTime => "real_time",
    TimeFree => "time_free",
});

/// How a schedule job came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReserveType {
    Program,
    Keyword,
}

string_enum!(ReserveType, "reserve type", {
    Program => "program",
    Keyword => "keyword",
});

/// Generates a new recording id. UUIDv7 ids sort by creation time.
pub fn new_recording_id() -> String {
    uuid::Uuid::now_v7().to_string()
}

/// Converts a margin to a chrono delta. `None` when it does not fit.
pub(crate) fn to_delta(duration: Duration) -> Option<TimeDelta> {
    TimeDelta::try_seconds(i64::try_from(duration.as_secs()).ok()?)
}

/// `instant - duration`, or `None` if the result is out of range.
pub(crate) fn shift_back(instant: DateTime<Utc>, duration: Duration) -> Option<DateTime<Utc>> {
    instant.checked_sub_signed(to_delta(duration)?)
}

/// `instant + duration`, or `None` if the result is out of range.
pub(crate) fn shift_forward(instant: DateTime<Utc>, duration: Duration) -> Option<DateTime<Utc>> {
    instant.checked_add_signed(to_delta(duration)?)
}

/// Program and station metadata resolved by a recording source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgramInfo {
    pub service_kind: ServiceKind,
    pub program_id: String,
    pub station_id: String,
    pub station_name: String,
    pub area_id: String,
    pub title: String,
    pub subtitle: String,
    pub performer: String,
    pub description: String,
    pub program_url: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// A request to record one occurrence of a program.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingCommand {
    pub service_kind: ServiceKind,
    pub program_id: String,
    pub station_id: String,
    pub area_id: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub recording_type: RecordingType,
    /// Margin recorded before the nominal start.
    pub start_delay: Duration,
    /// Margin recorded after the nominal end.
    pub end_delay: Duration,
    pub source_type: SourceType,
}

impl RecordingCommand {
    pub fn is_time_free(&self) -> bool {
        self.recording_type == RecordingType::TimeFree
    }
}

/// Per-recording options carried from the command through the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingOptions {
    pub service_kind: ServiceKind,
    pub is_time_free: bool,
    pub start_delay: Duration,
    pub end_delay: Duration,
    pub source_type: SourceType,
}

impl RecordingOptions {
    pub fn from_command(command: &RecordingCommand) -> Self {
        Self {
            service_kind: command.service_kind,
            is_time_free: command.is_time_free(),
            start_delay: command.start_delay,
            end_delay: command.end_delay,
            source_type: command.source_type,
        }
    }

    /// The capture window: the program window widened by both margins.
    /// `None` when a margin pushes either bound out of range.
    pub fn capture_window(&self, program: &ProgramInfo) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        Some((
            shift_back(program.start, self.start_delay)?,
            shift_forward(program.end, self.end_delay)?,
        ))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordingMetadata {
    pub station_name: String,
    pub title: String,
    pub subtitle: String,
    pub performer: String,
    pub description: String,
    pub program_url: String,
}

impl From<&ProgramInfo> for RecordingMetadata {
    fn from(program: &ProgramInfo) -> Self {
        Self {
            station_name: program.station_name.clone(),
            title: program.title.clone(),
            subtitle: program.subtitle.clone(),
            performer: program.performer.clone(),
            description: program.description.clone(),
            program_url: program.program_url.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordingFile {
    /// Path relative to the configured save directory, always `/`-separated.
    pub file_relative_path: String,
    pub has_hls_file: bool,
    pub hls_directory_path: Option<String>,
}

/// One attempted occurrence, together with its metadata and file record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recording {
    pub id: String,
    pub service_kind: ServiceKind,
    pub program_id: String,
    pub station_id: String,
    pub area_id: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub is_time_free: bool,
    pub state: RecordingState,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub source_type: SourceType,
    pub is_listened: bool,
    pub metadata: RecordingMetadata,
    pub file: RecordingFile,
}
