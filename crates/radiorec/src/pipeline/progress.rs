use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Phase of one recording run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RecordingPhase {
    Preparing,
    Storing,
    Recording,
    Committing,
    Completed,
    Failed,
}

impl std::fmt::Display for RecordingPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordingPhase::Preparing => write!(f, "Preparing source"),
            RecordingPhase::Storing => write!(f, "Allocating storage"),
            RecordingPhase::Recording => write!(f, "Recording"),
            RecordingPhase::Committing => write!(f, "Committing file"),
            RecordingPhase::Completed => write!(f, "Completed"),
            RecordingPhase::Failed => write!(f, "Failed"),
        }
    }
}

/// Events emitted by the orchestrator while a recording runs.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    Phase {
        phase: RecordingPhase,
        message: String,
    },
    Completed {
        recording_id: String,
        file_relative_path: String,
    },
    Failed {
        recording_id: Option<String>,
        error: String,
    },
}

pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// Reporter that drops every event.
pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn report(&self, _event: ProgressEvent) {}
}

/// Progress event as published to subscribers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingProgressEvent {
    pub program_id: String,
    pub station_id: String,
    pub phase: RecordingPhase,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recording_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_relative_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Publishes progress on a broadcast channel. Sending never blocks and an
/// absent subscriber is not an error.
pub struct BroadcastProgress {
    program_id: String,
    station_id: String,
    sender: Arc<broadcast::Sender<RecordingProgressEvent>>,
}

impl BroadcastProgress {
    pub fn new(
        program_id: &str,
        station_id: &str,
        sender: Arc<broadcast::Sender<RecordingProgressEvent>>,
    ) -> Self {
        Self {
            program_id: program_id.to_string(),
            station_id: station_id.to_string(),
            sender,
        }
    }

    fn event(&self, phase: RecordingPhase, message: String) -> RecordingProgressEvent {
        RecordingProgressEvent {
            program_id: self.program_id.clone(),
            station_id: self.station_id.clone(),
            phase,
            message,
            timestamp: Utc::now(),
            recording_id: None,
            file_relative_path: None,
            error: None,
        }
    }
}

impl ProgressReporter for BroadcastProgress {
    fn report(&self, event: ProgressEvent) {
        let payload = match event {
            ProgressEvent::Phase { phase, message } => self.event(phase, message),
            ProgressEvent::Completed {
                recording_id,
                file_relative_path,
            } => {
                let mut payload = self.event(RecordingPhase::Completed, "Recording saved".to_string());
                payload.recording_id = Some(recording_id);
                payload.file_relative_path = Some(file_relative_path);
                payload
            }
            ProgressEvent::Failed {
                recording_id,
                error,
            } => {
                let mut payload = self.event(RecordingPhase::Failed, "Recording failed".to_string());
                payload.recording_id = recording_id;
                payload.error = Some(error);
                payload
            }
        };
        // No receivers is fine.
        let _ = self.sender.send(payload);
    }
}
