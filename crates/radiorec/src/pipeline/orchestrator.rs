use std::future::Future;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, info_span, warn, Instrument};

use crate::config::Config;
use crate::db::DatabaseError;
use crate::error::ConfigError;
use crate::recording::{RecordingCommand, RecordingRepository, RecordingState};
use crate::sanitize::redact_path;
use crate::source::SourceRegistry;
use crate::storage::{MediaPath, MediaStorage};
use crate::transcode::Transcoder;

use super::error::PipelineError;
use super::progress::{ProgressEvent, ProgressReporter, RecordingPhase};

/// Outcome of one [`RecordingOrchestrator::record`] call.
///
/// `recording_id` is set as soon as a row exists, so failed runs that got
/// that far can still be inspected.
#[derive(Debug)]
pub struct RecordingResult {
    pub recording_id: Option<String>,
    pub result: Result<MediaPath, PipelineError>,
}

impl RecordingResult {
    fn without_record(error: PipelineError) -> Self {
        Self {
            recording_id: None,
            result: Err(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    pub fn error(&self) -> Option<&PipelineError> {
        self.result.as_ref().err()
    }
}

/// Runs one occurrence through source, storage, transcoder and repository.
pub struct RecordingOrchestrator {
    sources: SourceRegistry,
    storage: Arc<MediaStorage>,
    transcoder: Arc<Transcoder>,
    repository: Arc<dyn RecordingRepository>,
}

impl RecordingOrchestrator {
    pub fn new(
        sources: SourceRegistry,
        storage: Arc<MediaStorage>,
        transcoder: Arc<Transcoder>,
        repository: Arc<dyn RecordingRepository>,
    ) -> Self {
        Self {
            sources,
            storage,
            transcoder,
            repository,
        }
    }

    /// Production constructor: storage and an `ffmpeg` transcoder from config.
    pub fn from_config(
        config: &Config,
        sources: SourceRegistry,
        repository: Arc<dyn RecordingRepository>,
    ) -> Result<Self, ConfigError> {
        Ok(Self::new(
            sources,
            Arc::new(MediaStorage::from_config(config)?),
            Arc::new(Transcoder::from_config(config)?),
            repository,
        ))
    }

    /// Records `command`. Never fails by any route other than the returned
    /// result; persistence errors after the row exists are logged only.
    pub async fn record(
        &self,
        command: &RecordingCommand,
        progress: &dyn ProgressReporter,
        cancel: &CancellationToken,
    ) -> RecordingResult {
        let span = info_span!("recording",
            service = %command.service_kind,
            program_id = %command.program_id,
            station_id = %command.station_id,
            time_free = command.is_time_free(),
        );
        let outcome = self.run(command, progress, cancel).instrument(span).await;

        match (&outcome.result, &outcome.recording_id) {
            (Ok(path), Some(id)) => progress.report(ProgressEvent::Completed {
                recording_id: id.clone(),
                file_relative_path: path.relative_path_string(),
            }),
            (Ok(_), None) => {}
            (Err(e), id) => progress.report(ProgressEvent::Failed {
                recording_id: id.clone(),
                error: e.to_string(),
            }),
        }
        outcome
    }

    async fn run(
        &self,
        command: &RecordingCommand,
        progress: &dyn ProgressReporter,
        cancel: &CancellationToken,
    ) -> RecordingResult {
        // Step 1: Resolve source
        let Some(source) = self.sources.get(command.service_kind) else {
            warn!("No recording source registered");
            return RecordingResult::without_record(PipelineError::NoSource(command.service_kind));
        };

        // Step 2: Prepare source
        progress.report(ProgressEvent::Phase {
            phase: RecordingPhase::Preparing,
            message: "Resolving program and stream...".to_string(),
        });
        let prepared = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(PipelineError::Cancelled),
            result = source.prepare(command).instrument(info_span!("prepare_source")) => {
                result.map_err(PipelineError::from)
            }
        };
        let source_result = match prepared {
            Ok(result) => result,
            Err(e) => {
                warn!(error = %e, "Source preparation failed");
                return RecordingResult::without_record(e);
            }
        };

        // Step 3: Prepare storage
        progress.report(ProgressEvent::Phase {
            phase: RecordingPhase::Storing,
            message: "Allocating file locations...".to_string(),
        });
        let path = match self
            .storage
            .prepare(&source_result.program_info)
            .instrument(info_span!("prepare_storage"))
            .await
        {
            Ok(path) => path,
            Err(e) => {
                warn!(error = %e, "Storage preparation failed");
                return RecordingResult::without_record(PipelineError::Prepare(e));
            }
        };

        if cancel.is_cancelled() {
            self.storage.cleanup_temp(&path).await;
            return RecordingResult::without_record(PipelineError::Cancelled);
        }

        // Step 4: Create the row
        let recording_id = match self
            .repository
            .create(&source_result.program_info, &path, &source_result.options)
            .instrument(info_span!("create_recording"))
            .await
        {
            Ok(id) => id,
            Err(e) => {
                error!(error = %e, "Failed to create recording row");
                self.storage.cleanup_temp(&path).await;
                return RecordingResult::without_record(PipelineError::Persistence(e));
            }
        };
        info!(
            recording_id = %recording_id,
            file = %redact_path(&path.final_file_path),
            "Recording started"
        );

        // Step 5: Transcode
        progress.report(ProgressEvent::Phase {
            phase: RecordingPhase::Recording,
            message: if source_result.options.is_time_free {
                "Downloading time-free program...".to_string()
            } else {
                "Recording live stream...".to_string()
            },
        });
        if let Err(e) = self
            .transcoder
            .record(&source_result, &path, cancel)
            .instrument(info_span!("transcode"))
            .await
        {
            let failure = if e.is_cancelled() {
                PipelineError::Cancelled
            } else {
                PipelineError::Transcode(e)
            };
            return self.fail(recording_id, &path, failure).await;
        }

        // Step 6: Commit
        progress.report(ProgressEvent::Phase {
            phase: RecordingPhase::Committing,
            message: "Moving recording into place...".to_string(),
        });
        let committed = match self
            .storage
            .commit(&path)
            .instrument(info_span!("commit"))
            .await
        {
            Ok(committed) => committed,
            Err(e) => return self.fail(recording_id, &path, PipelineError::Commit(e)).await,
        };

        // Step 7: Persist the outcome; the result is already decided.
        if committed != path {
            guard_persistence(
                "update_file_path",
                &recording_id,
                self.repository.update_file_path(&recording_id, &committed),
            )
            .await;
        }
        guard_persistence(
            "mark_completed",
            &recording_id,
            self.repository
                .update_state(&recording_id, RecordingState::Completed, None),
        )
        .await;

        info!(
            recording_id = %recording_id,
            file = %redact_path(&committed.final_file_path),
            "Recording completed"
        );
        RecordingResult {
            recording_id: Some(recording_id),
            result: Ok(committed),
        }
    }

    async fn fail(
        &self,
        recording_id: String,
        path: &MediaPath,
        failure: PipelineError,
    ) -> RecordingResult {
        warn!(recording_id = %recording_id, error = %failure, "Recording failed");
        self.storage.cleanup_temp(path).await;

        let reason = failure.to_string();
        guard_persistence(
            "mark_failed",
            &recording_id,
            self.repository
                .update_state(&recording_id, RecordingState::Failed, Some(&reason)),
        )
        .await;

        RecordingResult {
            recording_id: Some(recording_id),
            result: Err(failure),
        }
    }
}

/// Awaits a state update and logs its failure instead of propagating it.
async fn guard_persistence<F>(action: &'static str, recording_id: &str, update: F)
where
    F: Future<Output = Result<(), DatabaseError>>,
{
    if let Err(e) = update.await {
        error!(recording_id, action, error = %e, "Recording state update failed");
    }
}
