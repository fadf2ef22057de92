use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::notify::{Notification, Notifier};
use crate::pipeline::{
    BroadcastProgress, NoopProgress, ProgressReporter, RecordingOrchestrator, RecordingProgressEvent,
};

use super::running::RunningRecordings;
use super::store::ScheduleStore;
use super::timer::{TriggerHandler, TriggerPayload};

/// Runs fired triggers through the orchestrator and settles their schedule rows.
///
/// A successful recording deletes its job. A failed one leaves the job
/// disabled for inspection; it is not retried. A cancelled one leaves the
/// job untouched so the next reconcile can pick it up again.
pub struct RecordingDispatcher {
    orchestrator: Arc<RecordingOrchestrator>,
    store: Arc<dyn ScheduleStore>,
    notifier: Arc<dyn Notifier>,
    running: Arc<RunningRecordings>,
    progress_sender: Option<Arc<broadcast::Sender<RecordingProgressEvent>>>,
}

impl RecordingDispatcher {
    pub fn new(
        orchestrator: Arc<RecordingOrchestrator>,
        store: Arc<dyn ScheduleStore>,
        notifier: Arc<dyn Notifier>,
        running: Arc<RunningRecordings>,
    ) -> Self {
        Self {
            orchestrator,
            store,
            notifier,
            running,
            progress_sender: None,
        }
    }

    pub fn with_progress_sender(
        mut self,
        sender: Arc<broadcast::Sender<RecordingProgressEvent>>,
    ) -> Self {
        self.progress_sender = Some(sender);
        self
    }

    fn progress_for(&self, payload: &TriggerPayload) -> Box<dyn ProgressReporter> {
        match &self.progress_sender {
            Some(sender) => Box::new(BroadcastProgress::new(
                &payload.command.program_id,
                &payload.command.station_id,
                Arc::clone(sender),
            )),
            None => Box::new(NoopProgress),
        }
    }

    async fn settle_success(&self, job_id: &str) {
        match self.store.delete(job_id).await {
            Ok(true) => {}
            Ok(false) => warn!(job_id, "Schedule job was already removed"),
            Err(e) => error!(job_id, error = %e, "Failed to delete finished schedule job"),
        }
    }

    async fn settle_failure(&self, job_id: &str) {
        if let Err(e) = self.store.increment_retry_count(job_id).await {
            warn!(job_id, error = %e, "Failed to record attempt on schedule job");
        }
        match self.store.set_enabled(job_id, false).await {
            Ok(true) => {}
            Ok(false) => warn!(job_id, "Schedule job was already removed"),
            Err(e) => error!(job_id, error = %e, "Failed to disable failed schedule job"),
        }
    }
}

fn describe(payload: &TriggerPayload) -> String {
    format!(
        "Recording of {} on {}",
        payload.command.program_id, payload.command.station_id
    )
}

#[async_trait]
impl TriggerHandler for RecordingDispatcher {
    async fn handle(&self, payload: TriggerPayload, cancel: CancellationToken) {
        let job_id = payload.schedule_job_id.clone();
        let progress = self.progress_for(&payload);
        let running = self.running.start(&job_id, &cancel);

        self.notifier
            .notify(Notification::info(format!("{} started", describe(&payload))));

        let outcome = self
            .orchestrator
            .record(&payload.command, progress.as_ref(), running.token())
            .await;
        drop(running);

        match &outcome.result {
            Ok(path) => {
                info!(
                    job_id = %job_id,
                    recording_id = outcome.recording_id.as_deref().unwrap_or_default(),
                    file = %path.relative_path_string(),
                    "Scheduled recording finished"
                );
                self.settle_success(&job_id).await;
                self.notifier.notify(Notification::info(format!(
                    "{} finished: {}",
                    describe(&payload),
                    path.relative_path_string()
                )));
            }
            Err(e) if e.is_cancelled() => {
                info!(job_id = %job_id, "Scheduled recording cancelled, job left in place");
                self.notifier
                    .notify(Notification::warning(format!("{} was cancelled", describe(&payload))));
            }
            Err(e) => {
                warn!(job_id = %job_id, error = %e, "Scheduled recording failed");
                self.settle_failure(&job_id).await;
                self.notifier.notify(Notification::error(format!(
                    "{} failed: {}",
                    describe(&payload),
                    e
                )));
            }
        }
    }
}
