use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use crate::notify::{Notification, Notifier};

use super::config::SchedulerConfig;
use super::error::{SchedulerError, TimerError};
use super::job::{trigger_key, ScheduleJob};
use super::running::RunningRecordings;
use super::store::ScheduleStore;
use super::timer::{TimerService, TriggerPayload};

/// Outcome of [`JobScheduler::set_schedule_job`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    Registered { fire_at: DateTime<Utc> },
    /// A trigger already existed under the job's key; nothing changed.
    AlreadyRegistered,
}

/// Counts from one [`JobScheduler::reconcile_from_store`] run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub succeeded: usize,
    pub failed: usize,
    /// Failed jobs that were successfully disabled.
    pub disabled: usize,
    /// Failed jobs whose disable also failed; they stay enabled.
    pub disable_failed: usize,
    pub failed_job_ids: Vec<String>,
}

impl ReconcileReport {
    pub fn message(&self) -> String {
        format!(
            "restore: {} failed, {} succeeded, {} disabled",
            self.failed, self.succeeded, self.disabled
        )
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}

/// Keeps timer registrations in line with the durable schedule.
pub struct JobScheduler {
    timer: Arc<dyn TimerService>,
    store: Arc<dyn ScheduleStore>,
    notifier: Arc<dyn Notifier>,
    running: Arc<RunningRecordings>,
    config: SchedulerConfig,
}

impl JobScheduler {
    pub fn new(
        timer: Arc<dyn TimerService>,
        store: Arc<dyn ScheduleStore>,
        notifier: Arc<dyn Notifier>,
        running: Arc<RunningRecordings>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            timer,
            store,
            notifier,
            running,
            config,
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Registers a trigger for `job`. Calling this again for a job that
    /// already has a trigger is a successful no-op.
    pub async fn set_schedule_job(&self, job: &ScheduleJob) -> Result<Registration, SchedulerError> {
        let key = job.trigger_key();
        let timer_error = |source: TimerError| SchedulerError::Timer {
            key: key.clone(),
            source,
        };

        if self.timer.exists(&key).await.map_err(timer_error)? {
            debug!(job_id = %job.id, key = %key, "Trigger already registered");
            return Ok(Registration::AlreadyRegistered);
        }

        let now = Utc::now();
        if job.is_expired(&self.config, now)? {
            return Err(SchedulerError::Expired {
                job_id: job.id.clone(),
                ends_at: job.capture_end(&self.config)?,
            });
        }

        let fire_at = job.fire_at(&self.config, now)?;
        let payload = TriggerPayload {
            schedule_job_id: job.id.clone(),
            command: job.to_command(&self.config),
        };

        match self.timer.schedule(&key, fire_at, payload).await {
            Ok(()) => {
                info!(
                    job_id = %job.id,
                    program_id = %job.program_id,
                    recording_type = %job.recording_type,
                    fire_at = %fire_at,
                    "Trigger registered"
                );
                Ok(Registration::Registered { fire_at })
            }
            Err(TimerError::AlreadyScheduled(_)) => Ok(Registration::AlreadyRegistered),
            Err(e) => Err(timer_error(e)),
        }
    }

    /// Cancels the trigger for `job_id` and interrupts its recording if one
    /// is in flight. An absent trigger is not an error.
    pub async fn delete_schedule_job(&self, job_id: &str) -> Result<(), SchedulerError> {
        let key = trigger_key(job_id);
        let removed = self
            .timer
            .cancel(&key)
            .await
            .map_err(|source| SchedulerError::Timer {
                key: key.clone(),
                source,
            })?;
        debug!(job_id, removed, "Trigger cancelled");
        if self.running.cancel(job_id) {
            info!(job_id, "Interrupted in-flight recording");
        }
        Ok(())
    }

    /// Stores `job` and registers its trigger. If registration fails the
    /// stored row is disabled so it no longer claims the occurrence.
    pub async fn add_schedule_job(&self, job: &ScheduleJob) -> Result<Registration, SchedulerError> {
        self.store.insert(job).await?;
        match self.set_schedule_job(job).await {
            Ok(registration) => Ok(registration),
            Err(e) => {
                warn!(job_id = %job.id, error = %e, "Registration failed, disabling job");
                if let Err(disable_err) = self.store.set_enabled(&job.id, false).await {
                    error!(job_id = %job.id, error = %disable_err, "Failed to disable job");
                }
                Err(e)
            }
        }
    }

    /// Cancels the trigger and deletes the stored job. Returns `false` if no
    /// job with this id was stored.
    pub async fn remove_schedule_job(&self, job_id: &str) -> Result<bool, SchedulerError> {
        self.delete_schedule_job(job_id).await?;
        Ok(self.store.delete(job_id).await?)
    }

    /// Re-registers every enabled job. Jobs that cannot be registered are
    /// disabled. Emits exactly one notification summarizing the run.
    pub async fn reconcile_from_store(&self) -> Result<ReconcileReport, SchedulerError> {
        let jobs = match self.store.list_enabled().await {
            Ok(jobs) => jobs,
            Err(e) => {
                error!(error = %e, "Failed to load schedule jobs");
                self.notifier.notify(Notification::error(format!(
                    "restore: could not load schedule jobs: {}",
                    e
                )));
                return Err(e.into());
            }
        };
        info!(jobs = jobs.len(), "Restoring schedule triggers");

        let mut report = ReconcileReport::default();
        for job in &jobs {
            match self.set_schedule_job(job).await {
                Ok(_) => report.succeeded += 1,
                Err(e) => {
                    warn!(job_id = %job.id, error = %e, "Failed to restore trigger");
                    report.failed += 1;
                    report.failed_job_ids.push(job.id.clone());
                    match self.store.set_enabled(&job.id, false).await {
                        Ok(true) => report.disabled += 1,
                        Ok(false) => {
                            warn!(job_id = %job.id, "Job vanished before it could be disabled")
                        }
                        Err(disable_err) => {
                            error!(job_id = %job.id, error = %disable_err, "Failed to disable job");
                            report.disable_failed += 1;
                        }
                    }
                }
            }
        }

        let message = report.message();
        info!(
            succeeded = report.succeeded,
            failed = report.failed,
            disabled = report.disabled,
            disable_failed = report.disable_failed,
            "{}",
            message
        );
        let notification = if report.has_failures() {
            Notification::error(message)
        } else {
            Notification::info(message)
        };
        self.notifier.notify(notification);

        Ok(report)
    }
}
