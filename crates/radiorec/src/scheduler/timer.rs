use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::recording::RecordingCommand;

use super::error::TimerError;
use super::wakeup::ScheduleWakeup;

/// Upper bound on one idle sleep so clock adjustments are picked up.
const MAX_IDLE: Duration = Duration::from_secs(60);

/// What a trigger carries to its handler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerPayload {
    pub schedule_job_id: String,
    pub command: RecordingCommand,
}

/// External timer facility triggers are registered with.
#[async_trait]
pub trait TimerService: Send + Sync {
    /// Fails with [`TimerError::AlreadyScheduled`] if `key` is taken.
    async fn schedule(
        &self,
        key: &str,
        fire_at: DateTime<Utc>,
        payload: TriggerPayload,
    ) -> Result<(), TimerError>;

    async fn exists(&self, key: &str) -> Result<bool, TimerError>;

    /// Returns `false` if nothing was registered under `key`.
    async fn cancel(&self, key: &str) -> Result<bool, TimerError>;
}

/// Receives due triggers from [`LocalTimerService::run`].
#[async_trait]
pub trait TriggerHandler: Send + Sync {
    async fn handle(&self, payload: TriggerPayload, cancel: CancellationToken);
}

#[derive(Debug, Clone)]
struct Trigger {
    fire_at: DateTime<Utc>,
    payload: TriggerPayload,
}

/// In-process [`TimerService`].
///
/// Triggers live in memory only; after a restart they are rebuilt from the
/// schedule store by reconciliation.
pub struct LocalTimerService {
    triggers: Mutex<HashMap<String, Trigger>>,
    wakeup: Arc<ScheduleWakeup>,
    closed: CancellationToken,
}

impl LocalTimerService {
    pub fn new(wakeup: Arc<ScheduleWakeup>) -> Self {
        Self {
            triggers: Mutex::new(HashMap::new()),
            wakeup,
            closed: CancellationToken::new(),
        }
    }

    fn triggers(&self) -> MutexGuard<'_, HashMap<String, Trigger>> {
        self.triggers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn len(&self) -> usize {
        self.triggers().len()
    }

    pub fn is_empty(&self) -> bool {
        self.triggers().is_empty()
    }

    pub fn fire_time(&self, key: &str) -> Option<DateTime<Utc>> {
        self.triggers().get(key).map(|t| t.fire_at)
    }

    /// Removes and returns every trigger due at `now`, earliest first, and
    /// the fire time of the next one still pending.
    fn take_due(&self, now: DateTime<Utc>) -> (Vec<(String, Trigger)>, Option<DateTime<Utc>>) {
        let mut triggers = self.triggers();
        let due_keys: Vec<String> = triggers
            .iter()
            .filter(|(_, t)| t.fire_at <= now)
            .map(|(k, _)| k.clone())
            .collect();

        let mut due: Vec<(String, Trigger)> = due_keys
            .into_iter()
            .filter_map(|k| triggers.remove(&k).map(|t| (k, t)))
            .collect();
        due.sort_by(|a, b| a.1.fire_at.cmp(&b.1.fire_at).then_with(|| a.0.cmp(&b.0)));

        let next = triggers.values().map(|t| t.fire_at).min();
        (due, next)
    }

    /// Fires triggers until `cancel` is triggered. Each due payload is
    /// handled on its own task; in-flight handlers are cancelled and awaited
    /// before this returns.
    pub async fn run(&self, handler: Arc<dyn TriggerHandler>, cancel: CancellationToken) {
        info!(pending = self.len(), "Timer service started");
        let mut running = JoinSet::new();

        loop {
            while let Some(joined) = running.try_join_next() {
                if let Err(e) = joined {
                    warn!(error = %e, "Trigger handler task failed");
                }
            }

            let now = Utc::now();
            let (due, next) = self.take_due(now);
            for (key, trigger) in due {
                debug!(key = %key, fire_at = %trigger.fire_at, "Trigger fired");
                let handler = Arc::clone(&handler);
                let token = cancel.child_token();
                running.spawn(async move { handler.handle(trigger.payload, token).await });
            }

            let idle = next
                .and_then(|at| (at - Utc::now()).to_std().ok())
                .unwrap_or(MAX_IDLE)
                .min(MAX_IDLE);

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = self.wakeup.wait(&cancel) => {}
                _ = tokio::time::sleep(idle) => {}
            }
        }

        self.closed.cancel();
        let in_flight = running.len();
        if in_flight > 0 {
            info!(in_flight, "Waiting for running triggers to stop");
        }
        while let Some(joined) = running.join_next().await {
            if let Err(e) = joined {
                warn!(error = %e, "Trigger handler task failed");
            }
        }
        info!("Timer service stopped");
    }
}

#[async_trait]
impl TimerService for LocalTimerService {
    async fn schedule(
        &self,
        key: &str,
        fire_at: DateTime<Utc>,
        payload: TriggerPayload,
    ) -> Result<(), TimerError> {
        if self.closed.is_cancelled() {
            return Err(TimerError::Closed);
        }
        {
            let mut triggers = self.triggers();
            if triggers.contains_key(key) {
                return Err(TimerError::AlreadyScheduled(key.to_string()));
            }
            triggers.insert(key.to_string(), Trigger { fire_at, payload });
        }
        self.wakeup.wake();
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, TimerError> {
        Ok(self.triggers().contains_key(key))
    }

    async fn cancel(&self, key: &str) -> Result<bool, TimerError> {
        let removed = self.triggers().remove(key).is_some();
        if removed {
            self.wakeup.wake();
        }
        Ok(removed)
    }
}
