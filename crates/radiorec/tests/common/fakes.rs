//! Fakes standing in for the external collaborators of the core.

#![allow(dead_code)]

use std::collections::{HashSet, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use radiorec::pipeline::{ProgressEvent, ProgressReporter};
use radiorec::recording::{
    ProgramInfo, Recording, RecordingCommand, RecordingOptions, RecordingRepository,
    RecordingState, ServiceKind, SqliteRecordingRepository,
};
use radiorec::scheduler::{
    LocalTimerService, TimerError, TimerService, TriggerHandler, TriggerPayload,
};
use radiorec::storage::MediaPath;
use radiorec::{
    DatabaseError, Notification, Notifier, ProcessError, ProcessRunner, RecordingSource,
    SourceError, SourceResult,
};

/// Source that accepts every command with a fixed stream URL, or rejects
/// every command with a fixed error.
pub struct FakeSource {
    kind: ServiceKind,
    outcome: Result<String, SourceError>,
    title: String,
    calls: AtomicUsize,
}

impl FakeSource {
    pub fn accepting(kind: ServiceKind) -> Arc<Self> {
        Arc::new(Self {
            kind,
            outcome: Ok("https://stream.test/live.m3u8".to_string()),
            title: "Night Talk".to_string(),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn rejecting(kind: ServiceKind, error: SourceError) -> Arc<Self> {
        Arc::new(Self {
            kind,
            outcome: Err(error),
            title: "Night Talk".to_string(),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecordingSource for FakeSource {
    fn service_kind(&self) -> ServiceKind {
        self.kind
    }

    async fn prepare(&self, command: &RecordingCommand) -> Result<SourceResult, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let stream_url = self.outcome.clone()?;
        Ok(SourceResult {
            stream_url,
            headers: vec![("X-Radiko-AuthToken".to_string(), "token".to_string())],
            program_info: ProgramInfo {
                service_kind: command.service_kind,
                program_id: command.program_id.clone(),
                station_id: command.station_id.clone(),
                station_name: format!("{} Radio", command.station_id),
                area_id: command.area_id.clone(),
                title: self.title.clone(),
                subtitle: String::new(),
                performer: "Host".to_string(),
                description: String::new(),
                program_url: String::new(),
                start: command.start,
                end: command.end,
            },
            options: RecordingOptions::from_command(command),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerStep {
    /// Exit 0, creating the output files named in the arguments.
    Succeed,
    /// Non-zero exit.
    ExitFailure,
    TimeOut,
    /// Block until the cancellation token fires.
    WaitForCancel,
}

/// Process runner answering each call with the next scripted step.
/// Once the script runs out every call succeeds.
pub struct ScriptedRunner {
    steps: Mutex<VecDeque<RunnerStep>>,
    calls: Mutex<Vec<Vec<String>>>,
    started: tokio::sync::Notify,
}

impl ScriptedRunner {
    pub fn new(steps: Vec<RunnerStep>) -> Arc<Self> {
        Arc::new(Self {
            steps: Mutex::new(steps.into()),
            calls: Mutex::new(Vec::new()),
            started: tokio::sync::Notify::new(),
        })
    }

    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }

    /// Resolves once a call has started.
    pub async fn wait_started(&self) {
        if !self.calls.lock().unwrap().is_empty() {
            return;
        }
        self.started.notified().await;
    }
}

fn write_outputs(args: &[String], working_dir: Option<&Path>) {
    let dir = working_dir.map(Path::to_path_buf).unwrap_or_default();
    for pair in args.windows(2) {
        if pair[0] == "copy" && !pair[1].starts_with('-') {
            std::fs::write(dir.join(&pair[1]), b"chunk").unwrap();
        }
    }
    if let Some(output) = args.last() {
        std::fs::write(dir.join(output), b"media").unwrap();
    }
}

#[async_trait]
impl ProcessRunner for ScriptedRunner {
    async fn run(
        &self,
        args: &[String],
        timeout: Duration,
        working_dir: Option<&Path>,
        cancel: &CancellationToken,
    ) -> Result<bool, ProcessError> {
        self.calls.lock().unwrap().push(args.to_vec());
        self.started.notify_one();
        let step = self
            .steps
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(RunnerStep::Succeed);

        match step {
            RunnerStep::Succeed => {
                write_outputs(args, working_dir);
                Ok(true)
            }
            RunnerStep::ExitFailure => Ok(false),
            RunnerStep::TimeOut => Err(ProcessError::TimedOut(timeout.as_secs())),
            RunnerStep::WaitForCancel => {
                cancel.cancelled().await;
                Err(ProcessError::Cancelled)
            }
        }
    }
}

/// SQLite repository whose writes can be made to fail on demand.
pub struct FlakyRepository {
    inner: SqliteRecordingRepository,
    fail_create: AtomicBool,
    fail_updates: AtomicBool,
    update_attempts: AtomicUsize,
}

impl FlakyRepository {
    pub fn new(inner: SqliteRecordingRepository) -> Arc<Self> {
        Arc::new(Self {
            inner,
            fail_create: AtomicBool::new(false),
            fail_updates: AtomicBool::new(false),
            update_attempts: AtomicUsize::new(0),
        })
    }

    pub fn fail_create(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }

    pub fn fail_updates(&self, fail: bool) {
        self.fail_updates.store(fail, Ordering::SeqCst);
    }

    pub fn update_attempts(&self) -> usize {
        self.update_attempts.load(Ordering::SeqCst)
    }

    fn injected(&self) -> DatabaseError {
        DatabaseError::Task("injected failure".to_string())
    }
}

#[async_trait]
impl RecordingRepository for FlakyRepository {
    async fn create(
        &self,
        program: &ProgramInfo,
        path: &MediaPath,
        options: &RecordingOptions,
    ) -> Result<String, DatabaseError> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(self.injected());
        }
        self.inner.create(program, path, options).await
    }

    async fn update_state(
        &self,
        id: &str,
        state: RecordingState,
        error_message: Option<&str>,
    ) -> Result<(), DatabaseError> {
        self.update_attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(self.injected());
        }
        self.inner.update_state(id, state, error_message).await
    }

    async fn update_file_path(&self, id: &str, path: &MediaPath) -> Result<(), DatabaseError> {
        self.update_attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(self.injected());
        }
        self.inner.update_file_path(id, path).await
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Recording>, DatabaseError> {
        self.inner.find_by_id(id).await
    }

    async fn list_by_state(&self, state: RecordingState) -> Result<Vec<Recording>, DatabaseError> {
        self.inner.list_by_state(state).await
    }
}

/// Timer that delegates to a `LocalTimerService` but rejects chosen keys.
pub struct FlakyTimer {
    inner: LocalTimerService,
    rejected: Mutex<HashSet<String>>,
    schedule_calls: AtomicUsize,
}

impl FlakyTimer {
    pub fn new(inner: LocalTimerService) -> Arc<Self> {
        Arc::new(Self {
            inner,
            rejected: Mutex::new(HashSet::new()),
            schedule_calls: AtomicUsize::new(0),
        })
    }

    pub fn reject(&self, key: &str) {
        self.rejected.lock().unwrap().insert(key.to_string());
    }

    pub fn schedule_calls(&self) -> usize {
        self.schedule_calls.load(Ordering::SeqCst)
    }

    pub fn registered(&self) -> usize {
        self.inner.len()
    }

    pub fn fire_time(&self, key: &str) -> Option<DateTime<Utc>> {
        self.inner.fire_time(key)
    }

    pub async fn run(&self, handler: Arc<dyn TriggerHandler>, cancel: CancellationToken) {
        self.inner.run(handler, cancel).await
    }
}

#[async_trait]
impl TimerService for FlakyTimer {
    async fn schedule(
        &self,
        key: &str,
        fire_at: DateTime<Utc>,
        payload: TriggerPayload,
    ) -> Result<(), TimerError> {
        self.schedule_calls.fetch_add(1, Ordering::SeqCst);
        if self.rejected.lock().unwrap().contains(key) {
            return Err(TimerError::Rejected {
                key: key.to_string(),
                reason: "injected rejection".to_string(),
            });
        }
        self.inner.schedule(key, fire_at, payload).await
    }

    async fn exists(&self, key: &str) -> Result<bool, TimerError> {
        self.inner.exists(key).await
    }

    async fn cancel(&self, key: &str) -> Result<bool, TimerError> {
        self.inner.cancel(key).await
    }
}

/// Notifier that keeps everything it is sent.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: Notification) {
        self.sent.lock().unwrap().push(notification);
    }
}

/// Progress reporter that keeps every event.
#[derive(Default)]
pub struct CollectingProgress {
    events: Mutex<Vec<ProgressEvent>>,
}

impl CollectingProgress {
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl ProgressReporter for CollectingProgress {
    fn report(&self, event: ProgressEvent) {
        self.events.lock().unwrap().push(event);
    }
}
