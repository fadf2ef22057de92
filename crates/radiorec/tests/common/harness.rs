//! Test harness for isolated test execution.
//!
//! The `TestHarness` struct provides a complete isolated environment for
//! testing the recording pipeline and the scheduler, including:
//! - Temporary save and temp directories
//! - An in-memory database behind real SQLite repositories
//! - A real orchestrator wired to a scripted process runner

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use radiorec::config::load_config_from_str;
use radiorec::pipeline::{NoopProgress, ProgressReporter};
use radiorec::recording::{Recording, RecordingCommand, SqliteRecordingRepository};
use radiorec::scheduler::{
    JobScheduler, LocalTimerService, RecordingDispatcher, RunningRecordings, ScheduleStore,
    ScheduleWakeup, SchedulerConfig, SqliteScheduleStore,
};
use radiorec::source::SourceRegistry;
use radiorec::storage::MediaStorage;
use radiorec::transcode::{TranscodeConfig, Transcoder};
use radiorec::{Config, Database, RecordingOrchestrator, RecordingResult};

use super::fakes::{FlakyRepository, FlakyTimer, RecordingNotifier, RunnerStep, ScriptedRunner};

/// Test harness providing an isolated execution environment for integration tests.
pub struct TestHarness {
    /// Temporary directory containing the save and temp subdirectories.
    temp_dir: TempDir,
    pub save_dir: PathBuf,
    pub work_dir: PathBuf,
    pub config: Config,
    pub db: Database,
    pub runner: Arc<ScriptedRunner>,
    pub repository: Arc<FlakyRepository>,
    pub store: Arc<SqliteScheduleStore>,
    pub notifier: Arc<RecordingNotifier>,
    pub wakeup: Arc<ScheduleWakeup>,
    pub timer: Arc<FlakyTimer>,
    pub running: Arc<RunningRecordings>,
    sources: SourceRegistry,
}

impl TestHarness {
    /// Create a harness whose runner succeeds on every call.
    pub fn new() -> Self {
        Self::with_runner_steps(vec![])
    }

    /// Create a harness whose runner follows `steps`, then succeeds.
    pub fn with_runner_steps(steps: Vec<RunnerStep>) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let save_dir = temp_dir.path().join("save");
        let work_dir = temp_dir.path().join("work");

        let config = load_config_from_str(&format!(
            r#"{{
                "version": "1.0",
                "save_directory": {save},
                "temp_directory": {work},
                "templates": {{ "directory": "$StationId$", "filename": "$Title$" }},
                "margins": {{ "start_seconds": 60, "end_seconds": 30 }},
                "transcode": {{ "chunk_seconds": 300, "timeout_grace_seconds": 60 }}
            }}"#,
            save = serde_json::to_string(&save_dir).unwrap(),
            work = serde_json::to_string(&work_dir).unwrap(),
        ))
        .expect("Harness config should be valid");

        let db = Database::open_in_memory().expect("Failed to open database");
        let wakeup = Arc::new(ScheduleWakeup::new());

        Self {
            temp_dir,
            save_dir,
            work_dir,
            repository: FlakyRepository::new(SqliteRecordingRepository::new(db.clone())),
            store: Arc::new(SqliteScheduleStore::new(db.clone())),
            notifier: RecordingNotifier::new(),
            timer: FlakyTimer::new(LocalTimerService::new(Arc::clone(&wakeup))),
            wakeup,
            running: Arc::new(RunningRecordings::new()),
            runner: ScriptedRunner::new(steps),
            config,
            db,
            sources: SourceRegistry::new(),
        }
    }

    /// Root of the temporary directory.
    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn with_source(mut self, source: Arc<dyn radiorec::RecordingSource>) -> Self {
        self.sources.register(source);
        self
    }

    pub fn storage(&self) -> Arc<MediaStorage> {
        Arc::new(MediaStorage::from_config(&self.config).expect("Storage config should be valid"))
    }

    pub fn orchestrator(&self) -> RecordingOrchestrator {
        let transcoder = Transcoder::new(
            self.runner.clone(),
            TranscodeConfig::from_config(&self.config).expect("Transcode config should be valid"),
        );
        RecordingOrchestrator::new(
            self.sources.clone(),
            self.storage(),
            Arc::new(transcoder),
            self.repository.clone(),
        )
    }

    pub fn scheduler(&self) -> JobScheduler {
        JobScheduler::new(
            self.timer.clone(),
            self.store.clone(),
            self.notifier.clone(),
            self.running.clone(),
            SchedulerConfig::from_config(&self.config),
        )
    }

    pub fn dispatcher(&self) -> RecordingDispatcher {
        RecordingDispatcher::new(
            Arc::new(self.orchestrator()),
            self.store.clone() as Arc<dyn ScheduleStore>,
            self.notifier.clone(),
            self.running.clone(),
        )
    }

    /// Run one recording with no progress subscriber and no cancellation.
    pub async fn record(&self, command: &RecordingCommand) -> RecordingResult {
        self.record_with(command, &NoopProgress, &CancellationToken::new())
            .await
    }

    pub async fn record_with(
        &self,
        command: &RecordingCommand,
        progress: &dyn ProgressReporter,
        cancel: &CancellationToken,
    ) -> RecordingResult {
        self.orchestrator().record(command, progress, cancel).await
    }

    pub async fn recording(&self, id: &str) -> Recording {
        use radiorec::RecordingRepository;
        self.repository
            .find_by_id(id)
            .await
            .expect("Lookup should succeed")
            .expect("Recording should exist")
    }

    /// Every regular file below `dir`, relative to it.
    pub fn files_under(dir: &Path) -> Vec<PathBuf> {
        let mut found = Vec::new();
        let mut pending = vec![dir.to_path_buf()];
        while let Some(current) = pending.pop() {
            let Ok(entries) = std::fs::read_dir(&current) else {
                continue;
            };
            for entry in entries.flatten() {
                let path = entry.path();
                if path.is_dir() {
                    pending.push(path);
                } else {
                    found.push(path.strip_prefix(dir).unwrap().to_path_buf());
                }
            }
        }
        found.sort();
        found
    }
}
