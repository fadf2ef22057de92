//! Drives the external transcoder to produce a recording at its temp path.

pub mod args;
pub mod runner;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{parse_utc_offset, Config};
use crate::error::{ConfigError, TranscodeError};
use crate::source::SourceResult;
use crate::storage::MediaPath;

pub use runner::{FfmpegRunner, ProcessRunner};

#[derive(Debug, Clone)]
pub struct TranscodeConfig {
    /// Added to the expected runtime of every pass.
    pub timeout_grace: Duration,
    pub chunk_seconds: u64,
    /// Local time of the time-free service, used for chunk timestamps.
    pub offset: FixedOffset,
}

impl TranscodeConfig {
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        Ok(Self {
            timeout_grace: Duration::from_secs(config.transcode.timeout_grace_seconds),
            chunk_seconds: config.transcode.chunk_seconds,
            offset: parse_utc_offset(&config.timezone)?,
        })
    }
}

pub struct Transcoder {
    runner: Arc<dyn ProcessRunner>,
    config: TranscodeConfig,
}

impl Transcoder {
    pub fn new(runner: Arc<dyn ProcessRunner>, config: TranscodeConfig) -> Self {
        Self { runner, config }
    }

    /// Builds a transcoder that runs the configured `ffmpeg` binary.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        Ok(Self::new(
            Arc::new(FfmpegRunner::new(config.transcode.ffmpeg_path.clone())),
            TranscodeConfig::from_config(config)?,
        ))
    }

    /// Records `source` into `path.temp_file_path`. Preconditions are checked
    /// before the runner is touched.
    pub async fn record(
        &self,
        source: &SourceResult,
        path: &MediaPath,
        cancel: &CancellationToken,
    ) -> Result<(), TranscodeError> {
        if source.options.is_time_free {
            self.record_time_free(source, path, cancel).await
        } else {
            self.record_live(source, path, Utc::now(), cancel).await
        }
    }

    async fn record_time_free(
        &self,
        source: &SourceResult,
        path: &MediaPath,
        cancel: &CancellationToken,
    ) -> Result<(), TranscodeError> {
        let program = &source.program_info;
        if !source.options.service_kind.supports_time_free() {
            return Err(TranscodeError::Precondition(format!(
                "{} does not offer time-free recording",
                source.options.service_kind
            )));
        }
        if source.stream_url.trim().is_empty() {
            return Err(TranscodeError::Precondition(
                "stream URL is empty".to_string(),
            ));
        }
        if program.start >= program.end {
            return Err(TranscodeError::Precondition(format!(
                "program start {} is not before end {}",
                program.start, program.end
            )));
        }

        let (start, end) = capture_window(source)?;
        let chunks = args::plan_chunks(
            &source.stream_url,
            start,
            end,
            self.config.chunk_seconds,
            self.config.offset,
        );
        let chunk_dir = path.chunk_directory();
        tokio::fs::create_dir_all(&chunk_dir)
            .await
            .map_err(|e| TranscodeError::Workspace {
                path: chunk_dir.clone(),
                source: e,
            })?;

        info!(chunks = chunks.len(), "Fetching time-free chunks");
        let window = Duration::from_secs(chunks.iter().map(|c| c.seconds).sum());
        self.run_pass(
            "chunk fetch",
            args::chunk_fetch_args(&source.headers, &chunks),
            window + self.config.timeout_grace,
            &chunk_dir,
            cancel,
        )
        .await?;

        for chunk in &chunks {
            let chunk_path = chunk_dir.join(&chunk.file_name);
            if !tokio::fs::try_exists(&chunk_path).await.unwrap_or(false) {
                return Err(TranscodeError::MissingChunk(chunk_path));
            }
        }

        let list_path = chunk_dir.join(args::CONCAT_LIST_FILE);
        tokio::fs::write(&list_path, args::concat_list(&chunks))
            .await
            .map_err(|e| TranscodeError::Workspace {
                path: list_path.clone(),
                source: e,
            })?;

        self.run_pass(
            "concat",
            args::concat_args(&path.temp_file_path),
            self.config.timeout_grace,
            &chunk_dir,
            cancel,
        )
        .await?;

        if let Err(e) = tokio::fs::remove_dir_all(&chunk_dir).await {
            warn!(error = %e, "Failed to remove chunk directory");
        }
        Ok(())
    }

    async fn record_live(
        &self,
        source: &SourceResult,
        path: &MediaPath,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<(), TranscodeError> {
        if source.stream_url.trim().is_empty() {
            return Err(TranscodeError::Precondition(
                "stream URL is empty".to_string(),
            ));
        }

        let window = capture_window(source)?;
        let seconds = live_duration(window, now).ok_or_else(|| {
            TranscodeError::Precondition(format!("capture window ended at {}", window.1))
        })?;

        let working_dir = path.temp_file_path.parent().unwrap_or(Path::new("."));
        self.run_pass(
            "live",
            args::live_args(&source.stream_url, &source.headers, seconds, &path.temp_file_path),
            Duration::from_secs(seconds) + self.config.timeout_grace,
            working_dir,
            cancel,
        )
        .await
    }

    async fn run_pass(
        &self,
        pass: &'static str,
        args: Vec<String>,
        timeout: Duration,
        working_dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<(), TranscodeError> {
        if cancel.is_cancelled() {
            return Err(TranscodeError::Cancelled);
        }

        debug!(pass, timeout_secs = timeout.as_secs(), "Running transcode pass");
        match self
            .runner
            .run(&args, timeout, Some(working_dir), cancel)
            .await
        {
            Ok(true) => Ok(()),
            Ok(false) => Err(TranscodeError::PassFailed { pass }),
            Err(source) => Err(TranscodeError::Process { pass, source }),
        }
    }
}

fn capture_window(source: &SourceResult) -> Result<(DateTime<Utc>, DateTime<Utc>), TranscodeError> {
    source
        .options
        .capture_window(&source.program_info)
        .ok_or_else(|| {
            TranscodeError::Precondition(format!(
                "margins {}s/{}s are out of range",
                source.options.start_delay.as_secs(),
                source.options.end_delay.as_secs()
            ))
        })
}

/// Seconds left to capture of `window` when starting at `now`. A capture
/// that starts late records only the remainder.
fn live_duration(window: (DateTime<Utc>, DateTime<Utc>), now: DateTime<Utc>) -> Option<u64> {
    let (start, end) = window;
    let begin = start.max(now);
    let seconds = (end - begin).num_seconds();
    (seconds > 0).then_some(seconds as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProcessError;
    use crate::recording::{ProgramInfo, RecordingOptions, ServiceKind, SourceType};
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[derive(Debug, Clone)]
    struct Call {
        args: Vec<String>,
        timeout: Duration,
        working_dir: Option<PathBuf>,
    }

    /// Answers each call with the next scripted result and, on success,
    /// creates the files the arguments name as outputs.
    struct ScriptedRunner {
        results: Mutex<Vec<Result<bool, ProcessError>>>,
        calls: Mutex<Vec<Call>>,
    }

    impl ScriptedRunner {
        fn new(results: Vec<Result<bool, ProcessError>>) -> Arc<Self> {
            Arc::new(Self {
                results: Mutex::new(results),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ProcessRunner for ScriptedRunner {
        async fn run(
            &self,
            args: &[String],
            timeout: Duration,
            working_dir: Option<&Path>,
            _cancel: &CancellationToken,
        ) -> Result<bool, ProcessError> {
            self.calls.lock().unwrap().push(Call {
                args: args.to_vec(),
                timeout,
                working_dir: working_dir.map(Path::to_path_buf),
            });
            let result = {
                let mut results = self.results.lock().unwrap();
                if results.is_empty() {
                    Ok(true)
                } else {
                    results.remove(0)
                }
            };
            if let Ok(true) = result {
                let dir = working_dir.map(Path::to_path_buf).unwrap_or_default();
                for pair in args.windows(2) {
                    if pair[0] == "copy" && !pair[1].starts_with('-') {
                        std::fs::write(dir.join(&pair[1]), b"chunk").unwrap();
                    }
                }
                std::fs::write(dir.join(args.last().unwrap()), b"media").unwrap();
            }
            result
        }
    }

    fn config() -> TranscodeConfig {
        TranscodeConfig {
            timeout_grace: Duration::from_secs(60),
            chunk_seconds: 300,
            offset: FixedOffset::east_opt(9 * 3600).unwrap(),
        }
    }

    fn source(kind: ServiceKind, time_free: bool, start: DateTime<Utc>, end: DateTime<Utc>) -> SourceResult {
        SourceResult {
            stream_url: "https://stream.test/playlist.m3u8".to_string(),
            headers: vec![("X-Radiko-AuthToken".to_string(), "abc".to_string())],
            program_info: ProgramInfo {
                service_kind: kind,
                program_id: "p1".to_string(),
                station_id: "TBS".to_string(),
                station_name: "TBS Radio".to_string(),
                area_id: "JP13".to_string(),
                title: "Night Talk".to_string(),
                subtitle: String::new(),
                performer: String::new(),
                description: String::new(),
                program_url: String::new(),
                start,
                end,
            },
            options: RecordingOptions {
                service_kind: kind,
                is_time_free: time_free,
                start_delay: Duration::ZERO,
                end_delay: Duration::ZERO,
                source_type: SourceType::Scheduled,
            },
        }
    }

    fn media_path(dir: &TempDir) -> MediaPath {
        MediaPath {
            temp_file_path: dir.path().join("p1_abc.m4a"),
            final_file_path: dir.path().join("save/TBS/Night Talk.m4a"),
            relative_path: PathBuf::from("TBS/Night Talk.m4a"),
        }
    }

    fn past_window() -> (DateTime<Utc>, DateTime<Utc>) {
        let start = Utc.with_ymd_and_hms(2026, 1, 5, 2, 0, 0).unwrap();
        (start, start + chrono::Duration::seconds(600))
    }

    #[tokio::test]
    async fn test_time_free_runs_fetch_then_concat() {
        let dir = TempDir::new().unwrap();
        let runner = ScriptedRunner::new(vec![]);
        let transcoder = Transcoder::new(runner.clone(), config());
        let (start, end) = past_window();
        let path = media_path(&dir);

        transcoder
            .record(&source(ServiceKind::Radiko, true, start, end), &path, &CancellationToken::new())
            .await
            .unwrap();

        let calls = runner.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].working_dir.as_deref(), Some(path.chunk_directory().as_path()));
        assert_eq!(calls[0].args.iter().filter(|a| *a == "-i").count(), 2);
        assert_eq!(calls[0].timeout, Duration::from_secs(660));
        assert!(calls[1].args.windows(2).any(|w| w[0] == "-f" && w[1] == "concat"));
        assert_eq!(
            calls[1].args.last().unwrap().as_str(),
            path.temp_file_path.to_str().unwrap()
        );
        assert!(path.temp_file_path.exists());
        assert!(!path.chunk_directory().exists());
    }

    #[tokio::test]
    async fn test_time_free_chunk_timestamps_use_configured_offset() {
        let dir = TempDir::new().unwrap();
        let runner = ScriptedRunner::new(vec![]);
        let transcoder = Transcoder::new(runner.clone(), config());
        let (start, end) = past_window();

        transcoder
            .record(&source(ServiceKind::Radiko, true, start, end), &media_path(&dir), &CancellationToken::new())
            .await
            .unwrap();

        let fetch = &runner.calls()[0].args;
        assert!(fetch.contains(&"https://stream.test/playlist.m3u8?seek=20260105110000&l=300".to_string()));
        assert!(fetch.contains(&"https://stream.test/playlist.m3u8?seek=20260105110500&l=300".to_string()));
    }

    #[tokio::test]
    async fn test_time_free_rejects_unsupported_service_without_running() {
        let dir = TempDir::new().unwrap();
        let runner = ScriptedRunner::new(vec![]);
        let transcoder = Transcoder::new(runner.clone(), config());
        let (start, end) = past_window();

        let err = transcoder
            .record(&source(ServiceKind::Radiru, true, start, end), &media_path(&dir), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, TranscodeError::Precondition(_)));
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_time_free_rejects_empty_url_and_inverted_window() {
        let dir = TempDir::new().unwrap();
        let runner = ScriptedRunner::new(vec![]);
        let transcoder = Transcoder::new(runner.clone(), config());
        let (start, end) = past_window();

        let mut empty_url = source(ServiceKind::Radiko, true, start, end);
        empty_url.stream_url = "  ".to_string();
        let err = transcoder
            .record(&empty_url, &media_path(&dir), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, TranscodeError::Precondition(_)));

        let inverted = source(ServiceKind::Radiko, true, end, start);
        let err = transcoder
            .record(&inverted, &media_path(&dir), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, TranscodeError::Precondition(_)));

        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_failed_fetch_pass_skips_concat() {
        let dir = TempDir::new().unwrap();
        let runner = ScriptedRunner::new(vec![Ok(false)]);
        let transcoder = Transcoder::new(runner.clone(), config());
        let (start, end) = past_window();

        let err = transcoder
            .record(&source(ServiceKind::Radiko, true, start, end), &media_path(&dir), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, TranscodeError::PassFailed { pass: "chunk fetch" }));
        assert_eq!(runner.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_timeout_is_a_transcode_failure() {
        let dir = TempDir::new().unwrap();
        let runner = ScriptedRunner::new(vec![Ok(true), Err(ProcessError::TimedOut(60))]);
        let transcoder = Transcoder::new(runner.clone(), config());
        let (start, end) = past_window();

        let err = transcoder
            .record(&source(ServiceKind::Radiko, true, start, end), &media_path(&dir), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            TranscodeError::Process {
                pass: "concat",
                source: ProcessError::TimedOut(60)
            }
        ));
    }

    #[tokio::test]
    async fn test_live_records_whole_future_window() {
        let dir = TempDir::new().unwrap();
        let runner = ScriptedRunner::new(vec![]);
        let transcoder = Transcoder::new(runner.clone(), config());
        let start = Utc::now() + chrono::Duration::hours(1);
        let end = start + chrono::Duration::minutes(30);
        let path = media_path(&dir);

        transcoder
            .record(&source(ServiceKind::Radiru, false, start, end), &path, &CancellationToken::new())
            .await
            .unwrap();

        let calls = runner.calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].args.windows(2).any(|w| w[0] == "-t" && w[1] == "1800"));
        assert!(calls[0].args.windows(2).any(|w| w[0] == "-movflags" && w[1] == "+faststart"));
        assert_eq!(calls[0].timeout, Duration::from_secs(1860));
    }

    #[tokio::test]
    async fn test_live_with_ended_window_is_rejected() {
        let dir = TempDir::new().unwrap();
        let runner = ScriptedRunner::new(vec![]);
        let transcoder = Transcoder::new(runner.clone(), config());
        let (start, end) = past_window();

        let err = transcoder
            .record(&source(ServiceKind::Radiko, false, start, end), &media_path(&dir), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, TranscodeError::Precondition(_)));
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_out_of_range_margin_is_rejected_without_running() {
        let dir = TempDir::new().unwrap();
        let runner = ScriptedRunner::new(vec![]);
        let transcoder = Transcoder::new(runner.clone(), config());
        let (start, end) = past_window();
        let mut source = source(ServiceKind::Radiko, true, start, end);
        source.options.start_delay = Duration::from_secs(10_u64.pow(13));

        let err = transcoder
            .record(&source, &media_path(&dir), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, TranscodeError::Precondition(_)));
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_token_stops_before_running() {
        let dir = TempDir::new().unwrap();
        let runner = ScriptedRunner::new(vec![]);
        let transcoder = Transcoder::new(runner.clone(), config());
        let (start, end) = past_window();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = transcoder
            .record(&source(ServiceKind::Radiko, true, start, end), &media_path(&dir), &cancel)
            .await
            .unwrap_err();

        assert!(err.is_cancelled());
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn test_live_duration_trims_late_start() {
        let start = Utc.with_ymd_and_hms(2026, 1, 5, 2, 0, 0).unwrap();
        let end = start + chrono::Duration::seconds(600);

        assert_eq!(live_duration((start, end), start - chrono::Duration::seconds(30)), Some(600));
        assert_eq!(live_duration((start, end), start + chrono::Duration::seconds(100)), Some(500));
        assert_eq!(live_duration((start, end), end), None);
    }
}
