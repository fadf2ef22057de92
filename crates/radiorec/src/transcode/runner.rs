use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::ProcessError;

/// Runs the external transcoding binary.
///
/// `Ok(true)` is a successful exit, `Ok(false)` any other exit status.
/// Timeouts and cancellation are errors so callers can tell them apart.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn run(
        &self,
        args: &[String],
        timeout: Duration,
        working_dir: Option<&Path>,
        cancel: &CancellationToken,
    ) -> Result<bool, ProcessError>;
}

/// [`ProcessRunner`] backed by a locally installed `ffmpeg`.
pub struct FfmpegRunner {
    program: String,
}

impl FfmpegRunner {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

/// Keeps only the end of a long stderr capture.
fn stderr_tail(stderr: &[u8]) -> String {
    const MAX_CHARS: usize = 2000;
    let text = String::from_utf8_lossy(stderr);
    let text = text.trim();
    let skip = text.chars().count().saturating_sub(MAX_CHARS);
    text.chars().skip(skip).collect()
}

#[async_trait]
impl ProcessRunner for FfmpegRunner {
    async fn run(
        &self,
        args: &[String],
        timeout: Duration,
        working_dir: Option<&Path>,
        cancel: &CancellationToken,
    ) -> Result<bool, ProcessError> {
        let mut command = Command::new(&self.program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = working_dir {
            command.current_dir(dir);
        }

        debug!(program = %self.program, arg_count = args.len(), "Spawning process");
        let child = command.spawn().map_err(|e| ProcessError::Spawn {
            program: self.program.clone(),
            source: e,
        })?;

        // Dropping the output future drops the child, which kills it.
        tokio::select! {
            _ = cancel.cancelled() => Err(ProcessError::Cancelled),
            result = tokio::time::timeout(timeout, child.wait_with_output()) => match result {
                Err(_) => Err(ProcessError::TimedOut(timeout.as_secs())),
                Ok(Err(e)) => Err(ProcessError::Wait {
                    program: self.program.clone(),
                    source: e,
                }),
                Ok(Ok(output)) => {
                    if !output.status.success() {
                        warn!(
                            program = %self.program,
                            status = %output.status,
                            stderr = %stderr_tail(&output.stderr),
                            "Process exited with failure"
                        );
                    }
                    Ok(output.status.success())
                }
            },
        }
    }
}
