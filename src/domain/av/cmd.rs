use super::graph::Invocation;
use crate::error::CompositingError;
use async_trait::async_trait;
use std::path::Path;
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

const STDERR_TAIL: usize = 800;

/// External compositing engine: runs invocations and measures media.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Compositor: Send + Sync {
    async fn run(&self, invocation: &Invocation) -> Result<(), CompositingError>;

    /// Duration of a media file in seconds
    async fn probe_duration(&self, media: &Path) -> Result<f64, CompositingError>;
}

/// Runs ffmpeg / ffprobe as child processes, each bounded by `timeout`.
#[derive(Debug, Clone)]
pub struct FfmpegCompositor {
    timeout: Duration,
}

impl FfmpegCompositor {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    async fn output(
        &self,
        program: &'static str,
        command: &mut Command,
    ) -> Result<Output, CompositingError> {
        // dropping the future on timeout or cancellation kills the child
        command.stdin(Stdio::null()).kill_on_drop(true);
        let output = match tokio::time::timeout(self.timeout, command.output()).await {
            Err(_) => {
                return Err(CompositingError::Timeout {
                    program,
                    timeout: self.timeout,
                })
            }
            Ok(Err(source)) => return Err(CompositingError::Spawn { program, source }),
            Ok(Ok(output)) => output,
        };
        if !output.status.success() {
            return Err(CompositingError::Failed {
                program,
                status: output.status.to_string(),
                stderr: stderr_tail(&output.stderr),
            });
        }
        Ok(output)
    }
}

#[async_trait]
impl Compositor for FfmpegCompositor {
    async fn run(&self, invocation: &Invocation) -> Result<(), CompositingError> {
        invocation.validate()?;
        let args = invocation.args();
        debug!(?args, "running ffmpeg");
        let mut command = Command::new("ffmpeg");
        command.args(&args);
        self.output("ffmpeg", &mut command).await?;
        Ok(())
    }

    async fn probe_duration(&self, media: &Path) -> Result<f64, CompositingError> {
        let mut command = Command::new("ffprobe");
        command
            .arg("-v")
            .arg("error")
            .arg("-show_entries")
            .arg("format=duration")
            .arg("-of")
            .arg("default=noprint_wrappers=1:nokey=1")
            .arg(media);
        let output = self.output("ffprobe", &mut command).await?;
        parse_duration(&output.stdout).map_err(|reason| CompositingError::Probe {
            path: media.to_path_buf(),
            reason,
        })
    }
}

fn parse_duration(stdout: &[u8]) -> Result<f64, String> {
    let text = String::from_utf8_lossy(stdout);
    let text = text.trim();
    let seconds: f64 = text
        .parse()
        .map_err(|_| format!("unparsable duration {:?}", text))?;
    if !seconds.is_finite() || seconds < 0.0 {
        return Err(format!("invalid duration {}", seconds));
    }
    Ok(seconds)
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let text = text.trim();
    match text.char_indices().rev().nth(STDERR_TAIL) {
        Some((cut, _)) => format!("...{}", &text[cut..]),
        None => text.to_string(),
    }
}
