// MediaProvider abstraction and external-tool shims
//
// The core orchestrates against these traits only; the yt-dlp and ffprobe
// shims are thin process wrappers with no algorithmic content of their own.

pub mod ffprobe;
pub mod ytdlp;

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncReadExt;
use tokio::process::Command as TokioCommand;
use tokio::time::{timeout, Duration};

use crate::errors::DownloadError;
use crate::models::{DownloadRequest, Strategy};
use crate::progress::RawProgressEvent;

pub use ffprobe::FfprobeProbe;
pub use ytdlp::YtDlpProvider;

/// One available rendition as reported by metadata extraction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MediaFormat {
    pub format_id: String,
    pub ext: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub vcodec: Option<String>,
    pub acodec: Option<String>,
    pub filesize: Option<u64>,
    pub filesize_approx: Option<u64>,
    /// Audio bitrate in kbps.
    pub abr: Option<f32>,
}

impl MediaFormat {
    pub fn effective_size(&self) -> Option<u64> {
        self.filesize.or(self.filesize_approx)
    }
}

/// Metadata extracted without downloading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaMetadata {
    pub id: String,
    pub title: String,
    pub uploader: String,
    pub duration_secs: u64,
    pub formats: Vec<MediaFormat>,
}

impl MediaMetadata {
    /// Highest offered vertical resolution, if any format reports one.
    pub fn max_height(&self) -> Option<u32> {
        self.formats.iter().filter_map(|f| f.height).max()
    }
}

/// A file the provider wrote into the output directory under a temporary
/// working name. The verifier decides whether it is renamed or deleted.
#[derive(Debug, Clone)]
pub struct FetchedArtifact {
    pub path: PathBuf,
    pub title: String,
    /// Container extension of the final artifact ("mp4", "mp3").
    pub ext: String,
}

/// Callback fed with raw progress events during one fetch attempt.
pub type ProgressHook = Arc<dyn Fn(RawProgressEvent) + Send + Sync>;

/// External extraction/download engine, tried once per strategy.
#[async_trait]
pub trait MediaProvider: Send + Sync {
    /// Name for logging.
    fn name(&self) -> &'static str;

    /// Whether the underlying capability is present on this system.
    fn is_available(&self) -> bool;

    /// Extract metadata without downloading.
    async fn probe_metadata(
        &self,
        url: &str,
        strategy: &Strategy,
    ) -> Result<MediaMetadata, DownloadError>;

    /// Download under one strategy, writing a temporarily named file into
    /// the request's output directory and reporting progress through the
    /// hook. Errors carry diagnostic text for classification.
    async fn fetch(
        &self,
        request: &DownloadRequest,
        strategy: &Strategy,
        hook: ProgressHook,
    ) -> Result<FetchedArtifact, DownloadError>;
}

/// Run an external command with a hard timeout, capturing both streams.
pub(crate) async fn run_output_with_timeout(
    program: &str,
    args: Vec<String>,
    timeout_secs: u64,
) -> Result<std::process::Output, String> {
    let mut child = TokioCommand::new(program)
        .args(&args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| format!("Failed to start {}: {}", program, e))?;

    let mut stdout_pipe = child
        .stdout
        .take()
        .ok_or_else(|| format!("Failed to capture stdout from {}", program))?;
    let mut stderr_pipe = child
        .stderr
        .take()
        .ok_or_else(|| format!("Failed to capture stderr from {}", program))?;

    let stdout_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        stdout_pipe
            .read_to_end(&mut buf)
            .await
            .map_err(|e| format!("Failed to read stdout: {}", e))?;
        Ok::<Vec<u8>, String>(buf)
    });
    let stderr_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        stderr_pipe
            .read_to_end(&mut buf)
            .await
            .map_err(|e| format!("Failed to read stderr: {}", e))?;
        Ok::<Vec<u8>, String>(buf)
    });

    match timeout(Duration::from_secs(timeout_secs), child.wait()).await {
        Ok(status_res) => {
            let status =
                status_res.map_err(|e| format!("Failed to wait for {}: {}", program, e))?;
            let stdout = stdout_task
                .await
                .map_err(|e| format!("stdout task failed: {}", e))??;
            let stderr = stderr_task
                .await
                .map_err(|e| format!("stderr task failed: {}", e))??;
            Ok(std::process::Output {
                status,
                stdout,
                stderr,
            })
        }
        Err(_) => {
            let _ = child.kill().await;
            stdout_task.abort();
            stderr_task.abort();
            Err(format!("Timed out after {}s", timeout_secs))
        }
    }
}
