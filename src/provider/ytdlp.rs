// yt-dlp shim: renders strategies into CLI invocations and turns the
// tool's textual progress output into RawProgressEvent values.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::process::Command as StdCommand;

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command as TokioCommand;

use crate::errors::DownloadError;
use crate::filename::sanitize_title;
use crate::models::{Credential, DownloadRequest, FormatSpec, MediaKind, Strategy};
use crate::progress::RawProgressEvent;

use super::{run_output_with_timeout, FetchedArtifact, MediaFormat, MediaMetadata, MediaProvider, ProgressHook};

const METADATA_TIMEOUT_SECS: u64 = 60;

pub struct YtDlpProvider {
    binary: String,
}

impl YtDlpProvider {
    pub fn new() -> Self {
        Self {
            binary: find_ytdlp(),
        }
    }

    /// Client and credential flags for one strategy.
    fn strategy_args(&self, strategy: &Strategy) -> Vec<String> {
        let mut args = Vec::new();

        args.push("--extractor-args".to_string());
        args.push(format!("youtube:player_client={}", strategy.client));

        match &strategy.credential {
            Credential::None => {}
            Credential::CookieStore(store) => {
                args.push("--cookies-from-browser".to_string());
                args.push(store.clone());
            }
            Credential::Token(token) => {
                args.push("--extractor-args".to_string());
                args.push(format!(
                    "youtube:po_token={}.gvs+{}",
                    strategy.client, token
                ));
            }
        }

        args
    }
}

impl Default for YtDlpProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaProvider for YtDlpProvider {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    fn is_available(&self) -> bool {
        StdCommand::new(&self.binary)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    async fn probe_metadata(
        &self,
        url: &str,
        strategy: &Strategy,
    ) -> Result<MediaMetadata, DownloadError> {
        let mut args = vec![
            "-J".to_string(),
            "--no-download".to_string(),
            "--no-playlist".to_string(),
        ];
        args.extend(self.strategy_args(strategy));
        args.push(url.to_string());

        let output = run_output_with_timeout(&self.binary, args, METADATA_TIMEOUT_SECS)
            .await
            .map_err(DownloadError::ExecutionError)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            return Err(DownloadError::Provider(stderr));
        }

        let dump: MetadataDump = serde_json::from_slice(&output.stdout)
            .map_err(|e| DownloadError::ParseError(format!("metadata JSON: {}", e)))?;
        Ok(dump.into_metadata())
    }

    async fn fetch(
        &self,
        request: &DownloadRequest,
        strategy: &Strategy,
        hook: ProgressHook,
    ) -> Result<FetchedArtifact, DownloadError> {
        if !self.is_available() {
            return Err(DownloadError::ToolNotFound(self.binary.clone()));
        }

        // Title up front so the working file carries it; the period prefix
        // keeps an in-flight attempt from clobbering an accepted file of
        // the same title.
        let metadata = self.probe_metadata(&request.url, strategy).await?;
        let title = sanitize_title(&metadata.title);
        let stem = format!(".{}.grab-{}", title, strategy.ordinal);
        let outtmpl = request.output_dir.join(format!("{}.%(ext)s", stem));

        let mut args = vec![
            "--newline".to_string(),
            "--no-playlist".to_string(),
            "--no-part".to_string(),
            "-f".to_string(),
            render_selector(&strategy.format),
            "-o".to_string(),
            outtmpl.to_string_lossy().to_string(),
        ];
        if strategy.format.kind == MediaKind::Video {
            args.push("--merge-output-format".to_string());
            args.push("mp4".to_string());
        }
        args.extend(self.strategy_args(strategy));
        args.push(request.url.clone());

        log::debug!("yt-dlp invocation: {} {:?}", self.binary, args);

        let mut child = TokioCommand::new(&self.binary)
            .args(&args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| DownloadError::ExecutionError(format!("Failed to start yt-dlp: {}", e)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| DownloadError::ExecutionError("Failed to capture stdout".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| DownloadError::ExecutionError("Failed to capture stderr".to_string()))?;

        let line_hook = hook.clone();
        let stdout_task = tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if let Some(event) = parse_progress_line(&line) {
                    line_hook(event);
                }
            }
        });
        let stderr_task = tokio::spawn(async move {
            let mut collected = String::new();
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                collected.push_str(&line);
                collected.push('\n');
            }
            collected
        });

        let status = child
            .wait()
            .await
            .map_err(|e| DownloadError::ExecutionError(format!("Failed to wait for yt-dlp: {}", e)))?;
        let _ = stdout_task.await;
        let stderr_text = stderr_task.await.unwrap_or_default();

        if !status.success() {
            return Err(DownloadError::Provider(stderr_text));
        }

        let path = locate_artifact(&request.output_dir, &stem).ok_or_else(|| {
            DownloadError::ExecutionError(format!(
                "yt-dlp reported success but no file matches {}.*",
                stem
            ))
        })?;
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_string())
            .unwrap_or_else(|| default_ext(request.kind).to_string());

        hook(RawProgressEvent::Finished {
            filename: Some(path.to_string_lossy().to_string()),
        });

        Ok(FetchedArtifact { path, title, ext })
    }
}

/// Render a format constraint into yt-dlp selector grammar.
pub fn render_selector(format: &FormatSpec) -> String {
    match format.kind {
        MediaKind::Audio => {
            if let Some(min) = format.min_bitrate {
                format!("ba[abr>={}]/ba/b", min)
            } else {
                "ba/b".to_string()
            }
        }
        MediaKind::Video => {
            let mut video = "bv*".to_string();
            let mut caps = Vec::new();
            if let Some(min) = format.min_height {
                caps.push(format!("height>={}", min));
            }
            if let Some(max) = format.max_height {
                caps.push(format!("height<={}", max));
            }
            if let Some(codec) = &format.preferred_codec {
                caps.push(format!("vcodec^={}", codec.selector_prefix()));
            }
            if !caps.is_empty() {
                video.push('[');
                video.push_str(&caps.join("]["));
                video.push(']');
            }
            if caps.is_empty() {
                "bv*+ba/best".to_string()
            } else {
                // Merged best streams under the caps, falling back to a
                // single muxed file meeting the same height bound.
                let fallback = match format.min_height {
                    Some(min) => format!("b[height>={}]", min),
                    None => "best".to_string(),
                };
                format!("{}+ba/{}", video, fallback)
            }
        }
    }
}

fn default_ext(kind: MediaKind) -> &'static str {
    match kind {
        MediaKind::Video => "mp4",
        MediaKind::Audio => "m4a",
    }
}

/// Newest file in `dir` whose name starts with the working stem.
fn locate_artifact(dir: &Path, stem: &str) -> Option<PathBuf> {
    let entries = std::fs::read_dir(dir).ok()?;
    let mut best: Option<(std::time::SystemTime, PathBuf)> = None;
    for entry in entries.flatten() {
        let path = entry.path();
        let name = match path.file_name().and_then(|n| n.to_str()) {
            Some(n) => n.to_string(),
            None => continue,
        };
        if !name.starts_with(stem) || !path.is_file() {
            continue;
        }
        let modified = entry
            .metadata()
            .and_then(|m| m.modified())
            .unwrap_or(std::time::SystemTime::UNIX_EPOCH);
        if best.as_ref().map(|(t, _)| modified > *t).unwrap_or(true) {
            best = Some((modified, path));
        }
    }
    best.map(|(_, p)| p)
}

// Find yt-dlp executable in common paths
fn find_ytdlp() -> String {
    let common_paths = vec![
        "/opt/homebrew/bin/yt-dlp",
        "/usr/local/bin/yt-dlp",
        "/usr/bin/yt-dlp",
    ];

    for path in common_paths {
        if Path::new(path).exists() {
            return path.to_string();
        }
    }

    if let Ok(output) = StdCommand::new("which").arg("yt-dlp").output() {
        if output.status.success() {
            if let Ok(path) = String::from_utf8(output.stdout) {
                let trimmed = path.trim();
                if !trimmed.is_empty() {
                    return trimmed.to_string();
                }
            }
        }
    }

    "yt-dlp".to_string()
}

/// Parse one yt-dlp stdout line into a progress event.
/// Typical line:
/// `[download]   6.2% of ~ 343.72MiB at  420.30KiB/s ETA 12:32`
pub fn parse_progress_line(line: &str) -> Option<RawProgressEvent> {
    lazy_static::lazy_static! {
        static ref PROGRESS_RE: Regex = Regex::new(
            r"\[download\]\s+(\d+\.?\d*)%\s+of\s+(~?)\s*(\d+\.?\d*)\s*(\w+)\s+at\s+(\d+\.?\d*)\s*(\w+)/s(?:\s+ETA\s+(\S+))?"
        ).unwrap();
        static ref DEST_RE: Regex = Regex::new(r"\[download\]\s+Destination:\s+(.+)").unwrap();
        static ref ALREADY_RE: Regex =
            Regex::new(r"\[download\]\s+(.+)\s+has already been downloaded").unwrap();
    }

    if let Some(caps) = PROGRESS_RE.captures(line) {
        let percent: f64 = caps.get(1)?.as_str().parse().ok()?;
        let estimate = !caps.get(2)?.as_str().is_empty();
        let total = parse_size(caps.get(3)?.as_str(), caps.get(4)?.as_str())?;
        let speed = parse_size(caps.get(5)?.as_str(), caps.get(6)?.as_str())? as f64;
        let eta_secs = caps.get(7).and_then(|m| parse_clock(m.as_str()));

        let downloaded = (total as f64 * percent / 100.0) as u64;
        let (total_bytes, total_bytes_estimate) = if estimate {
            (None, Some(total))
        } else {
            (Some(total), None)
        };

        return Some(RawProgressEvent::Downloading {
            downloaded_bytes: downloaded,
            total_bytes,
            total_bytes_estimate,
            speed: Some(speed),
            eta_secs,
            filename: None,
        });
    }

    if let Some(caps) = DEST_RE.captures(line) {
        return Some(RawProgressEvent::Downloading {
            downloaded_bytes: 0,
            total_bytes: None,
            total_bytes_estimate: None,
            speed: None,
            eta_secs: None,
            filename: Some(caps.get(1)?.as_str().trim().to_string()),
        });
    }

    if let Some(caps) = ALREADY_RE.captures(line) {
        return Some(RawProgressEvent::Finished {
            filename: Some(caps.get(1)?.as_str().trim().to_string()),
        });
    }

    None
}

/// "343.72" + "MiB" to bytes.
fn parse_size(value: &str, unit: &str) -> Option<u64> {
    let v: f64 = value.parse().ok()?;
    let mult = match unit {
        "B" => 1.0,
        "KiB" => 1024.0,
        "MiB" => 1024.0 * 1024.0,
        "GiB" => 1024.0 * 1024.0 * 1024.0,
        "KB" => 1000.0,
        "MB" => 1_000_000.0,
        "GB" => 1_000_000_000.0,
        _ => return None,
    };
    Some((v * mult) as u64)
}

/// "12:32" or "1:02:03" to seconds.
fn parse_clock(clock: &str) -> Option<f64> {
    let parts: Vec<&str> = clock.split(':').collect();
    let mut secs = 0u64;
    for part in &parts {
        secs = secs * 60 + part.parse::<u64>().ok()?;
    }
    if parts.is_empty() || parts.len() > 3 {
        return None;
    }
    Some(secs as f64)
}

#[derive(Debug, Deserialize)]
struct MetadataDump {
    id: Option<String>,
    title: Option<String>,
    uploader: Option<String>,
    duration: Option<f64>,
    #[serde(default)]
    formats: Vec<FormatDump>,
}

#[derive(Debug, Deserialize)]
struct FormatDump {
    format_id: Option<String>,
    ext: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    vcodec: Option<String>,
    acodec: Option<String>,
    filesize: Option<u64>,
    filesize_approx: Option<u64>,
    abr: Option<f32>,
}

impl MetadataDump {
    fn into_metadata(self) -> MediaMetadata {
        MediaMetadata {
            id: self.id.unwrap_or_default(),
            title: self.title.unwrap_or_else(|| "untitled".to_string()),
            uploader: self.uploader.unwrap_or_default(),
            duration_secs: self.duration.unwrap_or(0.0) as u64,
            formats: self
                .formats
                .into_iter()
                .map(|f| MediaFormat {
                    format_id: f.format_id.unwrap_or_default(),
                    ext: f.ext.unwrap_or_default(),
                    width: f.width,
                    height: f.height,
                    vcodec: f.vcodec.filter(|v| v != "none"),
                    acodec: f.acodec.filter(|a| a != "none"),
                    filesize: f.filesize,
                    filesize_approx: f.filesize_approx,
                    abr: f.abr,
                })
                .collect(),
        }
    }
}
