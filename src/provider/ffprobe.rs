// ffprobe shim: measures what actually landed on disk.

use std::path::Path;
use std::process::Command as StdCommand;
use std::process::Stdio;

use async_trait::async_trait;
use serde::Deserialize;

use crate::errors::ProbeError;
use crate::verify::{FileProbe, StreamDimensions};

use super::run_output_with_timeout;

const PROBE_TIMEOUT_SECS: u64 = 30;

pub struct FfprobeProbe {
    binary: String,
}

impl FfprobeProbe {
    pub fn new() -> Self {
        Self {
            binary: find_ffprobe(),
        }
    }

    pub fn is_available(&self) -> bool {
        StdCommand::new(&self.binary)
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }
}

impl Default for FfprobeProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FileProbe for FfprobeProbe {
    async fn measure(&self, path: &Path) -> Result<StreamDimensions, ProbeError> {
        if !path.exists() {
            return Err(ProbeError::FileMissing(path.display().to_string()));
        }
        if !self.is_available() {
            return Err(ProbeError::ToolNotFound(self.binary.clone()));
        }

        let args = vec![
            "-v".to_string(),
            "error".to_string(),
            "-show_entries".to_string(),
            "stream=codec_type,width,height,bit_rate".to_string(),
            "-show_entries".to_string(),
            "format=bit_rate".to_string(),
            "-of".to_string(),
            "json".to_string(),
            path.to_string_lossy().to_string(),
        ];

        let output = run_output_with_timeout(&self.binary, args, PROBE_TIMEOUT_SECS)
            .await
            .map_err(ProbeError::Unreadable)?;
        if !output.status.success() {
            return Err(ProbeError::Unreadable(
                String::from_utf8_lossy(&output.stderr).to_string(),
            ));
        }

        let report: ProbeReport = serde_json::from_slice(&output.stdout)
            .map_err(|e| ProbeError::Unreadable(format!("ffprobe JSON: {}", e)))?;

        let mut dims = StreamDimensions::default();
        for stream in &report.streams {
            match stream.codec_type.as_deref() {
                Some("video") => {
                    if let (Some(w), Some(h)) = (stream.width, stream.height) {
                        // Keep the largest stream when several are present.
                        if h > dims.height {
                            dims.width = w;
                            dims.height = h;
                        }
                    }
                }
                Some("audio") => {
                    if dims.bitrate_kbps.is_none() {
                        dims.bitrate_kbps = stream.bitrate_kbps();
                    }
                }
                _ => {}
            }
        }
        // Audio-only containers often report bitrate at format level only.
        if dims.bitrate_kbps.is_none() {
            dims.bitrate_kbps = report
                .format
                .as_ref()
                .and_then(|f| f.bit_rate.as_deref())
                .and_then(|b| b.parse::<u64>().ok())
                .map(|bps| (bps / 1000) as u32);
        }

        if dims.height == 0 && dims.bitrate_kbps.is_none() {
            return Err(ProbeError::Unreadable(
                "no measurable stream found".to_string(),
            ));
        }
        Ok(dims)
    }
}

fn find_ffprobe() -> String {
    let common_paths = vec![
        "/opt/homebrew/bin/ffprobe",
        "/usr/local/bin/ffprobe",
        "/usr/bin/ffprobe",
    ];
    for path in common_paths {
        if Path::new(path).exists() {
            return path.to_string();
        }
    }
    if let Ok(output) = StdCommand::new("which").arg("ffprobe").output() {
        if output.status.success() {
            if let Ok(path) = String::from_utf8(output.stdout) {
                let trimmed = path.trim();
                if !trimmed.is_empty() {
                    return trimmed.to_string();
                }
            }
        }
    }
    "ffprobe".to_string()
}

#[derive(Debug, Deserialize)]
struct ProbeReport {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    bit_rate: Option<String>,
}

impl ProbeStream {
    fn bitrate_kbps(&self) -> Option<u32> {
        self.bit_rate
            .as_deref()
            .and_then(|b| b.parse::<u64>().ok())
            .map(|bps| (bps / 1000) as u32)
    }
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    bit_rate: Option<String>,
}
