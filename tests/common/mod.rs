// Shared in-process fakes for the integration suite.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;

use hdgrab::errors::{DownloadError, ProbeError};
use hdgrab::models::{DownloadRequest, Strategy};
use hdgrab::progress::RawProgressEvent;
use hdgrab::provider::{FetchedArtifact, MediaMetadata, MediaProvider, ProgressHook};
use hdgrab::verify::{FileProbe, StreamDimensions};

/// One scripted response, consumed per fetch in order.
pub enum Step {
    /// Provider error with this diagnostic text.
    Fail(&'static str),
    /// Write a file whose probed quality will be this value.
    Deliver(u32),
    /// Write a file the probe cannot read.
    DeliverCorrupt,
    /// Park until notified, then fail with a timeout.
    Block(Arc<Notify>),
}

pub struct ScriptedProvider {
    script: Mutex<VecDeque<Step>>,
    pub fetches: AtomicUsize,
    /// When set, stored `true` during every fetch. Lets a test trip the
    /// orchestrator's cancellation flag mid-run without timing games.
    pub trip_on_fetch: Mutex<Option<Arc<AtomicBool>>>,
}

impl ScriptedProvider {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            script: Mutex::new(steps.into()),
            fetches: AtomicUsize::new(0),
            trip_on_fetch: Mutex::new(None),
        }
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaProvider for ScriptedProvider {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn probe_metadata(
        &self,
        _url: &str,
        _strategy: &Strategy,
    ) -> Result<MediaMetadata, DownloadError> {
        Ok(MediaMetadata {
            id: "abc".to_string(),
            title: "Clip".to_string(),
            uploader: "tester".to_string(),
            duration_secs: 60,
            formats: Vec::new(),
        })
    }

    async fn fetch(
        &self,
        request: &DownloadRequest,
        strategy: &Strategy,
        hook: ProgressHook,
    ) -> Result<FetchedArtifact, DownloadError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if let Some(flag) = self.trip_on_fetch.lock().unwrap().as_ref() {
            flag.store(true, Ordering::SeqCst);
        }

        let step = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .expect("scripted provider ran out of steps");

        match step {
            Step::Fail(msg) => Err(DownloadError::Provider(msg.to_string())),
            Step::Block(gate) => {
                gate.notified().await;
                Err(DownloadError::NetworkTimeout)
            }
            Step::Deliver(quality) => {
                let path = request
                    .output_dir
                    .join(format!(".Clip.grab-{}.mp4", strategy.ordinal));
                std::fs::write(&path, quality.to_string()).unwrap();

                hook(RawProgressEvent::Downloading {
                    downloaded_bytes: 512,
                    total_bytes: Some(1024),
                    total_bytes_estimate: None,
                    speed: Some(256.0),
                    eta_secs: None,
                    filename: Some(path.to_string_lossy().to_string()),
                });
                hook(RawProgressEvent::Finished {
                    filename: Some(path.to_string_lossy().to_string()),
                });

                Ok(FetchedArtifact {
                    path,
                    title: "Clip".to_string(),
                    ext: "mp4".to_string(),
                })
            }
            Step::DeliverCorrupt => {
                let path = request
                    .output_dir
                    .join(format!(".Clip.grab-{}.mp4", strategy.ordinal));
                std::fs::write(&path, "corrupt").unwrap();
                Ok(FetchedArtifact {
                    path,
                    title: "Clip".to_string(),
                    ext: "mp4".to_string(),
                })
            }
        }
    }
}

/// Probe that reads the quality value the scripted provider wrote.
pub struct FakeProbe;

#[async_trait]
impl FileProbe for FakeProbe {
    async fn measure(&self, path: &Path) -> Result<StreamDimensions, ProbeError> {
        if !path.exists() {
            return Err(ProbeError::FileMissing(path.display().to_string()));
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| ProbeError::Unreadable(e.to_string()))?;
        let quality: u32 = content
            .trim()
            .parse()
            .map_err(|_| ProbeError::Unreadable("not a media file".to_string()))?;
        Ok(StreamDimensions {
            width: quality * 16 / 9,
            height: quality,
            bitrate_kbps: Some(quality),
        })
    }
}
