// ProgressTracker - lock-protected aggregation of raw provider events
//
// Providers report progress in heterogeneous shapes: some know the exact
// total, some only an estimate, some report speed, some leave it out. The
// tracker normalizes all of that into one `ProgressSnapshot` that a
// consumer can read without ever observing a half-updated state.

use std::sync::Mutex;

use serde::Serialize;

/// Lifecycle phase of the current attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadStatus {
    #[default]
    Idle,
    Downloading,
    Finished,
    Error,
}

/// Raw event as the provider reports it, before normalization.
#[derive(Debug, Clone)]
pub enum RawProgressEvent {
    Downloading {
        downloaded_bytes: u64,
        /// Exact total, when the provider knows it.
        total_bytes: Option<u64>,
        /// Estimate, used only while no exact total has been seen.
        total_bytes_estimate: Option<u64>,
        /// Bytes per second, when reported.
        speed: Option<f64>,
        /// Seconds remaining, when reported; derived otherwise.
        eta_secs: Option<f64>,
        filename: Option<String>,
    },
    Finished {
        filename: Option<String>,
    },
    Errored,
}

/// Immutable per-emission progress state. Always a copy, never a live
/// reference into the tracker.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProgressSnapshot {
    pub status: DownloadStatus,
    pub downloaded_bytes: u64,
    pub total_bytes: Option<u64>,
    /// Bytes per second.
    pub speed: Option<f64>,
    pub eta_secs: Option<f64>,
    pub filename: String,
}

impl ProgressSnapshot {
    pub fn percent(&self) -> Option<f32> {
        self.total_bytes.filter(|t| *t > 0).map(|t| {
            (self.downloaded_bytes as f64 / t as f64 * 100.0).min(100.0) as f32
        })
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.status, DownloadStatus::Finished | DownloadStatus::Error)
    }
}

#[derive(Default)]
struct TrackerState {
    snapshot: ProgressSnapshot,
    /// True once an exact (non-estimated) total has been reported.
    total_is_exact: bool,
}

/// Mutable, lock-protected progress aggregator for one attempt at a time.
///
/// `reset()` must run before the first event of each new attempt; the
/// orchestrator owns that ordering.
#[derive(Default)]
pub struct ProgressTracker {
    state: Mutex<TrackerState>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_event(&self, event: RawProgressEvent) {
        let mut guard = self.state.lock().unwrap();
        let state = &mut *guard;
        match event {
            RawProgressEvent::Downloading {
                downloaded_bytes,
                total_bytes,
                total_bytes_estimate,
                speed,
                eta_secs,
                filename,
            } => {
                let snap = &mut state.snapshot;
                snap.status = DownloadStatus::Downloading;
                if let Some(name) = filename {
                    snap.filename = name;
                }

                // Exact totals win over estimates; estimates never
                // overwrite an exact value from an earlier event.
                if let Some(total) = total_bytes {
                    snap.total_bytes = Some(total);
                    state.total_is_exact = true;
                } else if let Some(est) = total_bytes_estimate {
                    if !state.total_is_exact {
                        snap.total_bytes = Some(est);
                    }
                }

                let snap = &mut state.snapshot;
                // Late or duplicate events never roll the counter back.
                snap.downloaded_bytes = snap.downloaded_bytes.max(downloaded_bytes);
                snap.speed = speed.filter(|s| *s > 0.0);

                snap.eta_secs = eta_secs.or_else(|| match (snap.speed, snap.total_bytes) {
                    (Some(speed), Some(total)) => {
                        let remaining = total.saturating_sub(snap.downloaded_bytes);
                        Some((remaining as f64 / speed).max(0.0))
                    }
                    _ => None,
                });
            }
            RawProgressEvent::Finished { filename } => {
                let snap = &mut state.snapshot;
                snap.status = DownloadStatus::Finished;
                if let Some(name) = filename {
                    snap.filename = name;
                }
                // Terminal snapshot always reads 100% when the total is known.
                if let Some(total) = snap.total_bytes {
                    snap.downloaded_bytes = total;
                }
                snap.speed = None;
                snap.eta_secs = None;
            }
            RawProgressEvent::Errored => {
                state.snapshot.status = DownloadStatus::Error;
            }
        }
    }

    /// Deep copy of the current state, taken under the lock.
    pub fn snapshot(&self) -> ProgressSnapshot {
        self.state.lock().unwrap().snapshot.clone()
    }

    /// Return to a clean baseline before a new attempt starts.
    pub fn reset(&self) {
        *self.state.lock().unwrap() = TrackerState::default();
    }
}

/// Human-readable byte count.
pub fn format_bytes(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = 1024.0 * 1024.0;
    const GB: f64 = 1024.0 * 1024.0 * 1024.0;

    let b = bytes as f64;
    if b >= GB {
        format!("{:.2} GB", b / GB)
    } else if b >= MB {
        format!("{:.1} MB", b / MB)
    } else if b >= KB {
        format!("{:.1} KB", b / KB)
    } else {
        format!("{} B", bytes)
    }
}

/// Human-readable transfer rate.
pub fn format_speed(bytes_per_sec: f64) -> String {
    if bytes_per_sec <= 0.0 {
        return String::new();
    }
    format!("{}/s", format_bytes(bytes_per_sec as u64))
}

/// Human-readable remaining time.
pub fn format_eta(eta_secs: f64) -> String {
    if eta_secs <= 0.0 {
        return String::new();
    }
    let secs = eta_secs as u64;
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn downloading(downloaded: u64, total: Option<u64>, speed: Option<f64>) -> RawProgressEvent {
        RawProgressEvent::Downloading {
            downloaded_bytes: downloaded,
            total_bytes: total,
            total_bytes_estimate: None,
            speed,
            eta_secs: None,
            filename: None,
        }
    }

    #[test]
    fn test_snapshot_starts_idle() {
        let tracker = ProgressTracker::new();
        let snap = tracker.snapshot();
        assert_eq!(snap.status, DownloadStatus::Idle);
        assert_eq!(snap.downloaded_bytes, 0);
        assert!(snap.total_bytes.is_none());
    }

    #[test]
    fn test_eta_derived_from_speed_and_total() {
        let tracker = ProgressTracker::new();
        tracker.on_event(downloading(25, Some(100), Some(5.0)));
        let snap = tracker.snapshot();
        assert_eq!(snap.eta_secs, Some(15.0));
    }

    #[test]
    fn test_eta_absent_without_speed() {
        let tracker = ProgressTracker::new();
        tracker.on_event(downloading(25, Some(100), None));
        assert!(tracker.snapshot().eta_secs.is_none());
    }

    #[test]
    fn test_eta_absent_with_zero_speed() {
        let tracker = ProgressTracker::new();
        tracker.on_event(downloading(25, Some(100), Some(0.0)));
        assert!(tracker.snapshot().eta_secs.is_none());
    }

    #[test]
    fn test_eta_absent_without_total() {
        let tracker = ProgressTracker::new();
        tracker.on_event(downloading(25, None, Some(5.0)));
        assert!(tracker.snapshot().eta_secs.is_none());
    }

    #[test]
    fn test_reported_eta_preferred_over_derivation() {
        let tracker = ProgressTracker::new();
        tracker.on_event(RawProgressEvent::Downloading {
            downloaded_bytes: 25,
            total_bytes: Some(100),
            total_bytes_estimate: None,
            speed: Some(5.0),
            eta_secs: Some(42.0),
            filename: None,
        });
        assert_eq!(tracker.snapshot().eta_secs, Some(42.0));
    }

    #[test]
    fn test_estimate_never_overwrites_exact_total() {
        let tracker = ProgressTracker::new();
        tracker.on_event(downloading(10, Some(100), None));
        tracker.on_event(RawProgressEvent::Downloading {
            downloaded_bytes: 20,
            total_bytes: None,
            total_bytes_estimate: Some(250),
            speed: None,
            eta_secs: None,
            filename: None,
        });
        assert_eq!(tracker.snapshot().total_bytes, Some(100));
    }

    #[test]
    fn test_estimate_used_while_no_exact_total() {
        let tracker = ProgressTracker::new();
        tracker.on_event(RawProgressEvent::Downloading {
            downloaded_bytes: 20,
            total_bytes: None,
            total_bytes_estimate: Some(250),
            speed: None,
            eta_secs: None,
            filename: None,
        });
        assert_eq!(tracker.snapshot().total_bytes, Some(250));
    }

    #[test]
    fn test_downloaded_bytes_monotonic() {
        let tracker = ProgressTracker::new();
        tracker.on_event(downloading(50, Some(100), None));
        tracker.on_event(downloading(30, Some(100), None));
        assert_eq!(tracker.snapshot().downloaded_bytes, 50);
    }

    #[test]
    fn test_finished_forces_full_download() {
        let tracker = ProgressTracker::new();
        tracker.on_event(downloading(70, Some(100), Some(10.0)));
        tracker.on_event(RawProgressEvent::Finished { filename: None });
        let snap = tracker.snapshot();
        assert_eq!(snap.status, DownloadStatus::Finished);
        assert_eq!(snap.downloaded_bytes, 100);
        assert_eq!(snap.percent(), Some(100.0));
    }

    #[test]
    fn test_finished_without_total_keeps_bytes() {
        let tracker = ProgressTracker::new();
        tracker.on_event(downloading(70, None, None));
        tracker.on_event(RawProgressEvent::Finished { filename: None });
        assert_eq!(tracker.snapshot().downloaded_bytes, 70);
    }

    #[test]
    fn test_reset_returns_to_baseline() {
        let tracker = ProgressTracker::new();
        tracker.on_event(downloading(70, Some(100), Some(1.0)));
        tracker.reset();
        let snap = tracker.snapshot();
        assert_eq!(snap.status, DownloadStatus::Idle);
        assert_eq!(snap.downloaded_bytes, 0);
        assert!(snap.total_bytes.is_none());
        assert!(snap.filename.is_empty());
    }

    #[test]
    fn test_format_helpers() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MB");
        assert_eq!(format_speed(1024.0), "1.0 KB/s");
        assert_eq!(format_eta(90.0), "1m 30s");
        assert_eq!(format_eta(3700.0), "1h 1m");
        assert_eq!(format_eta(0.0), "");
    }
}
