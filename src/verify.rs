// QualityVerifier - post-download probe and accept/reject pipeline
//
// Format selectors are advisory: the provider may silently substitute a
// lower-quality stream, so the only trustworthy quality signal is measured
// from the produced file itself. Below-floor artifacts are deleted
// unconditionally and irreversibly; callers must not assume the file still
// exists after a rejection.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, info, warn};
use serde::Serialize;

use crate::errors::ProbeError;
use crate::filename::sanitize_title;
use crate::models::{DownloadRequest, MediaKind, QualityVerdict, RejectReason};
use crate::provider::FetchedArtifact;

/// Measured properties of the first video/audio streams in a file.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct StreamDimensions {
    pub width: u32,
    pub height: u32,
    /// Audio stream bitrate in kbps, when readable.
    pub bitrate_kbps: Option<u32>,
}

/// Collaborator that reads actual stream dimensions from a file on disk.
#[async_trait]
pub trait FileProbe: Send + Sync {
    async fn measure(&self, path: &Path) -> Result<StreamDimensions, ProbeError>;
}

pub struct QualityVerifier {
    probe: Arc<dyn FileProbe>,
}

impl QualityVerifier {
    pub fn new(probe: Arc<dyn FileProbe>) -> Self {
        Self { probe }
    }

    /// Judge one fetched artifact against the request's quality floor.
    ///
    /// `allow_below_floor` is set by the orchestrator for the lenient-mode
    /// last-resort strategy only; it finalizes below-floor output instead
    /// of deleting it. A probe failure is always a rejection, never a
    /// silent accept, and repeated calls on an already-deleted path keep
    /// returning the probe-failed rejection.
    pub async fn verify(
        &self,
        artifact: &FetchedArtifact,
        request: &DownloadRequest,
        allow_below_floor: bool,
    ) -> QualityVerdict {
        let dims = match self.probe.measure(&artifact.path).await {
            Ok(dims) => dims,
            Err(e) => {
                warn!("probe failed for {}: {}", artifact.path.display(), e);
                self.discard(artifact);
                return QualityVerdict::Rejected {
                    reason: RejectReason::ProbeFailed,
                    measured: None,
                };
            }
        };

        let measured = match request.kind {
            MediaKind::Video => (dims.height > 0).then_some(dims.height),
            MediaKind::Audio => dims.bitrate_kbps,
        };
        debug!(
            "probed {}: {}x{} bitrate {:?}",
            artifact.path.display(),
            dims.width,
            dims.height,
            dims.bitrate_kbps
        );

        // Floor 0 means best effort: accept whatever arrived.
        if request.quality_floor == 0 {
            return self.finalize(artifact, request, measured.unwrap_or(0));
        }

        let Some(measured) = measured else {
            warn!(
                "cannot judge {} against floor {}: no measurable quality",
                artifact.path.display(),
                request.quality_floor
            );
            self.discard(artifact);
            return QualityVerdict::Rejected {
                reason: RejectReason::ProbeFailed,
                measured: None,
            };
        };

        if measured >= request.quality_floor || allow_below_floor {
            self.finalize(artifact, request, measured)
        } else {
            info!(
                "rejecting {}: measured {} below floor {}",
                artifact.path.display(),
                measured,
                request.quality_floor
            );
            self.discard(artifact);
            QualityVerdict::Rejected {
                reason: RejectReason::BelowFloor,
                measured: Some(measured),
            }
        }
    }

    /// Rename from the temporary working name to the final
    /// `{title}.{ext}` destination.
    fn finalize(
        &self,
        artifact: &FetchedArtifact,
        request: &DownloadRequest,
        measured: u32,
    ) -> QualityVerdict {
        let final_name = format!("{}.{}", sanitize_title(&artifact.title), artifact.ext);
        let final_path = request.output_dir.join(final_name);

        if let Err(e) = std::fs::rename(&artifact.path, &final_path) {
            warn!(
                "failed to finalize {} -> {}: {}",
                artifact.path.display(),
                final_path.display(),
                e
            );
            self.discard(artifact);
            return QualityVerdict::Rejected {
                reason: RejectReason::ProbeFailed,
                measured: Some(measured),
            };
        }

        info!("accepted {} at quality {}", final_path.display(), measured);
        QualityVerdict::Accepted {
            path: final_path,
            measured,
        }
    }

    fn discard(&self, artifact: &FetchedArtifact) {
        if artifact.path.exists() {
            if let Err(e) = std::fs::remove_file(&artifact.path) {
                warn!("failed to delete {}: {}", artifact.path.display(), e);
            } else {
                info!("deleted {}", artifact.path.display());
            }
        }
    }
}
