// Common data models for the download pipeline

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// What kind of media the caller wants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaKind {
    Video,
    Audio,
}

/// How a below-floor result from the last-resort strategy is handled.
///
/// `Strict` rejects (and deletes) anything below the quality floor.
/// `Lenient` keeps the file but reports it as `AcceptedBelowFloor`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AcceptanceMode {
    #[default]
    Strict,
    Lenient,
}

/// Immutable snapshot of the credentials usable for one request.
///
/// Captured once at request-construction time; the catalog omits strategies
/// whose credential source is not present here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CredentialSnapshot {
    /// Named browser cookie stores, in preference order (e.g. "chrome").
    pub cookie_stores: Vec<String>,
    /// Opaque provider auth token, if one is configured.
    pub auth_token: Option<String>,
}

impl CredentialSnapshot {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn new(cookie_stores: Vec<String>, auth_token: Option<String>) -> Self {
        Self {
            cookie_stores,
            auth_token,
        }
    }

    pub fn has_cookies(&self) -> bool {
        !self.cookie_stores.is_empty()
    }
}

/// One download job. Immutable once submitted.
///
/// `quality_floor` is the minimum acceptable vertical resolution in pixels
/// for video, or bitrate in kbps for audio. 0 means "best effort": whatever
/// arrives is accepted without verification against a floor.
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub url: String,
    pub output_dir: PathBuf,
    pub kind: MediaKind,
    pub quality_floor: u32,
    /// Preferred ceiling (e.g. stop at 1080 even if 4K is offered).
    pub quality_target: Option<u32>,
    pub mode: AcceptanceMode,
    pub credentials: CredentialSnapshot,
}

impl DownloadRequest {
    pub fn video(url: impl Into<String>, quality_floor: u32) -> Self {
        Self {
            url: url.into(),
            output_dir: default_output_dir(),
            kind: MediaKind::Video,
            quality_floor,
            quality_target: None,
            mode: AcceptanceMode::Strict,
            credentials: CredentialSnapshot::none(),
        }
    }

    pub fn audio(url: impl Into<String>, floor_kbps: u32) -> Self {
        Self {
            kind: MediaKind::Audio,
            ..Self::video(url, floor_kbps)
        }
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn with_mode(mut self, mode: AcceptanceMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_target(mut self, target: u32) -> Self {
        self.quality_target = Some(target);
        self
    }

    pub fn with_credentials(mut self, credentials: CredentialSnapshot) -> Self {
        self.credentials = credentials;
        self
    }
}

fn default_output_dir() -> PathBuf {
    dirs::download_dir().unwrap_or_else(|| PathBuf::from("."))
}

/// How a strategy presents itself to the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClientIdentity {
    /// Mobile client; historically the least likely to trip anti-bot checks.
    Android,
    Web,
    WebSafari,
    TvEmbedded,
}

impl fmt::Display for ClientIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Android => write!(f, "android"),
            Self::Web => write!(f, "web"),
            Self::WebSafari => write!(f, "web_safari"),
            Self::TvEmbedded => write!(f, "tv_embedded"),
        }
    }
}

/// Credential attached to one strategy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Credential {
    None,
    /// Named browser cookie store (e.g. "chrome").
    CookieStore(String),
    /// Opaque auth token forwarded to the provider.
    Token(String),
}

impl Credential {
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }
}

/// Preferred video codec for compatibility-sensitive callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Codec {
    H264,
    Vp9,
    Av1,
    Aac,
    Opus,
}

impl Codec {
    /// Codec-string prefix as stream metadata reports it.
    pub fn selector_prefix(&self) -> &'static str {
        match self {
            Self::H264 => "avc1",
            Self::Vp9 => "vp9",
            Self::Av1 => "av01",
            Self::Aac => "mp4a",
            Self::Opus => "opus",
        }
    }
}

/// Declarative stream-selection rule, strongly typed.
///
/// Rendering into the provider's selector grammar happens inside the
/// provider shim; the core only manipulates these fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatSpec {
    pub kind: MediaKind,
    /// Minimum vertical resolution the selector should insist on.
    pub min_height: Option<u32>,
    /// Ceiling, for callers that do not want 4K when 1080p suffices.
    pub max_height: Option<u32>,
    /// Minimum audio bitrate in kbps (audio requests only).
    pub min_bitrate: Option<u32>,
    pub preferred_codec: Option<Codec>,
    /// Target container extension ("mp4", "mp3").
    pub container: Option<String>,
}

impl FormatSpec {
    pub fn video_floor(min_height: Option<u32>, max_height: Option<u32>) -> Self {
        Self {
            kind: MediaKind::Video,
            min_height,
            max_height,
            min_bitrate: None,
            preferred_codec: None,
            container: Some("mp4".to_string()),
        }
    }

    pub fn audio_floor(min_bitrate: Option<u32>) -> Self {
        Self {
            kind: MediaKind::Audio,
            min_height: None,
            max_height: None,
            min_bitrate,
            preferred_codec: None,
            container: Some("mp3".to_string()),
        }
    }

    pub fn with_codec(mut self, codec: Codec) -> Self {
        self.preferred_codec = Some(codec);
        self
    }

    /// True when this spec places no lower bound on quality.
    pub fn is_uncapped(&self) -> bool {
        self.min_height.is_none() && self.min_bitrate.is_none()
    }
}

/// One concrete extraction attempt configuration.
///
/// Pure value object, generated fresh per request by the catalog and never
/// mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Strategy {
    /// 1-based position in the attempt order.
    pub ordinal: usize,
    pub client: ClientIdentity,
    pub credential: Credential,
    pub format: FormatSpec,
    /// Human-readable label for logs and outcome reports.
    pub description: String,
    /// Set on the last-resort entry whose selector ignores the floor.
    pub may_violate_floor: bool,
}

/// Error classification driving the orchestrator's continue/abort decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ErrorClass {
    /// No provider error (success, or a post-download quality rejection).
    #[default]
    None,
    /// Strategy-level failure; the next strategy may still work.
    Transient,
    /// Content-level failure; no strategy will help.
    Permanent,
    /// The requested format is not offered under this configuration.
    UnavailableFormat,
}

/// Record of one strategy attempt, success or failure.
#[derive(Debug, Clone, Serialize)]
pub struct AttemptOutcome {
    pub ordinal: usize,
    pub strategy: String,
    pub success: bool,
    /// Measured height (video) or bitrate (audio) when known.
    pub achieved: Option<u32>,
    pub class: ErrorClass,
    pub detail: String,
}

impl AttemptOutcome {
    pub fn success(strategy: &Strategy, achieved: u32) -> Self {
        Self {
            ordinal: strategy.ordinal,
            strategy: strategy.description.clone(),
            success: true,
            achieved: Some(achieved),
            class: ErrorClass::None,
            detail: String::new(),
        }
    }

    pub fn failure(strategy: &Strategy, class: ErrorClass, detail: impl Into<String>) -> Self {
        Self {
            ordinal: strategy.ordinal,
            strategy: strategy.description.clone(),
            success: false,
            achieved: None,
            class,
            detail: detail.into(),
        }
    }

    pub fn quality_reject(strategy: &Strategy, measured: Option<u32>, detail: String) -> Self {
        Self {
            ordinal: strategy.ordinal,
            strategy: strategy.description.clone(),
            success: false,
            achieved: measured,
            class: ErrorClass::None,
            detail,
        }
    }
}

/// Why the verifier refused an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RejectReason {
    /// Measured quality was below the request's floor.
    BelowFloor,
    /// The artifact could not be measured at all (missing, corrupt, or the
    /// probe tool is unavailable). Conservatively treated like a rejection.
    ProbeFailed,
}

/// Verdict of post-download verification. A `Rejected` verdict means the
/// file has already been deleted; callers must not assume it still exists.
#[derive(Debug, Clone, Serialize)]
pub enum QualityVerdict {
    Accepted {
        path: PathBuf,
        /// Measured height (video) or bitrate (audio).
        measured: u32,
    },
    Rejected {
        reason: RejectReason,
        measured: Option<u32>,
    },
}

/// Terminal outcome of one orchestrated request.
#[derive(Debug, Clone, Serialize)]
pub enum FinalResult {
    Accepted {
        path: PathBuf,
        quality: u32,
    },
    /// Lenient mode only: the last-resort strategy delivered below the
    /// floor and the caller chose to keep it.
    AcceptedBelowFloor {
        path: PathBuf,
        quality: u32,
    },
    /// Every strategy failed; carries the full per-strategy record.
    Exhausted {
        outcomes: Vec<AttemptOutcome>,
    },
}

impl FinalResult {
    pub fn is_accepted(&self) -> bool {
        !matches!(self, Self::Exhausted { .. })
    }
}
