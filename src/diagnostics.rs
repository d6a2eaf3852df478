// Failure diagnostics - maps provider error text to a failure reason
//
// Format selectors are advisory and the provider's behavior shifts between
// client identities, so the only reliable signal about what went wrong is
// the error text itself. This module is the single place that inspects it.

use serde::{Deserialize, Serialize};

use crate::models::ErrorClass;

/// Specific reason a strategy attempt failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureReason {
    /// Private content requiring authorization the caller does not have.
    PrivateContent,
    /// Deleted, removed, or otherwise gone for good.
    ContentRemoved,
    /// Not available in the caller's region.
    RegionBlocked,
    /// DRM-protected; no client identity will unlock it.
    DrmProtected,

    /// HTTP 403 under this client/credential combination.
    Forbidden,
    /// Rate limiting (429 or similar).
    RateLimited,
    /// Anti-bot detection triggered.
    BotDetection,
    /// Proof-of-origin token required for this client.
    PoTokenRequired,
    /// Streaming protection that hides formats from this client.
    SabrStreaming,
    /// Login or age gate that the current credential cannot pass.
    AuthInsufficient,
    /// Network timeout (possibly soft IP throttling).
    NetworkTimeout,

    /// The requested format was not offered under this configuration.
    FormatNotOffered,

    Unknown,
}

impl FailureReason {
    /// Collapse into the orchestrator's continue/abort classification.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::PrivateContent
            | Self::ContentRemoved
            | Self::RegionBlocked
            | Self::DrmProtected => ErrorClass::Permanent,
            Self::FormatNotOffered => ErrorClass::UnavailableFormat,
            _ => ErrorClass::Transient,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::PrivateContent => "private content",
            Self::ContentRemoved => "content removed or unavailable",
            Self::RegionBlocked => "blocked in this region",
            Self::DrmProtected => "DRM-protected content",
            Self::Forbidden => "access denied (HTTP 403)",
            Self::RateLimited => "rate limited by provider",
            Self::BotDetection => "bot detection triggered",
            Self::PoTokenRequired => "proof-of-origin token required",
            Self::SabrStreaming => "streaming protection active",
            Self::AuthInsufficient => "authentication insufficient",
            Self::NetworkTimeout => "network timeout",
            Self::FormatNotOffered => "requested format not offered",
            Self::Unknown => "unknown failure",
        }
    }
}

/// Analyze error text and return the matched failure reason.
///
/// Patterns are checked in order of specificity: content-level conditions
/// first, since those short-circuit the whole strategy loop.
pub fn classify(error: &str) -> FailureReason {
    let lower = error.to_lowercase();

    // DRM protection
    if lower.contains("drm")
        || lower.contains("widevine")
        || lower.contains("playready")
        || lower.contains("fairplay")
        || lower.contains("requires payment")
        || lower.contains("requires purchase")
    {
        return FailureReason::DrmProtected;
    }

    // Private content
    if lower.contains("private video")
        || lower.contains("video is private")
        || lower.contains("sign in if you've been granted access")
    {
        return FailureReason::PrivateContent;
    }

    // Removed / gone
    if lower.contains("video unavailable")
        || lower.contains("has been removed")
        || lower.contains("no longer available")
        || lower.contains("removed by user")
        || lower.contains("account associated with this video has been terminated")
    {
        return FailureReason::ContentRemoved;
    }

    // Region blocks
    if lower.contains("not available in your country")
        || lower.contains("blocked in your country")
        || lower.contains("geographic restriction")
        || lower.contains("geo-restricted")
    {
        return FailureReason::RegionBlocked;
    }

    // Format not offered under this configuration
    if lower.contains("requested format is not available")
        || lower.contains("no video formats found")
        || lower.contains("format is not available")
    {
        return FailureReason::FormatNotOffered;
    }

    // Streaming protection (most specific transient condition)
    if lower.contains("sabr") {
        return FailureReason::SabrStreaming;
    }

    if lower.contains("po token") || lower.contains("proof of origin") {
        return FailureReason::PoTokenRequired;
    }

    // Login / age gates the current credential cannot pass
    if lower.contains("age-restricted")
        || lower.contains("sign in to confirm your age")
        || lower.contains("login required")
        || lower.contains("members only")
        || lower.contains("members-only")
        || lower.contains("join this channel")
    {
        return FailureReason::AuthInsufficient;
    }

    if lower.contains("429") || lower.contains("rate limit") || lower.contains("too many requests")
    {
        return FailureReason::RateLimited;
    }

    if lower.contains("sign in to confirm you're not a bot")
        || lower.contains("captcha")
        || lower.contains("unusual traffic")
        || lower.contains("automated")
    {
        return FailureReason::BotDetection;
    }

    if lower.contains("403") || lower.contains("forbidden") {
        return FailureReason::Forbidden;
    }

    if lower.contains("timeout")
        || lower.contains("timed out")
        || lower.contains("connection refused")
        || lower.contains("network unreachable")
    {
        return FailureReason::NetworkTimeout;
    }

    FailureReason::Unknown
}

/// First diagnostically useful line of an error blob, for outcome reports.
pub fn summarize(error: &str) -> String {
    error
        .lines()
        .map(str::trim)
        .find(|l| {
            let lower = l.to_lowercase();
            lower.starts_with("error:")
                || lower.contains("forbidden")
                || lower.contains("unavailable")
                || lower.contains("not available")
                || lower.contains("private")
        })
        .unwrap_or_else(|| error.lines().next().unwrap_or("").trim())
        .chars()
        .take(200)
        .collect()
}
