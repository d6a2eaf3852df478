// Error types for the download pipeline

use thiserror::Error;

/// Errors raised by a `MediaProvider`.
///
/// The orchestrator never matches on these variants directly; it feeds the
/// display text through `diagnostics::classify` and acts on the resulting
/// `ErrorClass`. Variants exist so shims can report structured failures.
#[derive(Debug, Clone, Error)]
pub enum DownloadError {
    #[error("network timeout: provider is not responding")]
    NetworkTimeout,

    #[error("tool not found: {0}")]
    ToolNotFound(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("parse error: {0}")]
    ParseError(String),

    #[error("execution error: {0}")]
    ExecutionError(String),

    /// Raw diagnostic text from the provider, classified downstream.
    #[error("{0}")]
    Provider(String),
}

/// Errors raised by a `FileProbe`. All of them collapse to a
/// `probe-failed` rejection inside the verifier.
#[derive(Debug, Clone, Error)]
pub enum ProbeError {
    #[error("probe tool not found: {0}")]
    ToolNotFound(String),

    #[error("file not found: {0}")]
    FileMissing(String),

    #[error("unreadable stream data: {0}")]
    Unreadable(String),
}

/// Programming-contract violations. The only error kind that escapes the
/// orchestrator boundary instead of becoming an `AttemptOutcome`.
#[derive(Debug, Clone, Error)]
#[error("contract violation: {0}")]
pub struct ContractViolation(pub &'static str);

/// Errors from the caller-facing submission API.
#[derive(Debug, Clone, Error)]
pub enum SubmitError {
    #[error("a download is already in flight on this service")]
    AlreadyRunning,
}
