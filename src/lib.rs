// hdgrab - adaptive media downloader core
//
// Pipeline: the catalog derives an ordered strategy list from a request,
// the orchestrator walks it with fallback-on-failure, every successful
// fetch is verified against the quality floor by probing the actual file,
// and progress flows through a lock-guarded tracker into a coalescing
// dispatcher so the caller only ever sees the latest consistent snapshot.

pub mod catalog;
pub mod diagnostics;
pub mod dispatch;
pub mod errors;
pub mod filename;
pub mod models;
pub mod orchestrator;
pub mod progress;
pub mod provider;
pub mod service;
pub mod verify;

pub use catalog::{CredentialSource, NoCredentials, StrategyCatalog};
pub use diagnostics::{classify, FailureReason};
pub use dispatch::{CoalescingDispatcher, ProgressConsumer};
pub use errors::{ContractViolation, DownloadError, ProbeError, SubmitError};
pub use models::{
    AcceptanceMode, AttemptOutcome, ClientIdentity, Codec, Credential, CredentialSnapshot,
    DownloadRequest, ErrorClass, FinalResult, FormatSpec, MediaKind, QualityVerdict, RejectReason,
    Strategy,
};
pub use orchestrator::DownloadOrchestrator;
pub use progress::{DownloadStatus, ProgressSnapshot, ProgressTracker, RawProgressEvent};
pub use provider::{
    FetchedArtifact, FfprobeProbe, MediaMetadata, MediaProvider, ProgressHook, YtDlpProvider,
};
pub use service::{DownloadHandle, DownloadService};
pub use verify::{FileProbe, QualityVerifier, StreamDimensions};
