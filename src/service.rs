// DownloadService - caller-facing submission surface
//
// One download in flight per service instance. Progress reaches the caller
// through the coalescing dispatcher, drained by a pump task, so a slow
// consumer callback can never stall the worker.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::{interval, Duration};

use crate::catalog::StrategyCatalog;
use crate::dispatch::CoalescingDispatcher;
use crate::errors::{ContractViolation, SubmitError};
use crate::models::{DownloadRequest, FinalResult};
use crate::orchestrator::DownloadOrchestrator;
use crate::progress::{ProgressSnapshot, ProgressTracker};
use crate::provider::{FfprobeProbe, MediaProvider, YtDlpProvider};
use crate::verify::{FileProbe, QualityVerifier};

const PUMP_INTERVAL_MS: u64 = 100;

pub struct DownloadService {
    provider: Arc<dyn MediaProvider>,
    probe: Arc<dyn FileProbe>,
    busy: Arc<AtomicBool>,
}

/// Handle to one in-flight download.
pub struct DownloadHandle {
    cancel: Arc<AtomicBool>,
    join: JoinHandle<()>,
}

impl DownloadHandle {
    /// Request cooperative cancellation. The current strategy attempt runs
    /// to completion; no further strategies start.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    /// Wait for the worker to finish and all callbacks to have fired.
    pub async fn wait(self) {
        let _ = self.join.await;
    }
}

impl DownloadService {
    pub fn new(provider: Arc<dyn MediaProvider>, probe: Arc<dyn FileProbe>) -> Self {
        Self {
            provider,
            probe,
            busy: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Service backed by the yt-dlp and ffprobe installations on this
    /// system.
    pub fn with_system_tools() -> Self {
        Self::new(
            Arc::new(YtDlpProvider::new()),
            Arc::new(FfprobeProbe::new()),
        )
    }

    /// Start one download. Fails fast with `AlreadyRunning` while a
    /// previous submission has not reached its terminal callback.
    ///
    /// `on_progress` receives coalesced snapshots (latest state, not every
    /// intermediate event). `on_complete` fires exactly once, after the
    /// final progress drain. Must be called within a tokio runtime.
    pub fn submit<P, C>(
        &self,
        request: DownloadRequest,
        on_progress: P,
        on_complete: C,
    ) -> Result<DownloadHandle, SubmitError>
    where
        P: Fn(ProgressSnapshot) + Send + Sync + 'static,
        C: FnOnce(Result<FinalResult, ContractViolation>) + Send + 'static,
    {
        if self
            .busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(SubmitError::AlreadyRunning);
        }

        let strategies = StrategyCatalog::build(&request);
        let tracker = Arc::new(ProgressTracker::new());
        let dispatcher = Arc::new(CoalescingDispatcher::new(Box::new(on_progress)));
        let cancel = Arc::new(AtomicBool::new(false));

        let provider = self.provider.clone();
        let probe = self.probe.clone();
        let busy = self.busy.clone();
        let worker_cancel = cancel.clone();

        let join = tokio::spawn(async move {
            let orchestrator = DownloadOrchestrator::new(
                provider,
                QualityVerifier::new(probe),
                tracker,
                dispatcher.clone(),
                worker_cancel,
            );

            let done = Arc::new(AtomicBool::new(false));
            let pump = {
                let dispatcher = dispatcher.clone();
                let done = done.clone();
                tokio::spawn(async move {
                    let mut tick = interval(Duration::from_millis(PUMP_INTERVAL_MS));
                    while !done.load(Ordering::SeqCst) {
                        tick.tick().await;
                        dispatcher.deliver_pending();
                    }
                })
            };

            let result = orchestrator.execute(&request, &strategies).await;

            done.store(true, Ordering::SeqCst);
            let _ = pump.await;
            // The terminal snapshot must reach the consumer before the
            // completion callback.
            dispatcher.deliver_pending();

            busy.store(false, Ordering::SeqCst);
            on_complete(result);
        });

        Ok(DownloadHandle { cancel, join })
    }
}
