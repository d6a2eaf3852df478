// DownloadOrchestrator - ordered fallback over the strategy catalog
//
// One request, one pass over the strategies, one terminal result. Provider
// failures never escape; each becomes an AttemptOutcome and the classifier
// decides whether the next strategy is worth trying.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{info, warn};

use crate::diagnostics::{classify, summarize};
use crate::dispatch::CoalescingDispatcher;
use crate::errors::ContractViolation;
use crate::models::{
    AcceptanceMode, AttemptOutcome, DownloadRequest, ErrorClass, FinalResult, QualityVerdict,
    Strategy,
};
use crate::progress::{ProgressTracker, RawProgressEvent};
use crate::provider::{MediaProvider, ProgressHook};
use crate::verify::QualityVerifier;

pub struct DownloadOrchestrator {
    provider: Arc<dyn MediaProvider>,
    verifier: QualityVerifier,
    tracker: Arc<ProgressTracker>,
    dispatcher: Arc<CoalescingDispatcher>,
    cancelled: Arc<AtomicBool>,
}

impl DownloadOrchestrator {
    pub fn new(
        provider: Arc<dyn MediaProvider>,
        verifier: QualityVerifier,
        tracker: Arc<ProgressTracker>,
        dispatcher: Arc<CoalescingDispatcher>,
        cancelled: Arc<AtomicBool>,
    ) -> Self {
        Self {
            provider,
            verifier,
            tracker,
            dispatcher,
            cancelled,
        }
    }

    /// Run the strategies in catalog order until one is accepted or the
    /// list is exhausted.
    ///
    /// Cancellation is cooperative and checked only between strategies; an
    /// in-flight provider call always runs to completion. A cancelled
    /// request still returns `Exhausted` with the outcomes recorded so far.
    pub async fn execute(
        &self,
        request: &DownloadRequest,
        strategies: &[Strategy],
    ) -> Result<FinalResult, ContractViolation> {
        if strategies.is_empty() {
            return Err(ContractViolation("strategy list must not be empty"));
        }

        let mut outcomes: Vec<AttemptOutcome> = Vec::with_capacity(strategies.len());

        for strategy in strategies {
            if self.cancelled.load(Ordering::SeqCst) {
                info!("cancelled before strategy #{}", strategy.ordinal);
                break;
            }

            info!(
                "strategy #{}/{}: {}",
                strategy.ordinal,
                strategies.len(),
                strategy.description
            );

            // Fresh progress state per attempt; the baseline publish makes
            // consumers see the reset even if the provider emits nothing.
            self.tracker.reset();
            self.dispatcher.publish(self.tracker.snapshot());

            let tracker = self.tracker.clone();
            let dispatcher = self.dispatcher.clone();
            let hook: ProgressHook = Arc::new(move |event: RawProgressEvent| {
                tracker.on_event(event);
                dispatcher.publish(tracker.snapshot());
            });

            let artifact = match self.provider.fetch(request, strategy, hook).await {
                Ok(artifact) => artifact,
                Err(e) => {
                    let reason = classify(&e.to_string());
                    let class = reason.class();
                    let detail = summarize(&e.to_string());
                    warn!(
                        "strategy #{} failed ({:?}): {}",
                        strategy.ordinal, class, detail
                    );

                    self.tracker.on_event(RawProgressEvent::Errored);
                    self.dispatcher.publish(self.tracker.snapshot());
                    outcomes.push(AttemptOutcome::failure(strategy, class, detail));

                    if class == ErrorClass::Permanent {
                        info!("permanent failure, abandoning remaining strategies");
                        break;
                    }
                    continue;
                }
            };

            let allow_below_floor =
                request.mode == AcceptanceMode::Lenient && strategy.may_violate_floor;
            match self
                .verifier
                .verify(&artifact, request, allow_below_floor)
                .await
            {
                QualityVerdict::Accepted { path, measured } => {
                    outcomes.push(AttemptOutcome::success(strategy, measured));
                    let result = if measured < request.quality_floor {
                        FinalResult::AcceptedBelowFloor {
                            path,
                            quality: measured,
                        }
                    } else {
                        FinalResult::Accepted {
                            path,
                            quality: measured,
                        }
                    };
                    return Ok(result);
                }
                QualityVerdict::Rejected { reason, measured } => {
                    let detail = format!(
                        "quality verification rejected the artifact ({:?})",
                        reason
                    );
                    outcomes.push(AttemptOutcome::quality_reject(strategy, measured, detail));
                    continue;
                }
            }
        }

        info!("all strategies exhausted after {} attempts", outcomes.len());
        Ok(FinalResult::Exhausted { outcomes })
    }
}
