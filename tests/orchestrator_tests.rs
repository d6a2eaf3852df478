// End-to-end fallback scenarios against the scripted provider.

mod common;

use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

use tempfile::TempDir;

use common::{FakeProbe, ScriptedProvider, Step};
use hdgrab::dispatch::CoalescingDispatcher;
use hdgrab::models::{
    AcceptanceMode, CredentialSnapshot, DownloadRequest, ErrorClass, FinalResult,
};
use hdgrab::orchestrator::DownloadOrchestrator;
use hdgrab::progress::{DownloadStatus, ProgressSnapshot, ProgressTracker};
use hdgrab::verify::QualityVerifier;
use hdgrab::StrategyCatalog;

struct Harness {
    orchestrator: DownloadOrchestrator,
    cancelled: Arc<AtomicBool>,
    dispatcher: Arc<CoalescingDispatcher>,
    seen: Arc<Mutex<Vec<ProgressSnapshot>>>,
}

fn harness(provider: Arc<ScriptedProvider>) -> Harness {
    let seen: Arc<Mutex<Vec<ProgressSnapshot>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let dispatcher = Arc::new(CoalescingDispatcher::new(Box::new(move |snap| {
        sink.lock().unwrap().push(snap);
    })));
    let cancelled = Arc::new(AtomicBool::new(false));
    let orchestrator = DownloadOrchestrator::new(
        provider,
        QualityVerifier::new(Arc::new(FakeProbe)),
        Arc::new(ProgressTracker::new()),
        dispatcher.clone(),
        cancelled.clone(),
    );
    Harness {
        orchestrator,
        cancelled,
        dispatcher,
        seen,
    }
}

fn video_request(dir: &TempDir, floor: u32) -> DownloadRequest {
    DownloadRequest::video("https://example.com/watch?v=abc", floor)
        .with_output_dir(dir.path())
}

fn with_cookies(request: DownloadRequest) -> DownloadRequest {
    request.with_credentials(CredentialSnapshot::new(vec!["chrome".to_string()], None))
}

#[tokio::test]
async fn below_floor_artifact_is_deleted_and_next_strategy_accepted() {
    let dir = TempDir::new().unwrap();
    let provider = Arc::new(ScriptedProvider::new(vec![
        Step::Deliver(720),
        Step::Deliver(2160),
    ]));
    let request = video_request(&dir, 1080);
    let strategies = StrategyCatalog::build(&request);
    let h = harness(provider.clone());

    let result = h.orchestrator.execute(&request, &strategies).await.unwrap();

    match result {
        FinalResult::Accepted { path, quality } => {
            assert_eq!(quality, 2160);
            assert_eq!(path, dir.path().join("Clip.mp4"));
            assert!(path.exists());
        }
        other => panic!("expected Accepted, got {:?}", other),
    }
    // The 720p artifact from the first strategy must be gone.
    assert!(!dir.path().join(".Clip.grab-1.mp4").exists());
    assert_eq!(provider.fetch_count(), 2);
}

#[tokio::test]
async fn lenient_mode_keeps_below_floor_output_of_last_resort() {
    let dir = TempDir::new().unwrap();
    let provider = Arc::new(ScriptedProvider::new(vec![
        Step::Fail("HTTP Error 403: Forbidden"),
        Step::Deliver(480),
    ]));
    let request = video_request(&dir, 1080).with_mode(AcceptanceMode::Lenient);
    let strategies = StrategyCatalog::build(&request);
    assert!(strategies.last().unwrap().may_violate_floor);
    let h = harness(provider);

    let result = h.orchestrator.execute(&request, &strategies).await.unwrap();

    match result {
        FinalResult::AcceptedBelowFloor { path, quality } => {
            assert_eq!(quality, 480);
            assert!(path.exists());
        }
        other => panic!("expected AcceptedBelowFloor, got {:?}", other),
    }
}

#[tokio::test]
async fn strict_mode_rejects_below_floor_output_of_last_resort() {
    let dir = TempDir::new().unwrap();
    let provider = Arc::new(ScriptedProvider::new(vec![
        Step::Fail("HTTP Error 403: Forbidden"),
        Step::Deliver(480),
    ]));
    let request = video_request(&dir, 1080);
    let strategies = StrategyCatalog::build(&request);
    let h = harness(provider);

    let result = h.orchestrator.execute(&request, &strategies).await.unwrap();

    match result {
        FinalResult::Exhausted { outcomes } => {
            assert_eq!(outcomes.len(), 2);
            assert_eq!(outcomes[0].class, ErrorClass::Transient);
            // Quality rejection: no provider error, measured value recorded.
            assert!(!outcomes[1].success);
            assert_eq!(outcomes[1].class, ErrorClass::None);
            assert_eq!(outcomes[1].achieved, Some(480));
        }
        other => panic!("expected Exhausted, got {:?}", other),
    }
    // Nothing survives on disk after the rejection.
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn transient_failures_walk_the_whole_catalog() {
    let dir = TempDir::new().unwrap();
    let provider = Arc::new(ScriptedProvider::new(vec![
        Step::Fail("HTTP Error 429: Too Many Requests"),
        Step::Fail("Sign in to confirm you're not a bot"),
        Step::Fail("Requested format is not available"),
        Step::Fail("HTTP Error 403: Forbidden"),
    ]));
    let request = with_cookies(video_request(&dir, 1080));
    let strategies = StrategyCatalog::build(&request);
    assert_eq!(strategies.len(), 4);
    let h = harness(provider.clone());

    let result = h.orchestrator.execute(&request, &strategies).await.unwrap();

    match result {
        FinalResult::Exhausted { outcomes } => {
            assert_eq!(outcomes.len(), 4);
            assert_eq!(outcomes[0].class, ErrorClass::Transient);
            assert_eq!(outcomes[2].class, ErrorClass::UnavailableFormat);
            assert!(outcomes.iter().all(|o| !o.success));
        }
        other => panic!("expected Exhausted, got {:?}", other),
    }
    assert_eq!(provider.fetch_count(), 4);
}

#[tokio::test]
async fn permanent_failure_short_circuits_remaining_strategies() {
    let dir = TempDir::new().unwrap();
    let provider = Arc::new(ScriptedProvider::new(vec![Step::Fail(
        "ERROR: This video is private",
    )]));
    let request = with_cookies(video_request(&dir, 1080));
    let strategies = StrategyCatalog::build(&request);
    assert!(strategies.len() > 1);
    let h = harness(provider.clone());

    let result = h.orchestrator.execute(&request, &strategies).await.unwrap();

    match result {
        FinalResult::Exhausted { outcomes } => {
            assert_eq!(outcomes.len(), 1);
            assert_eq!(outcomes[0].class, ErrorClass::Permanent);
        }
        other => panic!("expected Exhausted, got {:?}", other),
    }
    assert_eq!(provider.fetch_count(), 1);
}

#[tokio::test]
async fn unreadable_artifact_is_rejected_and_deleted() {
    let dir = TempDir::new().unwrap();
    let provider = Arc::new(ScriptedProvider::new(vec![
        Step::DeliverCorrupt,
        Step::Deliver(2160),
    ]));
    let request = video_request(&dir, 1080);
    let strategies = StrategyCatalog::build(&request);
    let h = harness(provider.clone());

    let result = h.orchestrator.execute(&request, &strategies).await.unwrap();

    assert!(result.is_accepted());
    assert!(!dir.path().join(".Clip.grab-1.mp4").exists());
    assert!(dir.path().join("Clip.mp4").exists());
    assert_eq!(provider.fetch_count(), 2);
}

#[tokio::test]
async fn zero_floor_accepts_whatever_arrives() {
    let dir = TempDir::new().unwrap();
    let provider = Arc::new(ScriptedProvider::new(vec![Step::Deliver(144)]));
    let request = video_request(&dir, 0);
    let strategies = StrategyCatalog::build(&request);
    let h = harness(provider);

    let result = h.orchestrator.execute(&request, &strategies).await.unwrap();

    match result {
        FinalResult::Accepted { quality, .. } => assert_eq!(quality, 144),
        other => panic!("expected Accepted, got {:?}", other),
    }
}

#[tokio::test]
async fn empty_strategy_list_is_a_contract_violation() {
    let dir = TempDir::new().unwrap();
    let provider = Arc::new(ScriptedProvider::new(vec![]));
    let request = video_request(&dir, 1080);
    let h = harness(provider);

    assert!(h.orchestrator.execute(&request, &[]).await.is_err());
}

#[tokio::test]
async fn cancellation_is_honored_at_the_strategy_boundary() {
    let dir = TempDir::new().unwrap();
    let provider = Arc::new(ScriptedProvider::new(vec![Step::Fail(
        "HTTP Error 429: Too Many Requests",
    )]));
    let request = with_cookies(video_request(&dir, 1080));
    let strategies = StrategyCatalog::build(&request);
    assert!(strategies.len() > 1);
    let h = harness(provider.clone());
    // Trip the flag during the first fetch; no further strategy may start.
    *provider.trip_on_fetch.lock().unwrap() = Some(h.cancelled.clone());

    let result = h.orchestrator.execute(&request, &strategies).await.unwrap();

    match result {
        FinalResult::Exhausted { outcomes } => assert_eq!(outcomes.len(), 1),
        other => panic!("expected Exhausted, got {:?}", other),
    }
    assert_eq!(provider.fetch_count(), 1);
}

#[tokio::test]
async fn terminal_snapshot_survives_coalescing() {
    let dir = TempDir::new().unwrap();
    let provider = Arc::new(ScriptedProvider::new(vec![Step::Deliver(2160)]));
    let request = video_request(&dir, 1080);
    let strategies = StrategyCatalog::build(&request);
    let h = harness(provider);

    let result = h.orchestrator.execute(&request, &strategies).await.unwrap();
    assert!(result.is_accepted());

    // Nothing was drained during the run; the slot must still hold the
    // newest snapshot, which is the terminal one.
    assert!(h.dispatcher.deliver_pending());
    let seen = h.seen.lock().unwrap();
    let last = seen.last().unwrap();
    assert_eq!(last.status, DownloadStatus::Finished);
    assert_eq!(Some(last.downloaded_bytes), last.total_bytes);
}
