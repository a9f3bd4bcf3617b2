use super::*;
use crate::client::MockDetectionService;
use crate::config::ScannerConfig;
use crate::endpoint::EndpointUrl;
use crate::events::{CandidateSource, DetectcamEvent, EventBus};
use crate::platform::RecordingNavigator;
use crate::verifier::EndpointVerifier;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

struct Harness {
    api: Arc<MockDetectionService>,
    navigator: Arc<RecordingNavigator>,
    inputs: mpsc::Sender<ScanInput>,
    phase: watch::Receiver<ScanPhase>,
    indicators: watch::Receiver<ScanIndicators>,
    events: broadcast::Receiver<DetectcamEvent>,
    cancel: CancellationToken,
    handle: JoinHandle<Option<EndpointUrl>>,
}

fn create_test_config() -> ScannerConfig {
    ScannerConfig {
        cooldown_ms: 2000,
        restart_base_delay_ms: 100,
        restart_max_delay_ms: 1000,
        max_restarts: 3,
    }
}

fn spawn_coordinator(api: MockDetectionService) -> Harness {
    let api = Arc::new(api);
    let navigator = Arc::new(RecordingNavigator::new());
    let event_bus = Arc::new(EventBus::new(64));
    let events = event_bus.subscribe();

    let coordinator = ScanCoordinator::new(
        EndpointVerifier::new(api.clone()),
        navigator.clone(),
        event_bus,
        &create_test_config(),
    );
    let phase = coordinator.phase();
    let indicators = coordinator.indicators();

    let (inputs, rx) = mpsc::channel(16);
    let cancel = CancellationToken::new();
    let handle = tokio::spawn(coordinator.run(rx, cancel.clone()));

    Harness {
        api,
        navigator,
        inputs,
        phase,
        indicators,
        events,
        cancel,
        handle,
    }
}

impl Harness {
    async fn send(&self, input: ScanInput) {
        self.inputs.send(input).await.unwrap();
        settle().await;
    }

    fn phase(&self) -> ScanPhase {
        *self.phase.borrow()
    }

    fn indicators(&self) -> ScanIndicators {
        *self.indicators.borrow()
    }
}

fn drain_events(events: &mut broadcast::Receiver<DetectcamEvent>) -> Vec<&'static str> {
    let mut types = Vec::new();
    while let Ok(event) = events.try_recv() {
        types.push(event.event_type());
    }
    types
}

async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

fn scanned(url: &str) -> ScanInput {
    ScanInput::Scanned(url.to_string())
}

fn submitted(url: &str) -> ScanInput {
    ScanInput::Submitted(url.to_string())
}

#[test]
fn test_machine_admission_rules() {
    let mut machine = ScanMachine::new();
    assert_eq!(machine.phase(), ScanPhase::Idle);

    assert_eq!(machine.admit("  ", CandidateSource::Manual), Admission::Blank);
    assert_eq!(machine.phase(), ScanPhase::Idle);

    assert_eq!(
        machine.admit("http://a", CandidateSource::Scan),
        Admission::Accepted
    );
    assert_eq!(
        machine.admit("http://b", CandidateSource::Manual),
        Admission::Busy
    );

    assert_eq!(machine.resolve(false), ScanPhase::Rejected);
    assert_eq!(
        machine.admit("http://b", CandidateSource::Scan),
        Admission::CoolingDown
    );
    assert_eq!(
        machine.current_attempt().map(|attempt| attempt.outcome),
        Some(AttemptOutcome::Rejected)
    );

    assert!(machine.finish_cooldown());
    assert!(!machine.finish_cooldown());

    assert_eq!(
        machine.admit("http://b", CandidateSource::Manual),
        Admission::Accepted
    );
    assert_eq!(machine.resolve(true), ScanPhase::Verified);
    assert_eq!(
        machine.admit("http://c", CandidateSource::Scan),
        Admission::Finished
    );

    assert_eq!(machine.rejections(), 2);
}

#[test]
fn test_machine_manual_rejection_skips_cooldown() {
    let mut machine = ScanMachine::new();
    machine.admit("http://bad", CandidateSource::Manual);

    assert_eq!(machine.resolve(false), ScanPhase::Idle);
    assert_eq!(
        machine.admit("http://good", CandidateSource::Scan),
        Admission::Accepted
    );
}

#[test]
fn test_machine_resolve_outside_verification_is_noop() {
    let mut machine = ScanMachine::new();
    assert_eq!(machine.resolve(true), ScanPhase::Idle);
    assert!(machine.current_attempt().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_verified_scan_navigates_to_detection() {
    let mut harness = spawn_coordinator(MockDetectionService::accepting());

    harness.send(scanned("http://h")).await;

    let endpoint = harness.handle.await.unwrap().unwrap();
    assert!(endpoint.is_verified());
    assert_eq!(endpoint.as_str(), "http://h");
    assert_eq!(
        harness.navigator.routes(),
        vec!["ObjectDetection?url=http://h".to_string()]
    );
    assert_eq!(*harness.phase.borrow(), ScanPhase::Verified);
    assert_eq!(
        drain_events(&mut harness.events),
        vec![
            "candidate_received",
            "verification_succeeded",
            "navigation_requested"
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_blank_manual_entry_flags_input_without_network() {
    let harness = spawn_coordinator(MockDetectionService::accepting());

    harness.send(submitted("   ")).await;

    assert_eq!(harness.phase(), ScanPhase::Idle);
    assert!(harness.indicators().input_error);
    assert!(!harness.indicators().scanner_alert);
    assert_eq!(harness.api.verify_calls(), 0);
    assert!(harness.navigator.routes().is_empty());

    harness.cancel.cancel();
    assert!(harness.handle.await.unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_candidates_dropped_while_verifying() {
    let api = MockDetectionService::accepting();
    api.set_verify_delay(Duration::from_millis(500));
    let mut harness = spawn_coordinator(api);

    harness.send(scanned("http://first")).await;
    assert_eq!(harness.phase(), ScanPhase::Verifying);

    harness.send(scanned("http://second")).await;
    harness.send(submitted("http://third")).await;

    let endpoint = harness.handle.await.unwrap().unwrap();
    assert_eq!(endpoint.as_str(), "http://first");
    assert_eq!(harness.api.verified_urls(), vec!["http://first".to_string()]);
    assert_eq!(
        harness.navigator.routes(),
        vec!["ObjectDetection?url=http://first".to_string()]
    );

    let dropped = drain_events(&mut harness.events)
        .into_iter()
        .filter(|event| *event == "candidate_dropped")
        .count();
    assert_eq!(dropped, 2);
}

#[tokio::test(start_paused = true)]
async fn test_rejected_scan_cools_down_for_two_seconds() {
    let harness = spawn_coordinator(MockDetectionService::new());

    harness.send(scanned("http://bad")).await;
    assert_eq!(harness.phase(), ScanPhase::Rejected);
    assert_eq!(
        harness.indicators(),
        ScanIndicators {
            input_error: true,
            scanner_alert: true
        }
    );

    tokio::time::sleep(Duration::from_millis(1990)).await;
    harness.api.set_verify_result(true);
    harness.send(scanned("http://good")).await;
    assert_eq!(harness.phase(), ScanPhase::Rejected);
    assert_eq!(harness.api.verify_calls(), 1);

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(harness.phase(), ScanPhase::Idle);
    assert!(!harness.indicators().scanner_alert);
    assert!(harness.indicators().input_error);

    harness.send(scanned("http://good")).await;
    let endpoint = harness.handle.await.unwrap().unwrap();
    assert_eq!(endpoint.as_str(), "http://good");
    assert_eq!(harness.api.verify_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_rejected_manual_entry_returns_to_idle() {
    let harness = spawn_coordinator(MockDetectionService::new());

    harness.send(submitted("http://bad")).await;
    assert_eq!(harness.phase(), ScanPhase::Idle);
    assert_eq!(
        harness.indicators(),
        ScanIndicators {
            input_error: true,
            scanner_alert: false
        }
    );

    harness.send(ScanInput::Edited("http://goo".to_string())).await;
    assert!(!harness.indicators().input_error);

    harness.api.set_verify_result(true);
    harness.send(submitted("http://good")).await;

    let endpoint = harness.handle.await.unwrap().unwrap();
    assert_eq!(endpoint.as_str(), "http://good");
    assert_eq!(
        harness.api.verified_urls(),
        vec!["http://bad".to_string(), "http://good".to_string()]
    );
}

#[tokio::test(start_paused = true)]
async fn test_closed_inputs_end_without_endpoint() {
    let harness = spawn_coordinator(MockDetectionService::accepting());
    let Harness { inputs, handle, .. } = harness;

    drop(inputs);
    assert!(handle.await.unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_pending_verification_survives_closed_inputs() {
    let api = MockDetectionService::accepting();
    api.set_verify_delay(Duration::from_millis(300));
    let harness = spawn_coordinator(api);

    harness.send(submitted("http://h")).await;
    let Harness {
        inputs,
        handle,
        navigator,
        ..
    } = harness;
    drop(inputs);

    let endpoint = handle.await.unwrap().unwrap();
    assert_eq!(endpoint.as_str(), "http://h");
    assert_eq!(navigator.routes().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_abandons_pending_verification() {
    let api = MockDetectionService::accepting();
    api.set_verify_delay(Duration::from_secs(5));
    let harness = spawn_coordinator(api);

    harness.send(scanned("http://h")).await;
    harness.cancel.cancel();

    assert!(harness.handle.await.unwrap().is_none());
    assert!(harness.navigator.routes().is_empty());
}
