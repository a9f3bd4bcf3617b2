use super::*;
use crate::client::MockDetectionService;
use crate::config::CaptureConfig;
use crate::endpoint::EndpointUrl;
use crate::error::{ClientError, PlatformError};
use crate::events::EventBus;
use crate::platform::{
    CaptureOptions, FrameCapture, FrameRenderer, MockCamera, RecordingRenderer, RenderFrame,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc as std_mpsc, Arc};
use std::time::Duration;
use tokio::sync::oneshot;

const FIRST: &str = "aGVsbG8=";
const SECOND: &str = "d29ybGQ=";

struct Harness {
    api: Arc<MockDetectionService>,
    camera: Arc<MockCamera>,
    renderer: Arc<RecordingRenderer>,
    scheduler: CaptureScheduler,
}

fn create_test_config() -> CaptureConfig {
    CaptureConfig {
        interval_ms: 5000,
        quality: 0.5,
        frames_dir: "./frames".to_string(),
        camera_permission: true,
    }
}

fn verified() -> EndpointUrl {
    EndpointUrl::candidate("http://h").into_verified()
}

fn start_session(api: MockDetectionService, with_camera: bool) -> Harness {
    let api = Arc::new(api);
    let camera = Arc::new(MockCamera::ready());
    let renderer = Arc::new(RecordingRenderer::new());

    let scheduler = CaptureScheduler::start(
        verified(),
        api.clone(),
        with_camera.then(|| camera.clone() as Arc<dyn FrameCapture>),
        renderer.clone(),
        Arc::new(EventBus::new(64)),
        &create_test_config(),
    )
    .unwrap();

    Harness {
        api,
        camera,
        renderer,
        scheduler,
    }
}

fn displayed(scheduler: &CaptureScheduler) -> Option<String> {
    scheduler
        .current_result()
        .map(|result| result.base64().to_string())
}

async fn advance_to(millis: u64, start: tokio::time::Instant) {
    tokio::time::sleep_until(start + Duration::from_millis(millis)).await;
}

#[test]
fn test_session_gate_order() {
    let mut session = CaptureSession::new(
        verified(),
        Duration::from_secs(5),
        CaptureOptions::default(),
        true,
    );

    assert_eq!(session.gate(), Err(SkipReason::PermissionPending));
    session.set_permission(false);
    assert_eq!(session.begin_cycle(), Err(SkipReason::PermissionDenied));
    session.set_permission(true);
    assert_eq!(session.gate(), Err(SkipReason::CameraNotReady));

    assert!(session.mark_camera_ready());
    assert!(!session.mark_camera_ready());

    assert_eq!(session.begin_cycle(), Ok(1));
    assert!(session.is_in_flight());
    assert_eq!(session.begin_cycle(), Err(SkipReason::InFlight));

    session.finish_cycle();
    assert_eq!(session.begin_cycle(), Ok(2));

    let no_camera = CaptureSession::new(
        verified(),
        Duration::from_secs(5),
        CaptureOptions::default(),
        false,
    );
    assert_eq!(no_camera.gate(), Err(SkipReason::NoCamera));
}

#[tokio::test(start_paused = true)]
async fn test_unverified_endpoint_is_refused() {
    let result = CaptureScheduler::start(
        EndpointUrl::candidate("http://h"),
        Arc::new(MockDetectionService::accepting()),
        Some(Arc::new(MockCamera::ready()) as Arc<dyn FrameCapture>),
        Arc::new(RecordingRenderer::new()),
        Arc::new(EventBus::new(8)),
        &create_test_config(),
    );

    assert!(result.is_err());
}

#[tokio::test(start_paused = true)]
async fn test_zero_interval_is_refused() {
    let config = CaptureConfig {
        interval_ms: 0,
        ..create_test_config()
    };
    let renderer = Arc::new(RecordingRenderer::new());

    let result = CaptureScheduler::start(
        verified(),
        Arc::new(MockDetectionService::accepting()),
        Some(Arc::new(MockCamera::ready()) as Arc<dyn FrameCapture>),
        renderer.clone(),
        Arc::new(EventBus::new(8)),
        &config,
    );

    assert!(result.is_err());
    assert!(renderer.frames().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_immediate_cycle_then_fixed_period() {
    let api = MockDetectionService::accepting();
    api.set_submit_default(Ok(FIRST.to_string()));
    let harness = start_session(api, true);
    let start = tokio::time::Instant::now();

    harness.scheduler.set_permission(true);
    harness.scheduler.camera_ready();

    advance_to(10, start).await;
    assert_eq!(harness.api.submit_calls(), 1);
    assert_eq!(displayed(&harness.scheduler).as_deref(), Some(FIRST));
    assert_eq!(harness.camera.last_options(), Some(CaptureOptions { quality: 0.5 }));

    advance_to(4990, start).await;
    assert_eq!(harness.api.submit_calls(), 1);

    advance_to(5010, start).await;
    assert_eq!(harness.api.submit_calls(), 2);

    advance_to(10010, start).await;
    assert_eq!(harness.api.submit_calls(), 3);
    assert_eq!(harness.api.submitted_urls()[0], "http://h");

    let stats = harness.scheduler.stats();
    assert_eq!(stats.cycles_started, 3);
    assert_eq!(stats.results_updated, 3);
    assert!(stats.last_update.is_some());

    let frames = harness.renderer.frames();
    assert!(matches!(frames[0], RenderFrame::Placeholder));
    assert_eq!(harness.renderer.detections(), vec![FIRST; 3]);

    harness.scheduler.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_no_cycles_before_camera_ready() {
    let api = MockDetectionService::accepting();
    api.set_submit_default(Ok(FIRST.to_string()));
    let harness = start_session(api, true);
    let start = tokio::time::Instant::now();

    harness.scheduler.set_permission(true);

    advance_to(10010, start).await;
    assert_eq!(harness.camera.captures(), 0);
    assert_eq!(harness.api.submit_calls(), 0);
    assert_eq!(harness.scheduler.stats().ticks_skipped, 2);
    assert!(harness.scheduler.current_result().is_none());

    harness.scheduler.camera_ready();
    advance_to(10020, start).await;
    assert_eq!(harness.camera.captures(), 1);
    assert_eq!(harness.api.submit_calls(), 1);

    harness.scheduler.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_overlapping_ticks_dropped_while_in_flight() {
    let api = MockDetectionService::accepting();
    api.set_submit_default(Ok(FIRST.to_string()));
    api.set_submit_delay(Duration::from_secs(7));
    let harness = start_session(api, true);
    let start = tokio::time::Instant::now();

    harness.scheduler.set_permission(true);
    harness.scheduler.camera_ready();

    advance_to(10010, start).await;
    assert_eq!(harness.api.submit_calls(), 2);

    let stats = harness.scheduler.stats();
    assert_eq!(stats.ticks_dropped_in_flight, 1);
    assert_eq!(stats.cycles_started, 2);
    assert_eq!(stats.results_updated, 1);

    harness.scheduler.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_failed_submission_keeps_previous_result() {
    let api = MockDetectionService::accepting();
    api.push_submit_result(Ok(FIRST.to_string()));
    api.set_submit_default(Err(ClientError::submission("request timed out")));
    let harness = start_session(api, true);
    let start = tokio::time::Instant::now();

    harness.scheduler.set_permission(true);
    harness.scheduler.camera_ready();

    advance_to(10, start).await;
    assert_eq!(displayed(&harness.scheduler).as_deref(), Some(FIRST));

    advance_to(5010, start).await;
    assert_eq!(harness.api.submit_calls(), 2);
    assert_eq!(displayed(&harness.scheduler).as_deref(), Some(FIRST));

    let stats = harness.scheduler.stats();
    assert_eq!(stats.results_updated, 1);
    assert_eq!(stats.submission_failures, 1);
    assert_eq!(harness.renderer.detections(), vec![FIRST]);

    harness.scheduler.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_newer_result_replaces_displayed() {
    let api = MockDetectionService::accepting();
    api.push_submit_result(Ok(FIRST.to_string()));
    api.push_submit_result(Ok(SECOND.to_string()));
    let harness = start_session(api, true);
    let start = tokio::time::Instant::now();
    let mut results = harness.scheduler.results();

    harness.scheduler.set_permission(true);
    harness.scheduler.camera_ready();

    advance_to(5010, start).await;
    assert!(results.has_changed().unwrap());
    assert_eq!(
        results.borrow_and_update().as_ref().map(|r| r.base64().to_string()),
        Some(SECOND.to_string())
    );

    harness.scheduler.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_capture_failure_skips_submission() {
    let api = MockDetectionService::accepting();
    api.set_submit_default(Ok(FIRST.to_string()));
    let harness = start_session(api, true);
    harness.camera.set_failing(true);
    let start = tokio::time::Instant::now();

    harness.scheduler.set_permission(true);
    harness.scheduler.camera_ready();

    advance_to(5010, start).await;
    assert_eq!(harness.camera.captures(), 2);
    assert_eq!(harness.api.submit_calls(), 0);
    assert_eq!(harness.scheduler.stats().capture_failures, 2);
    assert!(harness.scheduler.current_result().is_none());

    harness.scheduler.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_stop_discards_late_result() {
    let api = MockDetectionService::accepting();
    api.set_submit_default(Ok(FIRST.to_string()));
    api.set_submit_delay(Duration::from_secs(3));
    let harness = start_session(api, true);
    let start = tokio::time::Instant::now();

    harness.scheduler.set_permission(true);
    harness.scheduler.camera_ready();

    advance_to(1000, start).await;
    assert_eq!(harness.api.submit_calls(), 1);
    harness.scheduler.stop().await;
    assert!(!harness.scheduler.is_running());

    advance_to(20000, start).await;
    assert_eq!(harness.api.submit_calls(), 1);
    assert!(harness.scheduler.current_result().is_none());
    assert!(harness.renderer.detections().is_empty());
    assert_eq!(harness.scheduler.stats().results_discarded, 1);

    harness.scheduler.camera_ready();
    harness.scheduler.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_permission_denied_never_captures() {
    let api = MockDetectionService::accepting();
    api.set_submit_default(Ok(FIRST.to_string()));
    let harness = start_session(api, true);
    let start = tokio::time::Instant::now();

    harness.scheduler.set_permission(false);
    harness.scheduler.camera_ready();

    advance_to(5010, start).await;
    assert_eq!(harness.camera.captures(), 0);
    assert_eq!(harness.scheduler.stats().ticks_skipped, 2);

    harness.scheduler.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_missing_camera_never_captures() {
    let api = MockDetectionService::accepting();
    api.set_submit_default(Ok(FIRST.to_string()));
    let harness = start_session(api, false);
    let start = tokio::time::Instant::now();

    harness.scheduler.set_permission(true);
    harness.scheduler.camera_ready();

    advance_to(5010, start).await;
    assert_eq!(harness.camera.captures(), 0);
    assert_eq!(harness.api.submit_calls(), 0);
    assert_eq!(harness.scheduler.stats().ticks_skipped, 2);

    harness.scheduler.stop().await;
}

/// Holds the first detection render until released
struct BlockingRenderer {
    entered: Mutex<Option<oneshot::Sender<()>>>,
    release: Mutex<std_mpsc::Receiver<()>>,
    detections: AtomicUsize,
}

impl FrameRenderer for BlockingRenderer {
    fn render_frame(&self, frame: RenderFrame) -> std::result::Result<(), PlatformError> {
        if let RenderFrame::Detection(_) = frame {
            if let Some(entered) = self.entered.lock().take() {
                let _ = entered.send(());
            }
            let _ = self.release.lock().recv();
            self.detections.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_stop_waits_for_render_in_progress() {
    let (entered_tx, entered_rx) = oneshot::channel();
    let (release_tx, release_rx) = std_mpsc::channel();
    let renderer = Arc::new(BlockingRenderer {
        entered: Mutex::new(Some(entered_tx)),
        release: Mutex::new(release_rx),
        detections: AtomicUsize::new(0),
    });

    let api = MockDetectionService::accepting();
    api.set_submit_default(Ok(FIRST.to_string()));
    let scheduler = Arc::new(
        CaptureScheduler::start(
            verified(),
            Arc::new(api),
            Some(Arc::new(MockCamera::ready()) as Arc<dyn FrameCapture>),
            renderer.clone(),
            Arc::new(EventBus::new(64)),
            &create_test_config(),
        )
        .unwrap(),
    );

    scheduler.set_permission(true);
    scheduler.camera_ready();
    entered_rx.await.unwrap();

    let stopping = tokio::spawn({
        let scheduler = Arc::clone(&scheduler);
        async move { scheduler.stop().await }
    });

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!stopping.is_finished());

    release_tx.send(()).unwrap();
    stopping.await.unwrap();

    assert_eq!(renderer.detections.load(Ordering::SeqCst), 1);
    assert_eq!(displayed(&scheduler).as_deref(), Some(FIRST));
    assert_eq!(scheduler.stats().results_discarded, 0);
    assert!(!scheduler.is_running());
}
