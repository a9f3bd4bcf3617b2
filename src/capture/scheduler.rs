use super::session::{CaptureSession, CaptureStats, SkipReason};
use crate::client::{DetectionApi, DetectionResult};
use crate::config::CaptureConfig;
use crate::endpoint::EndpointUrl;
use crate::error::{ClientError, DetectcamError, Result};
use crate::events::{DetectcamEvent, EventBus};
use crate::platform::{CaptureOptions, FrameCapture, FrameRenderer, RenderFrame};
use chrono::Utc;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Notifications from the detection screen to the scheduler loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionControl {
    CameraReady,
    Permission(bool),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CycleOutcome {
    Updated,
    CaptureFailed,
    SubmissionFailed,
    Discarded,
}

/// Shared handles a capture cycle needs after it leaves the loop task
#[derive(Clone)]
struct CycleContext {
    session_id: String,
    base_url: String,
    options: CaptureOptions,
    api: Arc<dyn DetectionApi>,
    renderer: Arc<dyn FrameRenderer>,
    event_bus: Arc<EventBus>,
    result_tx: Arc<watch::Sender<Option<DetectionResult>>>,
    stats_tx: Arc<watch::Sender<CaptureStats>>,
    generation: Arc<Mutex<u64>>,
}

/// Periodic capture-and-detect loop of one detection screen.
///
/// A cycle runs once immediately when the camera becomes ready and then once per
/// interval. Stopping tears the timer down at once; a cycle that is already
/// talking to the service runs to completion, but its result is discarded.
pub struct CaptureScheduler {
    session_id: String,
    control_tx: mpsc::UnboundedSender<SessionControl>,
    result_tx: Arc<watch::Sender<Option<DetectionResult>>>,
    stats_tx: Arc<watch::Sender<CaptureStats>>,
    generation: Arc<Mutex<u64>>,
    event_bus: Arc<EventBus>,
    cancel: CancellationToken,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl CaptureScheduler {
    /// Start a session for a verified endpoint.
    ///
    /// The renderer shows the placeholder until the first result arrives.
    pub fn start(
        endpoint: EndpointUrl,
        api: Arc<dyn DetectionApi>,
        camera: Option<Arc<dyn FrameCapture>>,
        renderer: Arc<dyn FrameRenderer>,
        event_bus: Arc<EventBus>,
        config: &CaptureConfig,
    ) -> Result<Self> {
        if !endpoint.is_verified() {
            return Err(DetectcamError::component(
                "capture_scheduler",
                format!("endpoint {} has not been verified", endpoint),
            ));
        }
        if config.interval_ms == 0 {
            return Err(DetectcamError::component(
                "capture_scheduler",
                "capture interval must be greater than 0",
            ));
        }

        let session = CaptureSession::new(
            endpoint,
            config.interval(),
            CaptureOptions {
                quality: config.quality,
            },
            camera.is_some(),
        );
        let session_id = session.id().to_string();

        if let Err(e) = renderer.render_frame(RenderFrame::Placeholder) {
            warn!("Failed to render placeholder: {}", e);
        }

        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let (result_tx, _) = watch::channel(None);
        let (stats_tx, _) = watch::channel(CaptureStats::default());

        let context = CycleContext {
            session_id: session_id.clone(),
            base_url: session.endpoint().as_str().to_string(),
            options: session.options(),
            api,
            renderer,
            event_bus: Arc::clone(&event_bus),
            result_tx: Arc::new(result_tx),
            stats_tx: Arc::new(stats_tx),
            generation: Arc::new(Mutex::new(0)),
        };

        event_bus.publish(DetectcamEvent::SessionStarted {
            session_id: session_id.clone(),
            url: session.endpoint().as_str().to_string(),
        });
        info!(
            "Capture session {} started for {} (interval {:?})",
            session_id,
            session.endpoint(),
            session.interval()
        );

        let cancel = CancellationToken::new();
        let scheduler = Self {
            session_id,
            control_tx,
            result_tx: Arc::clone(&context.result_tx),
            stats_tx: Arc::clone(&context.stats_tx),
            generation: Arc::clone(&context.generation),
            event_bus,
            cancel: cancel.clone(),
            handle: Mutex::new(None),
        };

        let handle = tokio::spawn(run_loop(session, camera, context, control_rx, cancel));
        *scheduler.handle.lock() = Some(handle);

        Ok(scheduler)
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Tell the loop the camera preview finished initializing
    pub fn camera_ready(&self) {
        self.send_control(SessionControl::CameraReady);
    }

    /// Report the camera permission answer
    pub fn set_permission(&self, granted: bool) {
        self.send_control(SessionControl::Permission(granted));
    }

    /// Result currently on display
    pub fn current_result(&self) -> Option<DetectionResult> {
        self.result_tx.borrow().clone()
    }

    /// Watch the displayed result
    pub fn results(&self) -> watch::Receiver<Option<DetectionResult>> {
        self.result_tx.subscribe()
    }

    pub fn stats(&self) -> CaptureStats {
        self.stats_tx.borrow().clone()
    }

    pub fn is_running(&self) -> bool {
        !self.cancel.is_cancelled()
    }

    /// Tear the timer down and wait for the loop task to exit.
    ///
    /// Results of cycles still in flight are discarded when they arrive.
    pub async fn stop(&self) {
        if self.cancel.is_cancelled() {
            return;
        }

        // Waits for a cycle that is publishing its result
        *self.generation.lock() += 1;
        self.cancel.cancel();

        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!("Capture loop for session {} failed: {}", self.session_id, e);
            }
        }

        self.event_bus.publish(DetectcamEvent::SessionEnded {
            session_id: self.session_id.clone(),
        });
        info!("Capture session {} stopped", self.session_id);
    }

    fn send_control(&self, control: SessionControl) {
        if self.control_tx.send(control).is_err() {
            debug!(
                "Capture session {} already stopped, ignoring {:?}",
                self.session_id, control
            );
        }
    }
}

impl Drop for CaptureScheduler {
    fn drop(&mut self) {
        if !self.cancel.is_cancelled() {
            *self.generation.lock() += 1;
            self.cancel.cancel();
        }
    }
}

async fn run_loop(
    mut session: CaptureSession,
    camera: Option<Arc<dyn FrameCapture>>,
    context: CycleContext,
    mut control_rx: mpsc::UnboundedReceiver<SessionControl>,
    cancel: CancellationToken,
) {
    let period = session.interval();
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut cycle_task: Option<JoinHandle<CycleOutcome>> = None;

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                debug!("Capture loop for session {} cancelled", session.id());
                break;
            }

            outcome = wait_cycle(&mut cycle_task) => {
                cycle_task = None;
                session.finish_cycle();
                match outcome {
                    Ok(outcome) => debug!("Cycle finished in session {}: {:?}", session.id(), outcome),
                    Err(e) => error!("Capture cycle in session {} panicked: {}", session.id(), e),
                }
            }

            control = control_rx.recv() => {
                match control {
                    Some(SessionControl::CameraReady) => {
                        if session.mark_camera_ready() {
                            info!("Camera ready for session {}", session.id());
                            context.event_bus.publish(DetectcamEvent::CameraReady {
                                session_id: session.id().to_string(),
                            });
                            ticker.reset();
                            trigger(&mut session, &camera, &context, &mut cycle_task);
                        }
                    }
                    Some(SessionControl::Permission(granted)) => {
                        info!(
                            "Camera permission {} for session {}",
                            if granted { "granted" } else { "denied" },
                            session.id()
                        );
                        session.set_permission(granted);
                        ticker.reset();
                    }
                    None => break,
                }
            }

            _ = ticker.tick() => {
                trigger(&mut session, &camera, &context, &mut cycle_task);
            }
        }
    }
}

fn trigger(
    session: &mut CaptureSession,
    camera: &Option<Arc<dyn FrameCapture>>,
    context: &CycleContext,
    cycle_task: &mut Option<JoinHandle<CycleOutcome>>,
) {
    let camera = match camera {
        Some(camera) => Arc::clone(camera),
        None => {
            skip(session, context, SkipReason::NoCamera);
            return;
        }
    };

    let cycle = match session.begin_cycle() {
        Ok(cycle) => cycle,
        Err(reason) => {
            skip(session, context, reason);
            return;
        }
    };

    context.stats_tx.send_modify(|stats| stats.cycles_started += 1);
    context.event_bus.publish(DetectcamEvent::CycleStarted {
        session_id: session.id().to_string(),
        cycle,
    });

    let generation = *context.generation.lock();
    *cycle_task = Some(tokio::spawn(run_cycle(
        context.clone(),
        camera,
        cycle,
        generation,
    )));
}

fn skip(session: &CaptureSession, context: &CycleContext, reason: SkipReason) {
    debug!("Tick skipped in session {}: {}", session.id(), reason);
    context.stats_tx.send_modify(|stats| {
        if reason == SkipReason::InFlight {
            stats.ticks_dropped_in_flight += 1;
        } else {
            stats.ticks_skipped += 1;
        }
    });
    context.event_bus.publish(DetectcamEvent::CycleSkipped {
        session_id: session.id().to_string(),
        reason: reason.to_string(),
    });
}

/// Capture one frame, submit it and publish the result.
///
/// Submission only starts after the capture completed. A result produced under
/// an older generation is dropped.
async fn run_cycle(
    context: CycleContext,
    camera: Arc<dyn FrameCapture>,
    cycle: u64,
    generation: u64,
) -> CycleOutcome {
    let frame = match camera.capture_frame(context.options).await {
        Ok(frame) => frame,
        Err(e) => {
            let error = ClientError::capture(e.to_string());
            context
                .stats_tx
                .send_modify(|stats| stats.capture_failures += 1);
            fail(&context, cycle, &error);
            return CycleOutcome::CaptureFailed;
        }
    };

    debug!(
        "Cycle {} captured {} bytes, submitting to {}",
        cycle,
        frame.len(),
        context.base_url
    );

    let submitted = context.api.submit_frame(&context.base_url, frame).await;

    let live = context.generation.lock();
    if *live != generation {
        drop(live);
        debug!(
            "Discarding result of cycle {} for stopped session {}",
            cycle, context.session_id
        );
        context
            .stats_tx
            .send_modify(|stats| stats.results_discarded += 1);
        context.event_bus.publish(DetectcamEvent::ResultDiscarded {
            session_id: context.session_id.clone(),
            cycle,
        });
        return CycleOutcome::Discarded;
    }

    match submitted {
        Ok(result) => {
            context.result_tx.send_replace(Some(result.clone()));
            if let Err(e) = context.renderer.render_frame(RenderFrame::Detection(result)) {
                warn!("Failed to render result of cycle {}: {}", cycle, e);
            }
            drop(live);

            context.stats_tx.send_modify(|stats| {
                stats.results_updated += 1;
                stats.last_update = Some(Utc::now());
            });

            context.event_bus.publish(DetectcamEvent::ResultUpdated {
                session_id: context.session_id.clone(),
                cycle,
            });
            CycleOutcome::Updated
        }
        Err(error) => {
            drop(live);
            context
                .stats_tx
                .send_modify(|stats| stats.submission_failures += 1);
            fail(&context, cycle, &error);
            CycleOutcome::SubmissionFailed
        }
    }
}

fn fail(context: &CycleContext, cycle: u64, error: &ClientError) {
    context.event_bus.publish(DetectcamEvent::CycleFailed {
        session_id: context.session_id.clone(),
        cycle,
        error: error.to_string(),
    });
}

async fn wait_cycle(
    cycle_task: &mut Option<JoinHandle<CycleOutcome>>,
) -> std::result::Result<CycleOutcome, JoinError> {
    match cycle_task {
        Some(handle) => handle.await,
        None => std::future::pending().await,
    }
}
