use super::{ComponentState, DetectcamOrchestrator, Screen};
use crate::capture::CaptureScheduler;
use crate::endpoint::EndpointUrl;
use crate::error::{DetectcamError, Result};
use crate::events::{DetectcamEvent, EventBus};
use crate::platform::{BarcodeScanner, ChannelNavigator};
use crate::recovery::{RecoveryAction, RecoveryConfig, RestartPolicy};
use crate::scan::{ScanCoordinator, ScanInput};
use crate::verifier::EndpointVerifier;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

impl DetectcamOrchestrator {
    /// Run the scan screen until an endpoint is verified.
    ///
    /// Returns `None` when the scan input closes first or the orchestrator is
    /// cancelled. Manual entry keeps working when camera access is denied.
    pub async fn run_scan_screen(&mut self) -> Result<Option<EndpointUrl>> {
        self.screen = Screen::Scan;
        self.set_component_state("scanner", ComponentState::Starting)
            .await;

        let input_tx = self.input_tx.take().ok_or_else(|| {
            DetectcamError::system("Scan screen already ran")
        })?;
        let input_rx = self.input_rx.take().ok_or_else(|| {
            DetectcamError::system("Scan input receiver already taken")
        })?;

        let granted = self.permission.request_camera_access().await.is_granted();
        self.event_bus
            .publish(DetectcamEvent::PermissionResolved { granted });

        let pump_cancel = self.cancellation_token.child_token();
        let pump = match (granted, self.scanner.take()) {
            (true, Some(scanner)) => {
                let policy = RestartPolicy::new(
                    "scanner",
                    RecoveryConfig::from(&self.config.scanner),
                );
                self.set_component_state("scanner", ComponentState::Running)
                    .await;
                Some(tokio::spawn(scanner_pump(
                    scanner,
                    input_tx.clone(),
                    policy,
                    Arc::clone(&self.event_bus),
                    pump_cancel.clone(),
                )))
            }
            (true, None) => {
                warn!("No barcode scanner available, manual entry only");
                self.set_component_state("scanner", ComponentState::Failed)
                    .await;
                None
            }
            (false, _) => {
                warn!("Camera permission denied, scanning disabled; manual entry still available");
                self.set_component_state("scanner", ComponentState::Stopped)
                    .await;
                None
            }
        };

        if let Some(url) = self.manual_url.take() {
            info!("Submitting {} through manual entry", url);
            input_tx
                .send(ScanInput::Submitted(url))
                .await
                .map_err(|_| DetectcamError::system("Scan input closed"))?;
        }
        drop(input_tx);

        let (route_tx, mut route_rx) = mpsc::unbounded_channel();
        let coordinator = ScanCoordinator::new(
            EndpointVerifier::new(Arc::clone(&self.api)),
            Arc::new(ChannelNavigator::new(route_tx)),
            Arc::clone(&self.event_bus),
            &self.config.scanner,
        );

        let verified = coordinator
            .run(input_rx, self.cancellation_token.child_token())
            .await;

        pump_cancel.cancel();
        if let Some(pump) = pump {
            if let Err(e) = pump.await {
                error!("Scanner pump failed: {}", e);
            }
        }
        self.set_component_state("scanner", ComponentState::Stopped)
            .await;

        if verified.is_none() {
            return Ok(None);
        }

        // The detection screen only knows what the route carries
        let route = route_rx
            .try_recv()
            .map_err(|_| DetectcamError::system("Verified endpoint without navigation"))?;
        let endpoint = EndpointUrl::from_route(&route)?;
        info!("Scan screen finished with {}", endpoint);

        self.endpoint = Some(endpoint.clone());
        Ok(Some(endpoint))
    }

    /// Open the detection screen for a verified endpoint
    pub async fn start_detection_screen(&mut self, endpoint: EndpointUrl) -> Result<()> {
        self.screen = Screen::Detection;
        self.set_component_state("capture", ComponentState::Starting)
            .await;

        let scheduler = CaptureScheduler::start(
            endpoint,
            Arc::clone(&self.api),
            self.camera.clone(),
            Arc::clone(&self.renderer),
            Arc::clone(&self.event_bus),
            &self.config.capture,
        )
        .map_err(|e| {
            error!("Failed to start capture scheduler: {}", e);
            e
        })?;

        let granted = self.permission.request_camera_access().await.is_granted();
        self.event_bus
            .publish(DetectcamEvent::PermissionResolved { granted });
        scheduler.set_permission(granted);

        let camera = self.camera.clone();
        self.scheduler = Some(scheduler);

        match camera {
            Some(camera) if granted => {
                let ready = tokio::select! {
                    _ = self.cancellation_token.cancelled() => None,
                    ready = camera.wait_ready() => Some(ready),
                };

                match ready {
                    Some(Ok(())) => {
                        if let Some(scheduler) = &self.scheduler {
                            scheduler.camera_ready();
                        }
                        self.set_component_state("capture", ComponentState::Running)
                            .await;
                    }
                    Some(Err(e)) => {
                        error!("Camera failed to initialize: {}", e);
                        self.event_bus.publish(DetectcamEvent::SystemError {
                            component: "camera".to_string(),
                            error: e.to_string(),
                        });
                        self.set_component_state("capture", ComponentState::Failed)
                            .await;
                    }
                    None => debug!("Cancelled while waiting for the camera"),
                }
            }
            Some(_) => {
                warn!("Camera permission denied, no frames will be captured");
                self.set_component_state("capture", ComponentState::Running)
                    .await;
            }
            None => {
                warn!("No camera available, no frames will be captured");
                self.set_component_state("capture", ComponentState::Running)
                    .await;
            }
        }

        Ok(())
    }
}

/// Forward scanner payloads into the scan input, restarting the scanner when
/// its stream ends
async fn scanner_pump(
    mut scanner: Box<dyn BarcodeScanner>,
    inputs: mpsc::Sender<ScanInput>,
    mut policy: RestartPolicy,
    event_bus: Arc<EventBus>,
    cancel: CancellationToken,
) {
    loop {
        let stop_error = match scanner.start().await {
            Ok(mut payloads) => loop {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    payload = payloads.recv() => match payload {
                        Some(payload) => {
                            policy.reset();
                            if inputs.send(ScanInput::Scanned(payload)).await.is_err() {
                                return;
                            }
                        }
                        None => break None,
                    }
                }
            },
            Err(e) => Some(e),
        };

        match policy.handle_stop(stop_error.as_ref()) {
            RecoveryAction::RetryAfterDelay(delay) => {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = sleep(delay) => {}
                }
            }
            RecoveryAction::GiveUp => {
                let reason = stop_error
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| "scanner stopped".to_string());
                warn!("Barcode scanning ended: {}", reason);
                event_bus.publish(DetectcamEvent::SystemError {
                    component: "scanner".to_string(),
                    error: reason,
                });
                return;
            }
        }
    }
}
