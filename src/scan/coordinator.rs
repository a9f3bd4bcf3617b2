use super::state::{Admission, ScanIndicators, ScanMachine, ScanPhase};
use crate::config::ScannerConfig;
use crate::endpoint::EndpointUrl;
use crate::error::ClientError;
use crate::events::{CandidateSource, DetectcamEvent, EventBus};
use crate::platform::Navigator;
use crate::verifier::EndpointVerifier;
use futures::future::BoxFuture;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::{mpsc, watch};
use tokio::time::{sleep, Sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Input delivered to the scan screen
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanInput {
    /// Payload read by the barcode scanner
    Scanned(String),
    /// URL submitted from the manual-entry field
    Submitted(String),
    /// Manual-entry text changed
    Edited(String),
}

type PendingVerification = BoxFuture<'static, Result<EndpointUrl, ClientError>>;

/// Turns raw scan and manual-entry events into one verified navigation target.
///
/// Runs as a single task: candidates arriving while a verification is pending or
/// during the rejection cooldown are dropped, never queued.
pub struct ScanCoordinator {
    verifier: EndpointVerifier,
    navigator: Arc<dyn Navigator>,
    event_bus: Arc<EventBus>,
    cooldown: Duration,
    machine: ScanMachine,
    phase_tx: watch::Sender<ScanPhase>,
    indicators_tx: watch::Sender<ScanIndicators>,
}

impl ScanCoordinator {
    pub fn new(
        verifier: EndpointVerifier,
        navigator: Arc<dyn Navigator>,
        event_bus: Arc<EventBus>,
        config: &ScannerConfig,
    ) -> Self {
        let (phase_tx, _) = watch::channel(ScanPhase::Idle);
        let (indicators_tx, _) = watch::channel(ScanIndicators::default());

        Self {
            verifier,
            navigator,
            event_bus,
            cooldown: config.cooldown(),
            machine: ScanMachine::new(),
            phase_tx,
            indicators_tx,
        }
    }

    /// Watch the coordinator phase
    pub fn phase(&self) -> watch::Receiver<ScanPhase> {
        self.phase_tx.subscribe()
    }

    /// Watch the error indicators of the scan screen
    pub fn indicators(&self) -> watch::Receiver<ScanIndicators> {
        self.indicators_tx.subscribe()
    }

    /// Process inputs until an endpoint is verified.
    ///
    /// Returns `None` when cancelled, or when the inputs close with nothing
    /// left to verify.
    pub async fn run(
        mut self,
        mut inputs: mpsc::Receiver<ScanInput>,
        cancel: CancellationToken,
    ) -> Option<EndpointUrl> {
        info!("Scan coordinator started (cooldown {:?})", self.cooldown);

        let mut verification: Option<PendingVerification> = None;
        let mut cooldown: Option<Pin<Box<Sleep>>> = None;
        let mut inputs_open = true;

        loop {
            if !inputs_open && verification.is_none() {
                info!("Scan input closed without a verified endpoint");
                return None;
            }

            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    info!("Scan coordinator cancelled");
                    return None;
                }

                result = wait_verification(&mut verification) => {
                    verification = None;
                    match result {
                        Ok(endpoint) => return Some(self.complete(endpoint)),
                        Err(error) => {
                            if self.reject(error) {
                                cooldown = Some(Box::pin(sleep(self.cooldown)));
                            }
                        }
                    }
                }

                _ = wait_cooldown(&mut cooldown) => {
                    cooldown = None;
                    self.end_cooldown();
                }

                input = inputs.recv(), if inputs_open => {
                    match input {
                        Some(input) => {
                            if let Some(pending) = self.handle_input(input) {
                                verification = Some(pending);
                            }
                        }
                        None => inputs_open = false,
                    }
                }
            }
        }
    }

    fn handle_input(&mut self, input: ScanInput) -> Option<PendingVerification> {
        match input {
            ScanInput::Scanned(candidate) => self.admit(candidate, CandidateSource::Scan),
            ScanInput::Submitted(candidate) => self.admit(candidate, CandidateSource::Manual),
            ScanInput::Edited(_) => {
                self.indicators_tx
                    .send_modify(|indicators| indicators.input_error = false);
                None
            }
        }
    }

    fn admit(&mut self, candidate: String, source: CandidateSource) -> Option<PendingVerification> {
        match self.machine.admit(&candidate, source) {
            Admission::Accepted => {
                debug!("Verifying {:?} candidate {:?}", source, candidate);
                self.phase_tx.send_replace(ScanPhase::Verifying);
                self.event_bus.publish(DetectcamEvent::CandidateReceived {
                    candidate: candidate.clone(),
                    source,
                    timestamp: SystemTime::now(),
                });

                let verifier = self.verifier.clone();
                let endpoint = EndpointUrl::candidate(candidate);
                Some(Box::pin(async move { verifier.verify(endpoint).await }))
            }
            Admission::Blank => {
                self.indicators_tx
                    .send_modify(|indicators| indicators.input_error = true);
                self.event_bus.publish(DetectcamEvent::VerificationRejected {
                    candidate,
                    source,
                    error: ClientError::EmptyCandidate.to_string(),
                });
                None
            }
            admission => {
                debug!(
                    "Dropping {:?} candidate {:?}: {:?}",
                    source, candidate, admission
                );
                self.event_bus.publish(DetectcamEvent::CandidateDropped {
                    candidate,
                    reason: format!("{:?}", admission),
                });
                None
            }
        }
    }

    fn complete(&mut self, endpoint: EndpointUrl) -> EndpointUrl {
        self.machine.resolve(true);
        self.phase_tx.send_replace(ScanPhase::Verified);
        self.indicators_tx.send_replace(ScanIndicators::default());

        self.event_bus.publish(DetectcamEvent::VerificationSucceeded {
            url: endpoint.as_str().to_string(),
            timestamp: SystemTime::now(),
        });

        let route = endpoint.detection_route();
        self.event_bus.publish(DetectcamEvent::NavigationRequested {
            route: route.clone(),
        });
        info!("Navigating to {}", route);
        self.navigator.navigate(&route);

        endpoint
    }

    /// Returns true when the rejection starts a cooldown
    fn reject(&mut self, error: ClientError) -> bool {
        let (candidate, source) = self
            .machine
            .current_attempt()
            .map(|attempt| (attempt.candidate.clone(), attempt.source))
            .unwrap_or_else(|| (String::new(), CandidateSource::Scan));

        let phase = self.machine.resolve(false);
        self.phase_tx.send_replace(phase);

        let cooling_down = phase == ScanPhase::Rejected;
        self.indicators_tx.send_modify(|indicators| {
            indicators.input_error = true;
            indicators.scanner_alert = cooling_down;
        });

        warn!(
            "Candidate {:?} rejected ({} so far): {}",
            candidate,
            self.machine.rejections(),
            error
        );
        self.event_bus.publish(DetectcamEvent::VerificationRejected {
            candidate,
            source,
            error: error.to_string(),
        });

        cooling_down
    }

    fn end_cooldown(&mut self) {
        if self.machine.finish_cooldown() {
            debug!("Scan cooldown elapsed, accepting candidates again");
            self.phase_tx.send_replace(ScanPhase::Idle);
            self.indicators_tx
                .send_modify(|indicators| indicators.scanner_alert = false);
            self.event_bus.publish(DetectcamEvent::CooldownElapsed {
                timestamp: SystemTime::now(),
            });
        }
    }
}

async fn wait_verification(
    verification: &mut Option<PendingVerification>,
) -> Result<EndpointUrl, ClientError> {
    match verification {
        Some(pending) => pending.await,
        None => std::future::pending().await,
    }
}

async fn wait_cooldown(cooldown: &mut Option<Pin<Box<Sleep>>>) {
    match cooldown {
        Some(sleep) => sleep.as_mut().await,
        None => std::future::pending().await,
    }
}
