use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// Where a candidate URL came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CandidateSource {
    Scan,
    Manual,
}

/// Events that can occur in the detectcam system
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DetectcamEvent {
    /// A candidate was accepted and verification started
    CandidateReceived {
        candidate: String,
        source: CandidateSource,
        timestamp: SystemTime,
    },
    /// A candidate arrived while the coordinator was not idle
    CandidateDropped { candidate: String, reason: String },
    /// The remote service confirmed the endpoint
    VerificationSucceeded { url: String, timestamp: SystemTime },
    /// The candidate was blank, unreachable or refused by the service
    VerificationRejected {
        candidate: String,
        source: CandidateSource,
        error: String,
    },
    /// The rejection cooldown ended and scanning is re-enabled
    CooldownElapsed { timestamp: SystemTime },
    /// Navigation to the detection screen was requested
    NavigationRequested { route: String },
    /// Camera permission request resolved
    PermissionResolved { granted: bool },
    /// Camera preview finished initializing
    CameraReady { session_id: String },
    /// A capture cycle was started
    CycleStarted { session_id: String, cycle: u64 },
    /// A timer tick did not start a cycle
    CycleSkipped { session_id: String, reason: String },
    /// A new detection result replaced the displayed one
    ResultUpdated { session_id: String, cycle: u64 },
    /// Capture or submission failed; the previous result stays displayed
    CycleFailed {
        session_id: String,
        cycle: u64,
        error: String,
    },
    /// A result arrived after its session was torn down
    ResultDiscarded { session_id: String, cycle: u64 },
    /// A capture session started
    SessionStarted { session_id: String, url: String },
    /// A capture session was torn down
    SessionEnded { session_id: String },
    /// A system error occurred in a component
    SystemError { component: String, error: String },
}

impl DetectcamEvent {
    /// Get a human-readable description of the event
    pub fn description(&self) -> String {
        match self {
            DetectcamEvent::CandidateReceived {
                candidate, source, ..
            } => format!("Candidate {:?} received from {:?}", candidate, source),
            DetectcamEvent::CandidateDropped { candidate, reason } => {
                format!("Candidate {:?} dropped: {}", candidate, reason)
            }
            DetectcamEvent::VerificationSucceeded { url, .. } => {
                format!("Endpoint verified: {}", url)
            }
            DetectcamEvent::VerificationRejected {
                candidate, error, ..
            } => format!("Candidate {:?} rejected: {}", candidate, error),
            DetectcamEvent::CooldownElapsed { .. } => "Scan cooldown elapsed".to_string(),
            DetectcamEvent::NavigationRequested { route } => {
                format!("Navigation requested: {}", route)
            }
            DetectcamEvent::PermissionResolved { granted } => {
                format!(
                    "Camera permission {}",
                    if *granted { "granted" } else { "denied" }
                )
            }
            DetectcamEvent::CameraReady { session_id } => {
                format!("Camera ready for session {}", session_id)
            }
            DetectcamEvent::CycleStarted { session_id, cycle } => {
                format!("Cycle {} started in session {}", cycle, session_id)
            }
            DetectcamEvent::CycleSkipped { session_id, reason } => {
                format!("Cycle skipped in session {}: {}", session_id, reason)
            }
            DetectcamEvent::ResultUpdated { session_id, cycle } => {
                format!("Result updated by cycle {} in session {}", cycle, session_id)
            }
            DetectcamEvent::CycleFailed {
                session_id,
                cycle,
                error,
            } => format!(
                "Cycle {} failed in session {}: {}",
                cycle, session_id, error
            ),
            DetectcamEvent::ResultDiscarded { session_id, cycle } => {
                format!(
                    "Late result of cycle {} discarded for session {}",
                    cycle, session_id
                )
            }
            DetectcamEvent::SessionStarted { session_id, url } => {
                format!("Session {} started for {}", session_id, url)
            }
            DetectcamEvent::SessionEnded { session_id } => {
                format!("Session {} ended", session_id)
            }
            DetectcamEvent::SystemError { component, error } => {
                format!("Error in {}: {}", component, error)
            }
        }
    }

    /// Get the event type as a string for filtering
    pub fn event_type(&self) -> &'static str {
        match self {
            DetectcamEvent::CandidateReceived { .. } => "candidate_received",
            DetectcamEvent::CandidateDropped { .. } => "candidate_dropped",
            DetectcamEvent::VerificationSucceeded { .. } => "verification_succeeded",
            DetectcamEvent::VerificationRejected { .. } => "verification_rejected",
            DetectcamEvent::CooldownElapsed { .. } => "cooldown_elapsed",
            DetectcamEvent::NavigationRequested { .. } => "navigation_requested",
            DetectcamEvent::PermissionResolved { .. } => "permission_resolved",
            DetectcamEvent::CameraReady { .. } => "camera_ready",
            DetectcamEvent::CycleStarted { .. } => "cycle_started",
            DetectcamEvent::CycleSkipped { .. } => "cycle_skipped",
            DetectcamEvent::ResultUpdated { .. } => "result_updated",
            DetectcamEvent::CycleFailed { .. } => "cycle_failed",
            DetectcamEvent::ResultDiscarded { .. } => "result_discarded",
            DetectcamEvent::SessionStarted { .. } => "session_started",
            DetectcamEvent::SessionEnded { .. } => "session_ended",
            DetectcamEvent::SystemError { .. } => "system_error",
        }
    }
}

/// Async event bus for component coordination using broadcast channels
pub struct EventBus {
    sender: broadcast::Sender<DetectcamEvent>,
}

impl EventBus {
    /// Create a new event bus with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribe to events and get a receiver
    pub fn subscribe(&self) -> broadcast::Receiver<DetectcamEvent> {
        self.sender.subscribe()
    }

    /// Publish an event to all subscribers, returning how many received it.
    ///
    /// An event published with no subscribers is logged and dropped.
    pub fn publish(&self, event: DetectcamEvent) -> usize {
        match &event {
            DetectcamEvent::VerificationSucceeded { url, .. } => {
                info!("Endpoint verified: {}", url);
            }
            DetectcamEvent::SystemError { component, error } => {
                error!("System error in {}: {}", component, error);
            }
            DetectcamEvent::CycleFailed { .. } | DetectcamEvent::VerificationRejected { .. } => {
                warn!("{}", event.description());
            }
            _ => debug!("Event: {}", event.description()),
        }

        self.sender.send(event).unwrap_or(0)
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Check if there are any active subscribers
    pub fn has_subscribers(&self) -> bool {
        self.sender.receiver_count() > 0
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(100)
    }
}
