pub mod app;
pub mod capture;
pub mod client;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod events;
pub mod platform;
pub mod recovery;
pub mod scan;
pub mod verifier;

pub use app::{ComponentState, DetectcamOrchestrator, PlatformBindings, Screen, ShutdownReason};
pub use capture::{CaptureScheduler, CaptureStats};
pub use client::{DetectionApi, DetectionClient, DetectionResult, MockDetectionService};
pub use config::DetectcamConfig;
pub use endpoint::EndpointUrl;
pub use error::{ClientError, DetectcamError, PlatformError, Result};
pub use events::{CandidateSource, DetectcamEvent, EventBus};
pub use recovery::{RecoveryAction, RecoveryConfig, RestartPolicy};
pub use scan::{ScanCoordinator, ScanInput, ScanPhase};
pub use verifier::EndpointVerifier;
