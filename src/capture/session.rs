use crate::endpoint::EndpointUrl;
use crate::platform::CaptureOptions;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Camera permission as last reported to the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PermissionState {
    Pending,
    Granted,
    Denied,
}

/// Why a tick did not start a capture cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NoCamera,
    PermissionPending,
    PermissionDenied,
    CameraNotReady,
    InFlight,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            SkipReason::NoCamera => "no camera",
            SkipReason::PermissionPending => "camera permission pending",
            SkipReason::PermissionDenied => "camera permission denied",
            SkipReason::CameraNotReady => "camera not ready",
            SkipReason::InFlight => "previous cycle still in flight",
        };
        f.write_str(reason)
    }
}

/// Counters of a capture session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureStats {
    pub cycles_started: u64,
    pub results_updated: u64,
    pub capture_failures: u64,
    pub submission_failures: u64,
    /// Ticks gated by camera, permission or readiness
    pub ticks_skipped: u64,
    /// Ticks dropped because a cycle was still running
    pub ticks_dropped_in_flight: u64,
    /// Results that arrived after the session was stopped
    pub results_discarded: u64,
    pub last_update: Option<DateTime<Utc>>,
}

/// Per-session state owned by the scheduler loop.
///
/// At most one cycle is in flight; a cycle only starts once the camera is ready
/// and permission is granted.
#[derive(Debug)]
pub struct CaptureSession {
    id: String,
    endpoint: EndpointUrl,
    interval: Duration,
    options: CaptureOptions,
    has_camera: bool,
    camera_ready: bool,
    permission: PermissionState,
    in_flight: bool,
    cycles: u64,
}

impl CaptureSession {
    pub fn new(
        endpoint: EndpointUrl,
        interval: Duration,
        options: CaptureOptions,
        has_camera: bool,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            endpoint,
            interval,
            options,
            has_camera,
            camera_ready: false,
            permission: PermissionState::Pending,
            in_flight: false,
            cycles: 0,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn endpoint(&self) -> &EndpointUrl {
        &self.endpoint
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn options(&self) -> CaptureOptions {
        self.options
    }

    pub fn is_camera_ready(&self) -> bool {
        self.camera_ready
    }

    pub fn permission(&self) -> PermissionState {
        self.permission
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    /// Returns true on the not-ready to ready transition
    pub fn mark_camera_ready(&mut self) -> bool {
        let transitioned = !self.camera_ready;
        self.camera_ready = true;
        transitioned
    }

    pub fn set_permission(&mut self, granted: bool) {
        self.permission = if granted {
            PermissionState::Granted
        } else {
            PermissionState::Denied
        };
    }

    /// Check whether a cycle may start now
    pub fn gate(&self) -> Result<(), SkipReason> {
        if !self.has_camera {
            return Err(SkipReason::NoCamera);
        }
        match self.permission {
            PermissionState::Pending => return Err(SkipReason::PermissionPending),
            PermissionState::Denied => return Err(SkipReason::PermissionDenied),
            PermissionState::Granted => {}
        }
        if !self.camera_ready {
            return Err(SkipReason::CameraNotReady);
        }
        if self.in_flight {
            return Err(SkipReason::InFlight);
        }
        Ok(())
    }

    /// Claim the in-flight slot, returning the new cycle number
    pub fn begin_cycle(&mut self) -> Result<u64, SkipReason> {
        self.gate()?;
        self.in_flight = true;
        self.cycles += 1;
        Ok(self.cycles)
    }

    pub fn finish_cycle(&mut self) {
        self.in_flight = false;
    }
}
