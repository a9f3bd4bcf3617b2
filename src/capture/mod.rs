//! Detection screen capture loop: grabs a frame on a fixed period, submits it to
//! the verified service and keeps the latest annotated result on display.

mod scheduler;
mod session;
#[cfg(test)]
mod tests;

pub use scheduler::CaptureScheduler;
pub use session::{CaptureSession, CaptureStats, PermissionState, SkipReason};
