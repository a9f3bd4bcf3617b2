//! Scan screen logic: admits candidate URLs from the scanner or manual entry,
//! verifies one at a time, and navigates once a service is confirmed.

mod coordinator;
mod state;

#[cfg(test)]
mod tests;

pub use coordinator::{ScanCoordinator, ScanInput};
pub use state::{Admission, AttemptOutcome, ScanAttempt, ScanIndicators, ScanMachine, ScanPhase};
