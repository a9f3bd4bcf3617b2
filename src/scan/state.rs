use crate::events::CandidateSource;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Phase of the scan coordinator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScanPhase {
    /// Accepting new candidates
    Idle,
    /// One candidate is being verified
    Verifying,
    /// A candidate was verified; the coordinator is done
    Verified,
    /// A scanned candidate was rejected; cooling down
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttemptOutcome {
    Pending,
    Verified,
    Rejected,
}

/// One verification cycle for one candidate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanAttempt {
    pub candidate: String,
    pub source: CandidateSource,
    pub outcome: AttemptOutcome,
    pub timestamp: DateTime<Utc>,
}

impl ScanAttempt {
    fn new(candidate: String, source: CandidateSource, outcome: AttemptOutcome) -> Self {
        Self {
            candidate,
            source,
            outcome,
            timestamp: Utc::now(),
        }
    }
}

/// Answer to an incoming candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Verification started
    Accepted,
    /// Blank manual entry, rejected on the spot
    Blank,
    /// Another candidate is being verified
    Busy,
    /// Rejection cooldown in progress
    CoolingDown,
    /// An endpoint was already verified
    Finished,
}

/// Visual feedback owned by the scan screen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScanIndicators {
    /// The manual-entry field is flagged as wrong
    pub input_error: bool,
    /// The scanner frame is highlighted while cooling down
    pub scanner_alert: bool,
}

/// Transition table of the scan coordinator.
///
/// At most one attempt is pending at any time; candidates are only admitted in
/// [`ScanPhase::Idle`].
#[derive(Debug)]
pub struct ScanMachine {
    phase: ScanPhase,
    current: Option<ScanAttempt>,
    rejections: u64,
}

impl ScanMachine {
    pub fn new() -> Self {
        Self {
            phase: ScanPhase::Idle,
            current: None,
            rejections: 0,
        }
    }

    pub fn phase(&self) -> ScanPhase {
        self.phase
    }

    pub fn current_attempt(&self) -> Option<&ScanAttempt> {
        self.current.as_ref()
    }

    pub fn rejections(&self) -> u64 {
        self.rejections
    }

    pub fn admit(&mut self, candidate: &str, source: CandidateSource) -> Admission {
        match self.phase {
            ScanPhase::Verifying => Admission::Busy,
            ScanPhase::Rejected => Admission::CoolingDown,
            ScanPhase::Verified => Admission::Finished,
            ScanPhase::Idle => {
                if source == CandidateSource::Manual && candidate.trim().is_empty() {
                    self.rejections += 1;
                    self.current = Some(ScanAttempt::new(
                        candidate.to_string(),
                        source,
                        AttemptOutcome::Rejected,
                    ));
                    return Admission::Blank;
                }

                self.current = Some(ScanAttempt::new(
                    candidate.to_string(),
                    source,
                    AttemptOutcome::Pending,
                ));
                self.phase = ScanPhase::Verifying;
                Admission::Accepted
            }
        }
    }

    /// Record the verification outcome of the pending attempt.
    ///
    /// Rejected scans enter the cooldown; rejected manual entries return to idle
    /// straight away. Outside [`ScanPhase::Verifying`] this is a no-op.
    pub fn resolve(&mut self, verified: bool) -> ScanPhase {
        if self.phase != ScanPhase::Verifying {
            return self.phase;
        }

        let source = self
            .current
            .as_ref()
            .map(|attempt| attempt.source)
            .unwrap_or(CandidateSource::Scan);

        let outcome = if verified {
            AttemptOutcome::Verified
        } else {
            self.rejections += 1;
            AttemptOutcome::Rejected
        };
        if let Some(attempt) = self.current.as_mut() {
            attempt.outcome = outcome;
        }

        self.phase = match (verified, source) {
            (true, _) => ScanPhase::Verified,
            (false, CandidateSource::Scan) => ScanPhase::Rejected,
            (false, CandidateSource::Manual) => ScanPhase::Idle,
        };
        self.phase
    }

    /// Leave the rejection cooldown. Returns false when not cooling down.
    pub fn finish_cooldown(&mut self) -> bool {
        if self.phase != ScanPhase::Rejected {
            return false;
        }
        self.phase = ScanPhase::Idle;
        true
    }
}

impl Default for ScanMachine {
    fn default() -> Self {
        Self::new()
    }
}
