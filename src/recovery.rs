use crate::config::ScannerConfig;
use crate::error::PlatformError;
use std::time::Duration;
use tracing::{error, info, warn};

/// Recovery action to take after a collaborator stops
#[derive(Debug, Clone, PartialEq)]
pub enum RecoveryAction {
    /// Restart after a delay
    RetryAfterDelay(Duration),
    /// Stop using the failed collaborator
    GiveUp,
}

/// Backoff configuration for restarting a collaborator
#[derive(Debug, Clone)]
pub struct RecoveryConfig {
    /// Maximum number of restart attempts
    pub max_retries: u32,
    /// Base delay for exponential backoff
    pub base_delay: Duration,
    /// Maximum delay between restarts
    pub max_delay: Duration,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl From<&ScannerConfig> for RecoveryConfig {
    fn from(config: &ScannerConfig) -> Self {
        Self {
            max_retries: config.max_restarts,
            base_delay: Duration::from_millis(config.restart_base_delay_ms),
            max_delay: Duration::from_millis(config.restart_max_delay_ms),
        }
    }
}

/// Tracks restarts of one collaborator and decides how long to wait before the next
pub struct RestartPolicy {
    component: String,
    config: RecoveryConfig,
    retry_count: u32,
}

impl RestartPolicy {
    pub fn new<S: Into<String>>(component: S, config: RecoveryConfig) -> Self {
        Self {
            component: component.into(),
            config,
            retry_count: 0,
        }
    }

    /// Decide what to do after the collaborator failed or its stream ended
    pub fn handle_stop(&mut self, error: Option<&PlatformError>) -> RecoveryAction {
        if let Some(error) = error {
            if !error.is_recoverable() {
                warn!("Non-recoverable error in {}: {}", self.component, error);
                return RecoveryAction::GiveUp;
            }
        }

        if self.retry_count >= self.config.max_retries {
            error!(
                "Maximum restarts ({}) exceeded for {}",
                self.config.max_retries, self.component
            );
            return RecoveryAction::GiveUp;
        }

        let delay = self.calculate_delay(self.retry_count);
        self.retry_count += 1;

        info!(
            "Restarting {} in {:?} (attempt {}/{})",
            self.component, delay, self.retry_count, self.config.max_retries
        );

        RecoveryAction::RetryAfterDelay(delay)
    }

    /// Reset after the collaborator produced useful output again
    pub fn reset(&mut self) {
        if self.retry_count > 0 {
            info!("{} recovered, reset restart count", self.component);
        }
        self.retry_count = 0;
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    fn calculate_delay(&self, retry_count: u32) -> Duration {
        let factor = 2_u32.saturating_pow(retry_count.min(16));
        self.config
            .base_delay
            .saturating_mul(factor)
            .min(self.config.max_delay)
    }
}
