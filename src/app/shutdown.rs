use super::{ComponentState, DetectcamOrchestrator};
use crate::error::{DetectcamError, Result};
use std::time::Duration;
use tokio::time::timeout;
use tracing::{error, info};

const CAPTURE_STOP_TIMEOUT: Duration = Duration::from_secs(5);

impl DetectcamOrchestrator {
    /// Perform graceful shutdown of all components
    pub async fn shutdown(&mut self) -> Result<i32> {
        info!("Beginning graceful shutdown");

        // Cancel the scan screen and any pending camera wait
        self.cancellation_token.cancel();

        let mut exit_code = 0;

        if let Err(e) = self.stop_capture().await {
            error!("Error stopping capture: {}", e);
            exit_code = 1;
        }

        self.set_component_state("scanner", ComponentState::Stopped)
            .await;

        info!("Graceful shutdown completed with exit code: {}", exit_code);
        Ok(exit_code)
    }

    /// Tear the capture timer down; late results are discarded
    async fn stop_capture(&mut self) -> Result<()> {
        let Some(scheduler) = self.scheduler.take() else {
            self.set_component_state("capture", ComponentState::Stopped)
                .await;
            return Ok(());
        };

        info!("Stopping capture component");
        self.set_component_state("capture", ComponentState::Stopping)
            .await;

        match timeout(CAPTURE_STOP_TIMEOUT, scheduler.stop()).await {
            Ok(()) => {
                match serde_json::to_string(&scheduler.stats()) {
                    Ok(stats) => info!("Capture component stopped, session stats: {}", stats),
                    Err(e) => info!("Capture component stopped (stats unavailable: {})", e),
                }
                self.set_component_state("capture", ComponentState::Stopped)
                    .await;
                Ok(())
            }
            Err(_) => {
                self.set_component_state("capture", ComponentState::Failed)
                    .await;
                error!("capture component stop timeout");
                Err(DetectcamError::System {
                    message: "capture component stop timeout".to_string(),
                })
            }
        }
    }
}
