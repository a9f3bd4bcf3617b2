use super::{DetectcamOrchestrator, ShutdownReason, ShutdownTrigger};
use crate::error::{DetectcamError, Result};
use tokio::signal;
use tracing::{info, warn};

impl DetectcamOrchestrator {
    /// Run both screens with signal handling until shutdown
    pub async fn run(&mut self) -> Result<i32> {
        info!("Detectcam is running");

        let mut shutdown_receiver =
            self.shutdown_receiver
                .take()
                .ok_or_else(|| DetectcamError::System {
                    message: "Shutdown receiver already taken".to_string(),
                })?;

        self.setup_signal_handlers(self.shutdown_trigger());

        let endpoint = tokio::select! {
            reason = &mut shutdown_receiver => {
                info!("Shutdown requested on the scan screen: {:?}", reason);
                return self.shutdown().await;
            }
            endpoint = self.run_scan_screen() => endpoint?,
        };

        let Some(endpoint) = endpoint else {
            info!("Shutdown initiated: {:?}", ShutdownReason::ScanAbandoned);
            return self.shutdown().await;
        };

        tokio::select! {
            reason = &mut shutdown_receiver => {
                info!("Shutdown requested while opening detection: {:?}", reason);
                return self.shutdown().await;
            }
            started = self.start_detection_screen(endpoint) => started?,
        }

        let shutdown_reason = shutdown_receiver.await.map_err(|_| DetectcamError::System {
            message: "Shutdown channel closed unexpectedly".to_string(),
        })?;

        info!("Shutdown initiated: {:?}", shutdown_reason);

        let exit_code = self.shutdown().await?;

        info!("Detectcam shutdown complete");
        Ok(exit_code)
    }

    /// Set up signal handlers for graceful shutdown
    fn setup_signal_handlers(&self, trigger: ShutdownTrigger) {
        // Handle SIGTERM - Unix only
        #[cfg(unix)]
        {
            let trigger_sigterm = trigger.clone();
            tokio::spawn(async move {
                let mut sigterm =
                    match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                        Ok(sigterm) => sigterm,
                        Err(e) => {
                            warn!("Failed to register SIGTERM handler: {}", e);
                            return;
                        }
                    };

                if let Some(()) = sigterm.recv().await {
                    info!("Received SIGTERM signal");
                    trigger_sigterm
                        .request(ShutdownReason::Signal("SIGTERM".to_string()))
                        .await;
                }
            });
        }

        // Handle SIGINT (Ctrl+C) - Cross-platform
        tokio::spawn(async move {
            if let Ok(()) = signal::ctrl_c().await {
                info!("Received SIGINT signal (Ctrl+C)");
                trigger
                    .request(ShutdownReason::Signal("SIGINT".to_string()))
                    .await;
            }
        });
    }
}
