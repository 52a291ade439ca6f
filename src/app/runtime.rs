use super::{Intent, ShutdownReason, SmartCameraApp};
use crate::error::{Result, SmartCameraError};
use std::sync::Arc;
use tokio::signal;
use tokio::sync::{oneshot, Mutex};
use tracing::{error, info, warn};

impl SmartCameraApp {
    /// Handle intents until quit or a shutdown signal, then shut down
    pub async fn run(&mut self) -> Result<i32> {
        info!("SmartCam is running");

        let shutdown_sender = self
            .shutdown_sender
            .take()
            .ok_or_else(|| SmartCameraError::system("Shutdown sender already taken"))?;
        let mut shutdown_receiver = self
            .shutdown_receiver
            .take()
            .ok_or_else(|| SmartCameraError::system("Shutdown receiver already taken"))?;
        let mut intents = self
            .intent_receiver
            .take()
            .ok_or_else(|| SmartCameraError::system("Intent receiver already taken"))?;

        self.setup_signal_handlers(shutdown_sender);

        let shutdown_reason = loop {
            tokio::select! {
                reason = &mut shutdown_receiver => {
                    break reason.unwrap_or_else(|_| {
                        ShutdownReason::Error("Shutdown channel closed unexpectedly".to_string())
                    });
                }
                _ = self.cancellation_token.cancelled() => break ShutdownReason::UserRequest,
                intent = intents.recv() => match intent {
                    Some(intent) => {
                        if let Err(e) = self.handle(intent).await {
                            warn!("{:?} failed: {}", intent, e);
                        }
                        if intent == Intent::Quit {
                            break ShutdownReason::UserRequest;
                        }
                    }
                    None => break ShutdownReason::UserRequest,
                },
            }
        };

        info!("Shutdown initiated: {:?}", shutdown_reason);
        let exit_code = self.shutdown().await?;

        info!("SmartCam shutdown complete");
        Ok(exit_code)
    }

    /// Forward SIGTERM and Ctrl+C to the shutdown channel
    fn setup_signal_handlers(&self, shutdown_sender: oneshot::Sender<ShutdownReason>) {
        let shutdown_sender = Arc::new(Mutex::new(Some(shutdown_sender)));

        #[cfg(unix)]
        {
            let shutdown_sender_sigterm = Arc::clone(&shutdown_sender);
            tokio::spawn(async move {
                let mut sigterm =
                    match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                        Ok(sigterm) => sigterm,
                        Err(e) => {
                            error!("Failed to register SIGTERM handler: {}", e);
                            return;
                        }
                    };
                if sigterm.recv().await.is_some() {
                    info!("Received SIGTERM signal");
                    if let Some(sender) = shutdown_sender_sigterm.lock().await.take() {
                        let _ = sender.send(ShutdownReason::Signal("SIGTERM".to_string()));
                    }
                }
            });
        }

        let shutdown_sender_sigint = Arc::clone(&shutdown_sender);
        tokio::spawn(async move {
            if let Ok(()) = signal::ctrl_c().await {
                info!("Received SIGINT signal (Ctrl+C)");
                if let Some(sender) = shutdown_sender_sigint.lock().await.take() {
                    let _ = sender.send(ShutdownReason::Signal("SIGINT".to_string()));
                }
            }
        });
    }
}
