use super::{ComponentState, SmartCameraApp};
use crate::error::{Result, SmartCameraError};
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{error, info, warn};

const STOP_TIMEOUT: Duration = Duration::from_secs(10);

impl SmartCameraApp {
    /// Stop every component in reverse start order. Returns the process exit
    /// code: 0 when everything stopped cleanly, 1 otherwise.
    pub async fn shutdown(&mut self) -> Result<i32> {
        info!("Beginning graceful shutdown");
        self.cancellation_token.cancel();

        let mut exit_code = 0;

        if let Some(keyboard_handler) = &self.keyboard_handler {
            let stopped = self
                .stop_component("keyboard", keyboard_handler.stop())
                .await;
            if let Err(e) = stopped {
                error!("Error stopping keyboard: {}", e);
                exit_code = 1;
            }
        }

        if let Some(presenter) = self.presenter.take() {
            let stopped = self
                .stop_component("presenter", async move {
                    presenter
                        .await
                        .map_err(|e| SmartCameraError::component("presenter", e.to_string()))
                })
                .await;
            if let Err(e) = stopped {
                error!("Error stopping presenter: {}", e);
                exit_code = 1;
            }
        }

        let pipeline = self.pipeline();
        let stopped = self
            .stop_component("classifier", async move {
                pipeline.stop().await;
                Ok(())
            })
            .await;
        if let Err(e) = stopped {
            error!("Error stopping classifier: {}", e);
            exit_code = 1;
        }

        if self.store.torch() {
            if let Err(e) = self.torch.set_torch(false) {
                warn!("Failed to switch torch off: {}", e);
            }
        }

        let session = self.session();
        if let Err(e) = self.stop_component("camera", session.stop()).await {
            error!("Error stopping camera: {}", e);
            exit_code = 1;
        }

        info!("Graceful shutdown completed with exit code: {}", exit_code);
        Ok(exit_code)
    }

    async fn stop_component<F>(&self, component: &str, stop: F) -> Result<()>
    where
        F: Future<Output = Result<()>>,
    {
        info!("Stopping {} component", component);
        self.set_component_state(component, ComponentState::Stopping)
            .await;

        match timeout(STOP_TIMEOUT, stop).await {
            Ok(Ok(())) => {
                self.set_component_state(component, ComponentState::Stopped)
                    .await;
                info!("{} component stopped", component);
                Ok(())
            }
            Ok(Err(e)) => {
                self.set_component_state(component, ComponentState::Failed)
                    .await;
                Err(e)
            }
            Err(_) => {
                self.set_component_state(component, ComponentState::Failed)
                    .await;
                error!("{} component stop timeout", component);
                Err(SmartCameraError::system(format!(
                    "{} component stop timeout",
                    component
                )))
            }
        }
    }
}
