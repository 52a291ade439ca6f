use super::presenter::spawn_presenter;
use super::{ComponentState, Intent, SmartCameraApp};
use crate::error::Result;
use crate::events::SmartCameraEvent;
use std::time::SystemTime;
use tracing::{debug, error, info, warn};

impl SmartCameraApp {
    /// Register components and configure the capture session.
    ///
    /// A camera that cannot be configured does not abort startup: the failure
    /// is already recorded in the state store as `CameraUnavailable`, and the
    /// rest of the application keeps running so it can be rendered.
    pub async fn initialize(&mut self) -> Result<()> {
        info!("Initializing SmartCam components");

        {
            let mut states = self.component_states.lock().await;
            states.insert("camera".to_string(), ComponentState::Stopped);
            states.insert("classifier".to_string(), ComponentState::Stopped);
            states.insert("presenter".to_string(), ComponentState::Stopped);
            if self.keyboard_handler.is_some() {
                states.insert("keyboard".to_string(), ComponentState::Stopped);
            }
        }

        if let Err(e) = self.session.configure().await {
            error!("Camera unavailable: {}", e);
            self.set_component_state("camera", ComponentState::Failed)
                .await;
        }

        info!("Components initialized");
        Ok(())
    }

    /// Start classification, the live session, the state presenter and the
    /// keyboard surface
    pub async fn start(&mut self) -> Result<()> {
        info!("Starting SmartCam");

        self.set_component_state("classifier", ComponentState::Starting)
            .await;
        self.pipeline.start();
        match self.session.take_frames() {
            Some(frames) => self.pipeline.attach(frames),
            None => warn!("Frame stream already attached"),
        }
        self.set_component_state("classifier", ComponentState::Running)
            .await;

        if self.session.is_configured() {
            self.set_component_state("camera", ComponentState::Starting)
                .await;
            self.session.start().await.map_err(|e| {
                error!("Failed to start capture session: {}", e);
                e
            })?;
            self.set_component_state("camera", ComponentState::Running)
                .await;
        } else {
            warn!("Camera is not configured, preview disabled");
        }

        self.presenter = Some(spawn_presenter(
            self.store.clone(),
            self.cancellation_token.clone(),
        ));
        self.set_component_state("presenter", ComponentState::Running)
            .await;

        if let Some(keyboard_handler) = &self.keyboard_handler {
            self.set_component_state("keyboard", ComponentState::Starting)
                .await;
            keyboard_handler.start().await.map_err(|e| {
                error!("Failed to start keyboard handler: {}", e);
                e
            })?;
            self.set_component_state("keyboard", ComponentState::Running)
                .await;
            info!("Keyboard controls: c capture, s save, r retake, t torch, 1-3 model, q quit");
        }

        info!("SmartCam started");
        Ok(())
    }

    /// Apply one user intent. Failures are already surfaced through the
    /// state store; the error is returned for logging.
    pub async fn handle(&self, intent: Intent) -> Result<()> {
        debug!("Handling intent {:?}", intent);
        match intent {
            Intent::Capture => {
                self.photo_flow.capture().await?;
            }
            Intent::Save => {
                self.photo_flow.save().await?;
            }
            Intent::Retake => self.photo_flow.retake().await?,
            Intent::ToggleTorch => {
                self.torch.toggle_torch()?;
            }
            Intent::SelectModel(model) => self.pipeline.select_model(model),
            Intent::Quit => {
                info!("Quit requested");
                self.event_bus.notify(SmartCameraEvent::ShutdownRequested {
                    timestamp: SystemTime::now(),
                    reason: "user request".to_string(),
                });
                self.cancellation_token.cancel();
            }
        }
        Ok(())
    }
}
