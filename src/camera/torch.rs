use super::device::{CameraDevice, ConfigurationGuard};
use crate::error::CameraError;
use crate::events::{EventBus, SmartCameraEvent};
use crate::state::StateStore;
use std::sync::Arc;
use tracing::{debug, info};

/// Switches the device torch under the device configuration lock
pub struct TorchControl {
    device: Arc<dyn CameraDevice>,
    store: StateStore,
    event_bus: Arc<EventBus>,
}

impl TorchControl {
    pub fn new(device: Arc<dyn CameraDevice>, store: StateStore, event_bus: Arc<EventBus>) -> Self {
        Self {
            device,
            store,
            event_bus,
        }
    }

    /// Set the torch. Returns `Ok(false)` without touching the device when it
    /// has no torch.
    pub fn set_torch(&self, on: bool) -> Result<bool, CameraError> {
        if !self.device.has_torch() {
            info!("Torch is not available on {}", self.device.name());
            return Ok(false);
        }

        {
            let _guard = ConfigurationGuard::acquire(self.device.as_ref())?;
            self.device.set_torch_mode(on)?;
        }

        debug!("Torch {}", if on { "on" } else { "off" });
        self.store.set_torch(on);
        self.event_bus.notify(SmartCameraEvent::TorchChanged { on });
        Ok(true)
    }

    /// Flip the torch relative to the stored state
    pub fn toggle_torch(&self) -> Result<bool, CameraError> {
        self.set_torch(!self.store.torch())
    }
}
