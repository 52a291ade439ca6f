use crate::classifier::ModelKind;
use crate::error::EventBusError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::SystemTime;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// Events that can occur in the camera system
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SmartCameraEvent {
    /// The displayed classification label changed
    LabelChanged {
        label: String,
        model: ModelKind,
        confidence: f32,
    },
    /// The active classification model was switched
    ModelChanged { model: ModelKind },
    /// The live capture session started running
    SessionStarted { timestamp: SystemTime },
    /// The live capture session stopped
    SessionStopped { timestamp: SystemTime },
    /// A still photo was captured and buffered
    PhotoCaptured { bytes: usize, timestamp: SystemTime },
    /// A buffered photo was written to the photo library
    PhotoSaved { path: PathBuf, timestamp: SystemTime },
    /// The torch was switched on or off
    TorchChanged { on: bool },
    /// A system error occurred in a component
    SystemError { component: String, error: String },
    /// System shutdown requested
    ShutdownRequested {
        timestamp: SystemTime,
        reason: String,
    },
}

impl SmartCameraEvent {
    /// Get a human-readable description of the event
    pub fn description(&self) -> String {
        match self {
            SmartCameraEvent::LabelChanged {
                label,
                model,
                confidence,
            } => format!(
                "Label '{}' from {} ({:.2})",
                label,
                model.display_name(),
                confidence
            ),
            SmartCameraEvent::ModelChanged { model } => {
                format!("Model switched to {}", model.display_name())
            }
            SmartCameraEvent::SessionStarted { .. } => "Capture session started".to_string(),
            SmartCameraEvent::SessionStopped { .. } => "Capture session stopped".to_string(),
            SmartCameraEvent::PhotoCaptured { bytes, .. } => {
                format!("Photo captured ({} bytes)", bytes)
            }
            SmartCameraEvent::PhotoSaved { path, .. } => {
                format!("Photo saved to {}", path.display())
            }
            SmartCameraEvent::TorchChanged { on } => {
                format!("Torch {}", if *on { "on" } else { "off" })
            }
            SmartCameraEvent::SystemError { component, error } => {
                format!("Error in {}: {}", component, error)
            }
            SmartCameraEvent::ShutdownRequested { reason, .. } => {
                format!("Shutdown requested: {}", reason)
            }
        }
    }

    /// Get the event type as a string for filtering
    pub fn event_type(&self) -> &'static str {
        match self {
            SmartCameraEvent::LabelChanged { .. } => "label_changed",
            SmartCameraEvent::ModelChanged { .. } => "model_changed",
            SmartCameraEvent::SessionStarted { .. } => "session_started",
            SmartCameraEvent::SessionStopped { .. } => "session_stopped",
            SmartCameraEvent::PhotoCaptured { .. } => "photo_captured",
            SmartCameraEvent::PhotoSaved { .. } => "photo_saved",
            SmartCameraEvent::TorchChanged { .. } => "torch_changed",
            SmartCameraEvent::SystemError { .. } => "system_error",
            SmartCameraEvent::ShutdownRequested { .. } => "shutdown_requested",
        }
    }
}

/// Async event bus for component coordination using broadcast channels
pub struct EventBus {
    sender: broadcast::Sender<SmartCameraEvent>,
}

impl EventBus {
    /// Create a new event bus with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to events and get a receiver
    pub fn subscribe(&self) -> broadcast::Receiver<SmartCameraEvent> {
        self.sender.subscribe()
    }

    /// Publish an event to all subscribers
    pub fn publish(&self, event: SmartCameraEvent) -> Result<usize, EventBusError> {
        match &event {
            SmartCameraEvent::SystemError { component, error } => {
                error!("System error in {}: {}", component, error);
            }
            SmartCameraEvent::PhotoSaved { path, .. } => {
                info!("Photo saved to {}", path.display());
            }
            SmartCameraEvent::ShutdownRequested { reason, .. } => {
                info!("Shutdown requested: {}", reason);
            }
            SmartCameraEvent::SessionStopped { .. } => {
                info!("Capture session stopped");
            }
            _ => {
                debug!("Event: {}", event.description());
            }
        }

        self.sender
            .send(event)
            .map_err(|e| EventBusError::PublishFailed {
                details: e.to_string(),
            })
    }

    /// Publish an event, treating a bus without subscribers as a non-event
    pub fn notify(&self, event: SmartCameraEvent) {
        let event_type = event.event_type();
        if let Err(e) = self.publish(event) {
            debug!("No subscribers for {} event: {}", event_type, e);
        }
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Check if there are any active subscribers
    pub fn has_subscribers(&self) -> bool {
        self.sender.receiver_count() > 0
    }
}

impl Clone for EventBus {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

/// Report a component failure on the bus
pub fn report_error(event_bus: &EventBus, component: &str, error: impl ToString) {
    let error = error.to_string();
    if !event_bus.has_subscribers() {
        warn!("Error in {} (no subscribers): {}", component, error);
    }
    event_bus.notify(SmartCameraEvent::SystemError {
        component: component.to_string(),
        error,
    });
}
