use super::device::{CameraDevice, FrameSink};
use crate::config::CameraConfig;
use crate::error::{CameraError, Result};
use crate::events::{report_error, EventBus, SmartCameraEvent};
use crate::frame::Frame;
use crate::state::{CameraStatus, StateStore, UserFacingError};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Owns the camera device, its video and photo outputs, and the
/// run/stop lifecycle.
pub struct CaptureSessionManager {
    config: CameraConfig,
    device: Arc<dyn CameraDevice>,
    store: StateStore,
    event_bus: Arc<EventBus>,
    sink: FrameSink,
    frames: Mutex<Option<mpsc::Receiver<Frame>>>,
    configured: AtomicBool,
}

impl CaptureSessionManager {
    pub fn new(
        config: CameraConfig,
        device: Arc<dyn CameraDevice>,
        store: StateStore,
        event_bus: Arc<EventBus>,
    ) -> Self {
        let (sink, frames) = FrameSink::new(config.frame_queue_depth, config.discard_late_frames);
        Self {
            config,
            device,
            store,
            event_bus,
            sink,
            frames: Mutex::new(Some(frames)),
            configured: AtomicBool::new(false),
        }
    }

    /// Acquire the device and attach both outputs. A failure is recorded as
    /// `CameraStatus::Unavailable` for the presentation layer and returned.
    pub async fn configure(&self) -> Result<()> {
        if self.configured.load(Ordering::SeqCst) {
            debug!("Capture session already configured");
            return Ok(());
        }

        info!(
            "Configuring capture session on {} ({}x{} @ {}fps, discard late frames: {})",
            self.device.name(),
            self.config.resolution.0,
            self.config.resolution.1,
            self.config.fps,
            self.config.discard_late_frames
        );

        match self.device.open(self.sink.clone()).await {
            Ok(()) => {
                self.configured.store(true, Ordering::SeqCst);
                self.store.set_camera_status(CameraStatus::Ready);
                Ok(())
            }
            Err(e) => {
                error!("Failed to configure capture session: {}", e);
                self.store
                    .set_camera_status(CameraStatus::Unavailable(e.to_string()));
                self.store
                    .report_error(UserFacingError::CameraUnavailable(e.to_string()));
                report_error(&self.event_bus, "capture_session", &e);
                Err(e.into())
            }
        }
    }

    /// Start live capture. Safe to call from any task; a running session is
    /// left untouched.
    pub async fn start(&self) -> Result<()> {
        if !self.configured.load(Ordering::SeqCst) {
            return Err(CameraError::Configuration {
                details: "capture session is not configured".to_string(),
            }
            .into());
        }

        if self.device.is_running() {
            debug!("Capture session already running");
            return Ok(());
        }

        self.device.start_running().await.map_err(|e| {
            error!("Failed to start capture session: {}", e);
            report_error(&self.event_bus, "capture_session", &e);
            e
        })?;

        self.store.set_camera_status(CameraStatus::Running);
        self.event_bus.notify(SmartCameraEvent::SessionStarted {
            timestamp: SystemTime::now(),
        });
        info!("Capture session started");
        Ok(())
    }

    /// Stop live capture
    pub async fn stop(&self) -> Result<()> {
        if !self.device.is_running() {
            debug!("Capture session is not running");
            return Ok(());
        }

        self.device.stop_running().await.map_err(|e| {
            warn!("Failed to stop capture session: {}", e);
            e
        })?;

        self.store.set_camera_status(CameraStatus::Stopped);
        self.event_bus.notify(SmartCameraEvent::SessionStopped {
            timestamp: SystemTime::now(),
        });
        Ok(())
    }

    /// Request one still image from the photo output
    pub async fn capture_still(&self) -> Result<Vec<u8>> {
        if !self.configured.load(Ordering::SeqCst) {
            return Err(CameraError::DeviceUnavailable {
                details: "capture session is not configured".to_string(),
            }
            .into());
        }
        Ok(self.device.capture_photo().await?)
    }

    /// Receiver side of the video output. Handed out once.
    pub fn take_frames(&self) -> Option<mpsc::Receiver<Frame>> {
        self.frames.lock().take()
    }

    pub fn is_configured(&self) -> bool {
        self.configured.load(Ordering::SeqCst)
    }

    pub fn is_running(&self) -> bool {
        self.device.is_running()
    }

    pub fn device(&self) -> Arc<dyn CameraDevice> {
        Arc::clone(&self.device)
    }

    /// Frames dropped because the consumer was behind
    pub fn dropped_frames(&self) -> u64 {
        self.sink.dropped()
    }
}
