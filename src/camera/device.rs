use crate::error::CameraError;
use crate::frame::Frame;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::trace;

/// A camera that can stream frames, take stills and drive a torch
#[async_trait]
pub trait CameraDevice: Send + Sync {
    /// Human-readable device name for logs
    fn name(&self) -> String;

    /// Acquire the device and attach the photo output and the video output
    /// feeding `video`
    async fn open(&self, video: FrameSink) -> Result<(), CameraError>;

    async fn start_running(&self) -> Result<(), CameraError>;

    async fn stop_running(&self) -> Result<(), CameraError>;

    fn is_running(&self) -> bool;

    /// Take one encoded still image
    async fn capture_photo(&self) -> Result<Vec<u8>, CameraError>;

    fn has_torch(&self) -> bool;

    /// Take exclusive configuration access; pair with
    /// `unlock_for_configuration`, normally through `ConfigurationGuard`
    fn lock_for_configuration(&self) -> Result<(), CameraError>;

    fn unlock_for_configuration(&self);

    /// Requires the configuration lock
    fn set_torch_mode(&self, on: bool) -> Result<(), CameraError>;
}

/// Video output attached to a device. With `discard_late` set, frames that
/// arrive while the queue is full are dropped instead of waiting.
#[derive(Clone)]
pub struct FrameSink {
    sender: mpsc::Sender<Frame>,
    discard_late: bool,
    delivered: Arc<AtomicU64>,
    dropped: Arc<AtomicU64>,
}

impl FrameSink {
    pub fn new(depth: usize, discard_late: bool) -> (Self, mpsc::Receiver<Frame>) {
        let (sender, receiver) = mpsc::channel(depth.max(1));
        (
            Self {
                sender,
                discard_late,
                delivered: Arc::new(AtomicU64::new(0)),
                dropped: Arc::new(AtomicU64::new(0)),
            },
            receiver,
        )
    }

    /// Hand a frame to the consumer. Returns false once the consumer is gone.
    pub async fn deliver(&self, frame: Frame) -> bool {
        if self.discard_late {
            match self.sender.try_send(frame) {
                Ok(()) => {
                    self.delivered.fetch_add(1, Ordering::Relaxed);
                    true
                }
                Err(mpsc::error::TrySendError::Full(frame)) => {
                    trace!("Dropping late frame {}", frame.id);
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                    true
                }
                Err(mpsc::error::TrySendError::Closed(_)) => false,
            }
        } else if self.sender.send(frame).await.is_ok() {
            self.delivered.fetch_add(1, Ordering::Relaxed);
            true
        } else {
            false
        }
    }

    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Holds a device's configuration lock and releases it on drop
pub struct ConfigurationGuard<'a> {
    device: &'a dyn CameraDevice,
}

impl<'a> ConfigurationGuard<'a> {
    pub fn acquire(device: &'a dyn CameraDevice) -> Result<Self, CameraError> {
        device.lock_for_configuration()?;
        Ok(Self { device })
    }
}

impl Drop for ConfigurationGuard<'_> {
    fn drop(&mut self) {
        self.device.unlock_for_configuration();
    }
}
