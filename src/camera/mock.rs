use super::device::{CameraDevice, FrameSink};
use crate::config::CameraConfig;
use crate::error::CameraError;
use crate::frame::{Frame, PixelFormat};
use async_trait::async_trait;
use image::codecs::jpeg::JpegEncoder;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

/// In-process camera producing synthetic BGRA frames and JPEG stills
pub struct MockCamera {
    config: CameraConfig,
    has_torch: bool,
    fail_open: bool,
    fail_capture: AtomicBool,
    fail_stop: AtomicBool,
    photo_delay: Duration,
    sink: Mutex<Option<FrameSink>>,
    is_running: Arc<AtomicBool>,
    capture_task: Mutex<Option<(CancellationToken, JoinHandle<()>)>>,
    frame_counter: Arc<AtomicU64>,
    torch_on: AtomicBool,
    config_locked: AtomicBool,
    lock_count: AtomicUsize,
    unlock_count: AtomicUsize,
    photos_taken: AtomicUsize,
}

impl MockCamera {
    pub fn new(config: CameraConfig) -> Self {
        Self {
            config,
            has_torch: true,
            fail_open: false,
            fail_capture: AtomicBool::new(false),
            fail_stop: AtomicBool::new(false),
            photo_delay: Duration::ZERO,
            sink: Mutex::new(None),
            is_running: Arc::new(AtomicBool::new(false)),
            capture_task: Mutex::new(None),
            frame_counter: Arc::new(AtomicU64::new(0)),
            torch_on: AtomicBool::new(false),
            config_locked: AtomicBool::new(false),
            lock_count: AtomicUsize::new(0),
            unlock_count: AtomicUsize::new(0),
            photos_taken: AtomicUsize::new(0),
        }
    }

    pub fn with_torch(mut self, has_torch: bool) -> Self {
        self.has_torch = has_torch;
        self
    }

    /// Make `open` fail as if no device were present
    pub fn failing_open(mut self) -> Self {
        self.fail_open = true;
        self
    }

    /// Delay before a requested still is returned
    pub fn with_photo_delay(mut self, delay: Duration) -> Self {
        self.photo_delay = delay;
        self
    }

    /// Tick period for the capture loop; tokio rejects a zero period
    fn frame_interval(fps: u32) -> Duration {
        Duration::from_secs_f64(1.0 / fps.max(1) as f64).max(Duration::from_millis(1))
    }

    pub fn set_fail_capture(&self, fail: bool) {
        self.fail_capture.store(fail, Ordering::SeqCst);
    }

    /// Make `stop_running` fail and leave the stream running
    pub fn set_fail_stop(&self, fail: bool) {
        self.fail_stop.store(fail, Ordering::SeqCst);
    }

    pub fn torch_on(&self) -> bool {
        self.torch_on.load(Ordering::SeqCst)
    }

    pub fn is_config_locked(&self) -> bool {
        self.config_locked.load(Ordering::SeqCst)
    }

    /// (locks, unlocks) taken so far
    pub fn lock_counts(&self) -> (usize, usize) {
        (
            self.lock_count.load(Ordering::SeqCst),
            self.unlock_count.load(Ordering::SeqCst),
        )
    }

    pub fn photos_taken(&self) -> usize {
        self.photos_taken.load(Ordering::SeqCst)
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_counter.load(Ordering::Relaxed)
    }

    fn synthetic_frame(id: u64, width: u32, height: u32) -> Frame {
        let shade = (id % 256) as u8;
        let mut data = Vec::with_capacity(width as usize * height as usize * 4);
        for y in 0..height {
            for x in 0..width {
                data.extend_from_slice(&[
                    shade,
                    (x % 256) as u8,
                    (y % 256) as u8,
                    0xFF,
                ]);
            }
        }
        Frame::new(id, data, width, height, PixelFormat::Bgra32)
    }

    fn encode_still(width: u32, height: u32) -> Result<Vec<u8>, CameraError> {
        let mut rgb = Vec::with_capacity(width as usize * height as usize * 3);
        for y in 0..height {
            for x in 0..width {
                rgb.extend_from_slice(&[(x % 256) as u8, (y % 256) as u8, 0x80]);
            }
        }

        let mut jpeg = Vec::new();
        JpegEncoder::new_with_quality(&mut jpeg, 85)
            .encode(&rgb, width, height, image::ColorType::Rgb8)
            .map_err(|e| CameraError::StillCapture {
                details: format!("Failed to encode still: {}", e),
            })?;
        Ok(jpeg)
    }
}

#[async_trait]
impl CameraDevice for MockCamera {
    fn name(&self) -> String {
        format!("mock camera {}", self.config.index)
    }

    async fn open(&self, video: FrameSink) -> Result<(), CameraError> {
        if self.fail_open {
            return Err(CameraError::DeviceUnavailable {
                details: format!("no device at index {}", self.config.index),
            });
        }

        *self.sink.lock() = Some(video);
        debug!("Mock camera opened with video and photo outputs");
        Ok(())
    }

    async fn start_running(&self) -> Result<(), CameraError> {
        let sink = self.sink.lock().clone().ok_or_else(|| CameraError::Configuration {
            details: "video output not attached".to_string(),
        })?;

        if self.is_running.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let token = CancellationToken::new();
        let task_token = token.clone();
        let frame_counter = Arc::clone(&self.frame_counter);
        let (width, height) = self.config.resolution;
        let frame_interval = Self::frame_interval(self.config.fps);

        let task = tokio::spawn(async move {
            let mut interval_timer = tokio::time::interval(frame_interval);
            info!("Mock capture loop started");

            loop {
                tokio::select! {
                    _ = task_token.cancelled() => break,
                    _ = interval_timer.tick() => {
                        let frame_id = frame_counter.fetch_add(1, Ordering::Relaxed);
                        trace!("Generated mock frame {} ({}x{})", frame_id, width, height);
                        if !sink.deliver(Self::synthetic_frame(frame_id, width, height)).await {
                            debug!("Frame consumer closed");
                            break;
                        }
                    }
                }
            }

            info!("Mock capture loop stopped");
        });

        *self.capture_task.lock() = Some((token, task));
        Ok(())
    }

    async fn stop_running(&self) -> Result<(), CameraError> {
        if self.fail_stop.load(Ordering::SeqCst) {
            return Err(CameraError::CaptureStream {
                details: "injected stop failure".to_string(),
            });
        }

        self.is_running.store(false, Ordering::SeqCst);

        let task = self.capture_task.lock().take();
        if let Some((token, handle)) = task {
            token.cancel();
            if let Err(e) = handle.await {
                debug!("Mock capture task ended abnormally: {}", e);
            }
        }
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.is_running.load(Ordering::SeqCst)
    }

    async fn capture_photo(&self) -> Result<Vec<u8>, CameraError> {
        if self.sink.lock().is_none() {
            return Err(CameraError::DeviceUnavailable {
                details: "photo output not attached".to_string(),
            });
        }

        if !self.photo_delay.is_zero() {
            tokio::time::sleep(self.photo_delay).await;
        }

        if self.fail_capture.load(Ordering::SeqCst) {
            return Err(CameraError::StillCapture {
                details: "injected capture failure".to_string(),
            });
        }

        let (width, height) = self.config.resolution;
        let jpeg = Self::encode_still(width, height)?;
        self.photos_taken.fetch_add(1, Ordering::SeqCst);
        Ok(jpeg)
    }

    fn has_torch(&self) -> bool {
        self.has_torch
    }

    fn lock_for_configuration(&self) -> Result<(), CameraError> {
        if self.config_locked.swap(true, Ordering::SeqCst) {
            return Err(CameraError::LockFailed {
                details: "configuration already locked".to_string(),
            });
        }
        self.lock_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn unlock_for_configuration(&self) {
        self.config_locked.store(false, Ordering::SeqCst);
        self.unlock_count.fetch_add(1, Ordering::SeqCst);
    }

    fn set_torch_mode(&self, on: bool) -> Result<(), CameraError> {
        if !self.has_torch {
            return Err(CameraError::NoTorch);
        }
        if !self.is_config_locked() {
            return Err(CameraError::LockFailed {
                details: "torch changed without configuration lock".to_string(),
            });
        }
        self.torch_on.store(on, Ordering::SeqCst);
        Ok(())
    }
}
