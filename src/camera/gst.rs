use super::device::{CameraDevice, FrameSink};
use crate::config::CameraConfig;
use crate::error::CameraError;
use crate::frame::{Frame, PixelFormat};
use async_trait::async_trait;
use gstreamer::prelude::*;
use gstreamer::Pipeline;
use gstreamer_app::AppSink;
use gstreamer_video::VideoInfo;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

/// How long a still request waits for the next streamed frame
const STILL_FRAME_WAIT: Duration = Duration::from_secs(2);

/// V4L2 camera driven through a GStreamer MJPEG pipeline. Stills are taken
/// from the streamed JPEG frames; generic V4L2 devices expose no torch.
pub struct GstCamera {
    config: CameraConfig,
    pipeline: Mutex<Option<Pipeline>>,
    sink: Mutex<Option<FrameSink>>,
    is_running: Arc<AtomicBool>,
    capture_task: Mutex<Option<JoinHandle<()>>>,
    frame_counter: Arc<AtomicU64>,
    latest_jpeg: Arc<Mutex<Option<Arc<Vec<u8>>>>>,
    frame_ready: Arc<Notify>,
}

impl GstCamera {
    pub fn new(config: CameraConfig) -> Self {
        Self {
            config,
            pipeline: Mutex::new(None),
            sink: Mutex::new(None),
            is_running: Arc::new(AtomicBool::new(false)),
            capture_task: Mutex::new(None),
            frame_counter: Arc::new(AtomicU64::new(0)),
            latest_jpeg: Arc::new(Mutex::new(None)),
            frame_ready: Arc::new(Notify::new()),
        }
    }

    /// Build GStreamer pipeline string for MJPEG capture
    fn build_pipeline_string(&self) -> String {
        let (width, height) = self.config.resolution;
        format!(
            "v4l2src device=/dev/video{} io-mode=mmap do-timestamp=true ! \
             image/jpeg,width={},height={},framerate={}/1 ! \
             queue max-size-buffers=2 leaky=downstream ! \
             appsink name=sink sync=false max-buffers=2 drop=true qos=false enable-last-sample=false emit-signals=false",
            self.config.index, width, height, self.config.fps
        )
    }

    fn sample_to_frame(sample: &gstreamer::Sample, id: u64) -> Result<Frame, CameraError> {
        let buffer = sample.buffer().ok_or_else(|| CameraError::CaptureStream {
            details: "No buffer in sample".to_string(),
        })?;
        let caps = sample.caps().ok_or_else(|| CameraError::CaptureStream {
            details: "No caps in sample".to_string(),
        })?;
        let video_info = VideoInfo::from_caps(caps).map_err(|e| CameraError::CaptureStream {
            details: format!("Failed to get video info: {}", e),
        })?;
        let map = buffer
            .map_readable()
            .map_err(|e| CameraError::CaptureStream {
                details: format!("Failed to map buffer: {}", e),
            })?;

        Ok(Frame::new(
            id,
            map.as_slice().to_vec(),
            video_info.width(),
            video_info.height(),
            PixelFormat::Mjpeg,
        ))
    }
}

#[async_trait]
impl CameraDevice for GstCamera {
    fn name(&self) -> String {
        format!("/dev/video{}", self.config.index)
    }

    async fn open(&self, video: FrameSink) -> Result<(), CameraError> {
        gstreamer::init().map_err(|e| CameraError::DeviceUnavailable {
            details: format!("Failed to initialize GStreamer: {}", e),
        })?;

        let pipeline_desc = self.build_pipeline_string();
        info!("Creating GStreamer pipeline: {}", pipeline_desc);

        let pipeline = gstreamer::parse::launch(&pipeline_desc)
            .map_err(|e| CameraError::Configuration {
                details: format!("Failed to create pipeline: {}", e),
            })?
            .downcast::<Pipeline>()
            .map_err(|_| CameraError::Configuration {
                details: "Failed to downcast to Pipeline".to_string(),
            })?;

        pipeline
            .set_state(gstreamer::State::Ready)
            .map_err(|e| CameraError::DeviceUnavailable {
                details: format!("Camera did not reach ready state: {}", e),
            })?;

        *self.pipeline.lock() = Some(pipeline);
        *self.sink.lock() = Some(video);
        Ok(())
    }

    async fn start_running(&self) -> Result<(), CameraError> {
        let pipeline = self.pipeline.lock().clone().ok_or_else(|| CameraError::Configuration {
            details: "Pipeline not initialized".to_string(),
        })?;
        let sink = self.sink.lock().clone().ok_or_else(|| CameraError::Configuration {
            details: "video output not attached".to_string(),
        })?;

        let appsink = pipeline
            .by_name("sink")
            .and_then(|element| element.downcast::<AppSink>().ok())
            .ok_or_else(|| CameraError::Configuration {
                details: "Pipeline has no appsink".to_string(),
            })?;

        if self.is_running.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let (tx, mut rx) = mpsc::unbounded_channel();
        appsink.set_callbacks(
            gstreamer_app::AppSinkCallbacks::builder()
                .new_sample(move |appsink| {
                    let sample = appsink
                        .pull_sample()
                        .map_err(|_| gstreamer::FlowError::Eos)?;
                    let _ = tx.send(sample);
                    Ok(gstreamer::FlowSuccess::Ok)
                })
                .build(),
        );

        if let Err(e) = pipeline.set_state(gstreamer::State::Playing) {
            self.is_running.store(false, Ordering::SeqCst);
            return Err(CameraError::CaptureStream {
                details: format!("Failed to start GStreamer pipeline: {}", e),
            });
        }
        info!("GStreamer pipeline started");

        let is_running = Arc::clone(&self.is_running);
        let frame_counter = Arc::clone(&self.frame_counter);
        let latest_jpeg = Arc::clone(&self.latest_jpeg);
        let frame_ready = Arc::clone(&self.frame_ready);

        let task = tokio::spawn(async move {
            while is_running.load(Ordering::Relaxed) {
                tokio::select! {
                    sample = rx.recv() => {
                        let Some(sample) = sample else { break };
                        let id = frame_counter.fetch_add(1, Ordering::Relaxed);
                        match Self::sample_to_frame(&sample, id) {
                            Ok(frame) => {
                                trace!("Captured MJPEG frame {} ({} bytes)", id, frame.data.len());
                                *latest_jpeg.lock() = Some(Arc::clone(&frame.data));
                                frame_ready.notify_waiters();
                                if !sink.deliver(frame).await {
                                    debug!("Frame consumer closed");
                                    break;
                                }
                            }
                            Err(e) => error!("Error processing GStreamer sample: {}", e),
                        }
                    }
                    _ = tokio::time::sleep(Duration::from_millis(100)) => {}
                }
            }

            let _ = pipeline.set_state(gstreamer::State::Ready);
            info!("GStreamer capture loop stopped");
        });

        *self.capture_task.lock() = Some(task);
        Ok(())
    }

    async fn stop_running(&self) -> Result<(), CameraError> {
        self.is_running.store(false, Ordering::SeqCst);

        let task = self.capture_task.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                error!("Error waiting for GStreamer capture task: {}", e);
            }
        }
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.is_running.load(Ordering::SeqCst)
    }

    async fn capture_photo(&self) -> Result<Vec<u8>, CameraError> {
        if self.is_running() {
            let next_frame = self.frame_ready.notified();
            if tokio::time::timeout(STILL_FRAME_WAIT, next_frame).await.is_err() {
                warn!("No new frame within {:?}; using last streamed frame", STILL_FRAME_WAIT);
            }
        }

        let latest = self.latest_jpeg.lock().clone();
        latest
            .map(|jpeg| jpeg.to_vec())
            .ok_or_else(|| CameraError::StillCapture {
                details: "no frame has been streamed yet".to_string(),
            })
    }

    fn has_torch(&self) -> bool {
        false
    }

    fn lock_for_configuration(&self) -> Result<(), CameraError> {
        Ok(())
    }

    fn unlock_for_configuration(&self) {}

    fn set_torch_mode(&self, _on: bool) -> Result<(), CameraError> {
        Err(CameraError::NoTorch)
    }
}
