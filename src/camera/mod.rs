mod device;
#[cfg(all(feature = "gstreamer", target_os = "linux"))]
mod gst;
mod mock;
mod session;
mod torch;

pub use device::{CameraDevice, ConfigurationGuard, FrameSink};
#[cfg(all(feature = "gstreamer", target_os = "linux"))]
pub use gst::GstCamera;
pub use mock::MockCamera;
pub use session::CaptureSessionManager;
pub use torch::TorchControl;
