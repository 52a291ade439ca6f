pub mod app;
pub mod camera;
pub mod classifier;
pub mod config;
pub mod error;
pub mod events;
pub mod frame;
pub mod photo;
pub mod pipeline;
pub mod state;

#[cfg(test)]
pub(crate) mod test_support;

pub use app::{AppBackends, ComponentState, Intent, ShutdownReason, SmartCameraApp};
pub use camera::{CameraDevice, CaptureSessionManager, MockCamera, TorchControl};
pub use classifier::{Classification, Classifier, ModelKind, ModelLoader, ModelRegistry};
pub use config::{InflightPolicy, SmartCameraConfig};
pub use error::{Result, SmartCameraError};
pub use events::{EventBus, SmartCameraEvent};
pub use frame::{Frame, Orientation, PixelFormat};
pub use photo::{DirectoryPhotoLibrary, PhotoCaptureFlow, PhotoLibrary};
pub use pipeline::{ClassificationPipeline, PipelineStats};
pub use state::{CameraState, SessionPhase, StateStore, UserFacingError};
