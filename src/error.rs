use thiserror::Error;

#[derive(Error, Debug)]
pub enum SmartCameraError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Camera error: {0}")]
    Camera(#[from] CameraError),

    #[error("Classifier error: {0}")]
    Classifier(#[from] ClassifierError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Event bus error: {0}")]
    EventBus(#[from] EventBusError),

    #[error("System error: {message}")]
    System { message: String },

    #[error("Component error in {component}: {message}")]
    Component { component: String, message: String },
}

impl SmartCameraError {
    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::System {
            message: message.into(),
        }
    }

    pub fn component(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Component {
            component: component.into(),
            message: message.into(),
        }
    }
}

#[derive(Error, Debug, Clone)]
pub enum CameraError {
    #[error("Camera device unavailable: {details}")]
    DeviceUnavailable { details: String },

    #[error("Camera configuration failed: {details}")]
    Configuration { details: String },

    #[error("Capture stream error: {details}")]
    CaptureStream { details: String },

    #[error("Still capture failed: {details}")]
    StillCapture { details: String },

    #[error("Device has no torch")]
    NoTorch,

    #[error("Failed to lock device for configuration: {details}")]
    LockFailed { details: String },
}

#[derive(Error, Debug, Clone)]
pub enum ClassifierError {
    #[error("Failed to load model {model}: {details}")]
    ModelLoad { model: String, details: String },

    #[error("No classifier available for {model}")]
    Unavailable { model: String },

    #[error("Inference failed: {details}")]
    Inference { details: String },

    #[error("Invalid classifier input: {details}")]
    InvalidInput { details: String },
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to write photo {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Photo directory error for {path}: {details}")]
    Directory { path: String, details: String },

    #[error("Failed to write photo metadata: {details}")]
    Metadata { details: String },
}

#[derive(Error, Debug)]
pub enum EventBusError {
    #[error("Failed to publish event: {details}")]
    PublishFailed { details: String },
}

pub type Result<T> = std::result::Result<T, SmartCameraError>;
