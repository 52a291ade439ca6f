use crate::classifier::ModelKind;
use std::fmt;
use std::sync::Arc;

/// Photo flow phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionPhase {
    /// Live preview, classification running
    #[default]
    Previewing,
    /// A still has been captured and is buffered
    PhotoTaken,
    /// The buffered still has been written to the photo library
    Saved,
}

/// Lifecycle of the capture session as the presentation layer sees it
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CameraStatus {
    #[default]
    Unconfigured,
    Ready,
    Running,
    Stopped,
    Unavailable(String),
}

/// Whether classification can currently produce labels
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ClassifierStatus {
    #[default]
    Idle,
    Ready(ModelKind),
    /// `requested` failed to load; results come from `using`
    Fallback {
        requested: ModelKind,
        using: ModelKind,
    },
    Unavailable {
        model: ModelKind,
        reason: String,
    },
}

/// Recoverable failures the presentation layer can render
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserFacingError {
    CameraUnavailable(String),
    CaptureFailed(String),
    SaveFailed(String),
    ClassifierUnavailable(String),
}

impl fmt::Display for UserFacingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserFacingError::CameraUnavailable(reason) => {
                write!(f, "Camera unavailable: {}", reason)
            }
            UserFacingError::CaptureFailed(reason) => write!(f, "Capture failed: {}", reason),
            UserFacingError::SaveFailed(reason) => write!(f, "Save failed, retry: {}", reason),
            UserFacingError::ClassifierUnavailable(reason) => {
                write!(f, "Classification unavailable: {}", reason)
            }
        }
    }
}

/// Everything the presentation layer renders
#[derive(Debug, Clone, Default)]
pub struct CameraState {
    pub phase: SessionPhase,
    pub torch: bool,
    /// Last accepted classification label; empty until the first one
    pub label: String,
    pub model: ModelKind,
    /// Buffered still bytes; empty unless a photo is taken
    pub photo: Arc<Vec<u8>>,
    pub camera: CameraStatus,
    pub classifier: ClassifierStatus,
    pub last_error: Option<UserFacingError>,
}

impl CameraState {
    pub fn is_taken(&self) -> bool {
        matches!(self.phase, SessionPhase::PhotoTaken | SessionPhase::Saved)
    }

    pub fn is_saved(&self) -> bool {
        self.phase == SessionPhase::Saved
    }
}
