use crate::classifier::ModelKind;

/// Component lifecycle states
#[derive(Debug, Clone, PartialEq)]
pub enum ComponentState {
    Stopped,
    Starting,
    Running,
    Stopping,
    Failed,
}

/// System shutdown reason
#[derive(Debug, Clone, PartialEq)]
pub enum ShutdownReason {
    Signal(String),
    Error(String),
    UserRequest,
}

/// User actions forwarded by the presentation surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Capture,
    Save,
    Retake,
    ToggleTorch,
    SelectModel(ModelKind),
    Quit,
}
