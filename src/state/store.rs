use super::types::{CameraState, CameraStatus, ClassifierStatus, SessionPhase, UserFacingError};
use crate::classifier::ModelKind;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, warn};

/// Single-writer container for presentation state.
///
/// Every mutation goes through `watch::Sender::send_modify`, so writers are
/// serialized and every subscriber is notified after each change. Readers
/// only ever see whole snapshots.
#[derive(Clone)]
pub struct StateStore {
    sender: Arc<watch::Sender<CameraState>>,
}

impl StateStore {
    pub fn new(model: ModelKind) -> Self {
        let (sender, _) = watch::channel(CameraState {
            model,
            ..CameraState::default()
        });
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Copy of the current state
    pub fn snapshot(&self) -> CameraState {
        self.sender.borrow().clone()
    }

    /// Receiver notified after every change
    pub fn subscribe(&self) -> watch::Receiver<CameraState> {
        self.sender.subscribe()
    }

    pub fn label(&self) -> String {
        self.sender.borrow().label.clone()
    }

    pub fn model(&self) -> ModelKind {
        self.sender.borrow().model
    }

    pub fn phase(&self) -> SessionPhase {
        self.sender.borrow().phase
    }

    pub fn torch(&self) -> bool {
        self.sender.borrow().torch
    }

    pub fn photo(&self) -> Arc<Vec<u8>> {
        Arc::clone(&self.sender.borrow().photo)
    }

    /// Publish a new label. Returns false (and notifies no one) when it is
    /// already displayed.
    pub fn set_label(&self, label: String) -> bool {
        self.sender.send_if_modified(|state| {
            if state.label == label {
                false
            } else {
                state.label = label;
                true
            }
        })
    }

    /// Returns the previously active model
    pub fn set_model(&self, model: ModelKind) -> ModelKind {
        let mut previous = model;
        self.sender.send_modify(|state| {
            previous = state.model;
            state.model = model;
        });
        previous
    }

    pub fn set_torch(&self, on: bool) {
        self.sender.send_modify(|state| state.torch = on);
    }

    pub fn set_camera_status(&self, status: CameraStatus) {
        debug!("Camera status: {:?}", status);
        self.sender.send_modify(|state| state.camera = status);
    }

    /// Update classifier status, notifying only on change
    pub fn set_classifier_status(&self, status: ClassifierStatus) {
        self.sender.send_if_modified(|state| {
            if state.classifier == status {
                false
            } else {
                state.classifier = status;
                true
            }
        });
    }

    pub fn report_error(&self, error: UserFacingError) {
        warn!("{}", error);
        self.sender.send_modify(|state| state.last_error = Some(error));
    }

    pub fn clear_error(&self) {
        self.sender.send_if_modified(|state| state.last_error.take().is_some());
    }

    /// Drop a pending `ClassifierUnavailable`, leaving other errors in place
    pub fn clear_classifier_error(&self) {
        self.sender.send_if_modified(|state| {
            if matches!(state.last_error, Some(UserFacingError::ClassifierUnavailable(_))) {
                state.last_error = None;
                true
            } else {
                false
            }
        });
    }

    /// Buffer captured bytes and enter `PhotoTaken`; clears any earlier save
    pub fn photo_taken(&self, bytes: Vec<u8>) {
        self.sender.send_modify(|state| {
            state.photo = Arc::new(bytes);
            state.phase = SessionPhase::PhotoTaken;
            state.last_error = None;
        });
    }

    /// Enter `Saved`; only valid from `PhotoTaken`
    pub fn mark_saved(&self) -> bool {
        self.sender.send_if_modified(|state| {
            if state.phase == SessionPhase::PhotoTaken {
                state.phase = SessionPhase::Saved;
                true
            } else {
                false
            }
        })
    }

    /// Back to `Previewing` with the photo buffer emptied
    pub fn reset_photo(&self) {
        self.sender.send_modify(|state| {
            state.phase = SessionPhase::Previewing;
            state.photo = Arc::new(Vec::new());
        });
    }
}
