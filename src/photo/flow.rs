use super::library::{PhotoLibrary, PhotoMetadata, SavedPhoto};
use crate::camera::CaptureSessionManager;
use crate::error::{CameraError, Result, SmartCameraError};
use crate::events::{report_error, EventBus, SmartCameraEvent};
use crate::state::{SessionPhase, StateStore, UserFacingError};
use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, error, info};

/// Clears a busy flag when dropped
struct BusyGuard<'a>(&'a AtomicBool);

impl<'a> BusyGuard<'a> {
    fn try_acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Drives `Previewing -> PhotoTaken -> Saved -> Previewing`
pub struct PhotoCaptureFlow {
    session: Arc<CaptureSessionManager>,
    library: Arc<dyn PhotoLibrary>,
    store: StateStore,
    event_bus: Arc<EventBus>,
    capturing: AtomicBool,
    saving: AtomicBool,
}

impl PhotoCaptureFlow {
    pub fn new(
        session: Arc<CaptureSessionManager>,
        library: Arc<dyn PhotoLibrary>,
        store: StateStore,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            session,
            library,
            store,
            event_bus,
            capturing: AtomicBool::new(false),
            saving: AtomicBool::new(false),
        }
    }

    /// Take a still and stop the live session. The phase only moves to
    /// `PhotoTaken` once the image bytes are in hand and the session has
    /// stopped; either failing surfaces `CaptureFailed` and resumes preview.
    /// Returns false when nothing was done.
    pub async fn capture(&self) -> Result<bool> {
        if self.store.phase() != SessionPhase::Previewing {
            debug!("Capture ignored outside of preview");
            return Ok(false);
        }
        let Some(_busy) = BusyGuard::try_acquire(&self.capturing) else {
            debug!("Capture already in progress");
            return Ok(false);
        };

        info!("Capturing photo");
        let (still, stopped) = tokio::join!(self.session.capture_still(), self.session.stop());

        let result = stopped.and(still).and_then(|bytes| {
            if bytes.is_empty() {
                Err(CameraError::StillCapture {
                    details: "camera returned an empty image".to_string(),
                }
                .into())
            } else {
                Ok(bytes)
            }
        });

        match result {
            Ok(bytes) => {
                let size = bytes.len();
                self.store.photo_taken(bytes);
                self.event_bus.notify(SmartCameraEvent::PhotoCaptured {
                    bytes: size,
                    timestamp: SystemTime::now(),
                });
                Ok(true)
            }
            Err(e) => {
                error!("Photo capture failed: {}", e);
                self.store
                    .report_error(UserFacingError::CaptureFailed(e.to_string()));
                report_error(&self.event_bus, "photo_capture", &e);
                if let Err(restart) = self.session.start().await {
                    error!("Failed to resume preview after capture failure: {}", restart);
                }
                Err(e)
            }
        }
    }

    /// Persist the buffered still, then go back to preview. Only acts in
    /// `PhotoTaken`; repeated calls are no-ops. A failed write leaves the
    /// photo buffered so the user can retry.
    pub async fn save(&self) -> Result<Option<SavedPhoto>> {
        let Some(_busy) = BusyGuard::try_acquire(&self.saving) else {
            debug!("Save already in progress");
            return Ok(None);
        };

        let state = self.store.snapshot();
        if state.phase != SessionPhase::PhotoTaken || state.photo.is_empty() {
            debug!("Nothing to save in phase {:?}", state.phase);
            return Ok(None);
        }

        let metadata = PhotoMetadata {
            captured_at: Utc::now(),
            size_bytes: state.photo.len(),
            model: state.model,
            label: state.label.clone(),
        };

        let saved = match self.library.persist(&state.photo, &metadata).await {
            Ok(saved) => saved,
            Err(e) => {
                error!("Failed to save photo: {}", e);
                self.store
                    .report_error(UserFacingError::SaveFailed(e.to_string()));
                report_error(&self.event_bus, "photo_library", &e);
                return Err(SmartCameraError::Storage(e));
            }
        };

        self.store.mark_saved();
        self.event_bus.notify(SmartCameraEvent::PhotoSaved {
            path: saved.path.clone(),
            timestamp: SystemTime::now(),
        });

        self.retake().await?;
        Ok(Some(saved))
    }

    /// Resume preview and drop any buffered photo, whatever the current phase
    pub async fn retake(&self) -> Result<()> {
        let started = self.session.start().await;
        self.store.reset_photo();
        if let Err(e) = &started {
            self.store
                .report_error(UserFacingError::CameraUnavailable(e.to_string()));
        }
        debug!("Returned to preview");
        started
    }
}
