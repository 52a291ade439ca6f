use super::*;
use crate::camera::{CaptureSessionManager, MockCamera};
use crate::classifier::ModelKind;
use crate::config::{CameraConfig, StorageConfig};
use crate::error::{SmartCameraError, StorageError};
use crate::events::{EventBus, SmartCameraEvent};
use crate::state::{SessionPhase, StateStore, UserFacingError};
use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn create_test_camera_config() -> CameraConfig {
    CameraConfig {
        index: 0,
        resolution: (32, 24),
        fps: 100,
        discard_late_frames: true,
        frame_queue_depth: 1,
    }
}

fn directory_library(path: &Path) -> DirectoryPhotoLibrary {
    DirectoryPhotoLibrary::new(&StorageConfig {
        path: path.to_string_lossy().to_string(),
        save_metadata: false,
    })
}

/// Fails the first `failures` writes, then delegates to a directory library
struct FlakyLibrary {
    inner: DirectoryPhotoLibrary,
    failures: AtomicUsize,
    writes: AtomicUsize,
}

impl FlakyLibrary {
    fn new(path: &Path, failures: usize) -> Self {
        Self {
            inner: directory_library(path),
            failures: AtomicUsize::new(failures),
            writes: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl PhotoLibrary for FlakyLibrary {
    async fn persist(
        &self,
        bytes: &[u8],
        metadata: &PhotoMetadata,
    ) -> Result<SavedPhoto, StorageError> {
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(StorageError::Directory {
                path: "flaky".to_string(),
                details: "disk full".to_string(),
            });
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.persist(bytes, metadata).await
    }
}

struct Harness {
    flow: PhotoCaptureFlow,
    session: Arc<CaptureSessionManager>,
    camera: Arc<MockCamera>,
    store: StateStore,
    event_bus: Arc<EventBus>,
}

async fn create_harness(camera: MockCamera, library: Arc<dyn PhotoLibrary>) -> Harness {
    let camera = Arc::new(camera);
    let store = StateStore::new(ModelKind::MobileNet);
    let event_bus = Arc::new(EventBus::new(32));
    let session = Arc::new(CaptureSessionManager::new(
        create_test_camera_config(),
        camera.clone(),
        store.clone(),
        event_bus.clone(),
    ));
    session.configure().await.unwrap();
    session.start().await.unwrap();

    let flow = PhotoCaptureFlow::new(session.clone(), library, store.clone(), event_bus.clone());
    Harness {
        flow,
        session,
        camera,
        store,
        event_bus,
    }
}

#[tokio::test]
async fn test_capture_save_retake_cycle() {
    let temp_dir = TempDir::new().unwrap();
    let library = Arc::new(directory_library(temp_dir.path()));
    let h = create_harness(
        MockCamera::new(create_test_camera_config()).with_photo_delay(Duration::from_millis(20)),
        library.clone(),
    )
    .await;
    let mut events = h.event_bus.subscribe();

    assert!(h.flow.capture().await.unwrap());
    let state = h.store.snapshot();
    assert_eq!(state.phase, SessionPhase::PhotoTaken);
    assert!(!state.photo.is_empty());
    assert!(!h.session.is_running());
    let photo = state.photo.clone();

    let saved = h.flow.save().await.unwrap().unwrap();
    assert_eq!(std::fs::read(&saved.path).unwrap(), *photo);

    let state = h.store.snapshot();
    assert_eq!(state.phase, SessionPhase::Previewing);
    assert!(!state.is_saved());
    assert!(state.photo.is_empty());
    assert!(h.session.is_running());

    let mut saw_saved = false;
    while let Ok(event) = events.try_recv() {
        if let SmartCameraEvent::PhotoSaved { path, .. } = event {
            assert_eq!(path, saved.path);
            saw_saved = true;
        }
    }
    assert!(saw_saved);
    assert_eq!(library.list().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_save_twice_writes_once() {
    let temp_dir = TempDir::new().unwrap();
    let library = Arc::new(FlakyLibrary::new(temp_dir.path(), 0));
    let h = create_harness(MockCamera::new(create_test_camera_config()), library.clone()).await;

    h.flow.capture().await.unwrap();
    let (first, second) = tokio::join!(h.flow.save(), h.flow.save());
    let saved = [first.unwrap(), second.unwrap()]
        .into_iter()
        .filter(Option::is_some)
        .count();
    assert_eq!(saved, 1);

    assert!(h.flow.save().await.unwrap().is_none());
    assert_eq!(library.writes.load(Ordering::SeqCst), 1);
    assert_eq!(directory_library(temp_dir.path()).list().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_save_in_preview_is_noop() {
    let temp_dir = TempDir::new().unwrap();
    let library = Arc::new(FlakyLibrary::new(temp_dir.path(), 0));
    let h = create_harness(MockCamera::new(create_test_camera_config()), library.clone()).await;

    assert!(h.flow.save().await.unwrap().is_none());
    assert_eq!(library.writes.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_retake_clears_photo_from_any_phase() {
    let temp_dir = TempDir::new().unwrap();
    let h = create_harness(
        MockCamera::new(create_test_camera_config()),
        Arc::new(directory_library(temp_dir.path())),
    )
    .await;

    h.flow.retake().await.unwrap();
    assert_eq!(h.store.phase(), SessionPhase::Previewing);
    assert!(h.store.photo().is_empty());

    h.flow.capture().await.unwrap();
    assert!(h.store.snapshot().is_taken());

    h.flow.retake().await.unwrap();
    let state = h.store.snapshot();
    assert_eq!(state.phase, SessionPhase::Previewing);
    assert!(!state.is_saved());
    assert!(state.photo.is_empty());
    assert!(h.session.is_running());
}

#[tokio::test]
async fn test_capture_outside_preview_is_ignored() {
    let temp_dir = TempDir::new().unwrap();
    let h = create_harness(
        MockCamera::new(create_test_camera_config()),
        Arc::new(directory_library(temp_dir.path())),
    )
    .await;

    assert!(h.flow.capture().await.unwrap());
    let photo = h.store.photo();
    assert!(!h.flow.capture().await.unwrap());

    assert_eq!(h.camera.photos_taken(), 1);
    assert!(Arc::ptr_eq(&photo, &h.store.photo()));
}

#[tokio::test]
async fn test_capture_failure_resumes_preview() {
    let temp_dir = TempDir::new().unwrap();
    let h = create_harness(
        MockCamera::new(create_test_camera_config()),
        Arc::new(directory_library(temp_dir.path())),
    )
    .await;
    h.camera.set_fail_capture(true);

    let result = h.flow.capture().await;
    assert!(matches!(result, Err(SmartCameraError::Camera(_))));

    let state = h.store.snapshot();
    assert_eq!(state.phase, SessionPhase::Previewing);
    assert!(state.photo.is_empty());
    assert!(matches!(
        state.last_error,
        Some(UserFacingError::CaptureFailed(_))
    ));
    assert!(h.session.is_running());
}

#[tokio::test]
async fn test_stop_failure_blocks_photo_taken() {
    let temp_dir = TempDir::new().unwrap();
    let h = create_harness(
        MockCamera::new(create_test_camera_config()),
        Arc::new(directory_library(temp_dir.path())),
    )
    .await;
    h.camera.set_fail_stop(true);

    let result = h.flow.capture().await;
    assert!(matches!(result, Err(SmartCameraError::Camera(_))));

    let state = h.store.snapshot();
    assert_eq!(state.phase, SessionPhase::Previewing);
    assert!(state.photo.is_empty());
    assert!(matches!(
        state.last_error,
        Some(UserFacingError::CaptureFailed(_))
    ));
    assert!(h.session.is_running());

    h.camera.set_fail_stop(false);
    assert!(h.flow.capture().await.unwrap());
    assert_eq!(h.store.phase(), SessionPhase::PhotoTaken);
}

#[tokio::test]
async fn test_save_failure_keeps_photo_for_retry() {
    let temp_dir = TempDir::new().unwrap();
    let library = Arc::new(FlakyLibrary::new(temp_dir.path(), 1));
    let h = create_harness(MockCamera::new(create_test_camera_config()), library.clone()).await;

    h.flow.capture().await.unwrap();
    let result = h.flow.save().await;
    assert!(matches!(result, Err(SmartCameraError::Storage(_))));

    let state = h.store.snapshot();
    assert_eq!(state.phase, SessionPhase::PhotoTaken);
    assert!(!state.photo.is_empty());
    assert!(matches!(state.last_error, Some(UserFacingError::SaveFailed(_))));
    assert!(!h.session.is_running());

    // Retry succeeds and returns to preview
    assert!(h.flow.save().await.unwrap().is_some());
    assert_eq!(h.store.phase(), SessionPhase::Previewing);
    assert_eq!(library.writes.load(Ordering::SeqCst), 1);
}
