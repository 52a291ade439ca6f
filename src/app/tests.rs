use super::*;
use crate::camera::{CameraDevice, MockCamera};
use crate::classifier::{ModelKind, ModelLoader, UnavailableModelLoader};
use crate::config::SmartCameraConfig;
use crate::photo::DirectoryPhotoLibrary;
use crate::state::{ClassifierStatus, SessionPhase, UserFacingError};
use crate::test_support::{wait_until, ScriptedClassifier, ScriptedLoader};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

fn create_test_config(photo_dir: &Path) -> SmartCameraConfig {
    let mut config = SmartCameraConfig::default();
    config.camera.resolution = (16, 12);
    config.camera.fps = 100;
    config.storage.path = photo_dir.to_string_lossy().to_string();
    config
}

fn scripted_loader() -> ScriptedLoader {
    ScriptedLoader::default()
        .with(Arc::new(ScriptedClassifier::new(
            ModelKind::MobileNet,
            "daisy, oxeye daisy",
            0.9,
        )))
        .with(Arc::new(ScriptedClassifier::new(
            ModelKind::Food,
            "pizza, pizza pie",
            0.8,
        )))
}

fn create_app(
    config: SmartCameraConfig,
    camera: Arc<MockCamera>,
    loader: Arc<dyn ModelLoader>,
) -> SmartCameraApp {
    let library = Arc::new(DirectoryPhotoLibrary::new(&config.storage));
    SmartCameraApp::new(
        config,
        AppBackends {
            camera,
            loader,
            library,
        },
    )
}

async fn started_app(temp_dir: &TempDir) -> (SmartCameraApp, Arc<MockCamera>) {
    let config = create_test_config(temp_dir.path());
    let camera = Arc::new(MockCamera::new(config.camera.clone()));
    let mut app = create_app(config, camera.clone(), Arc::new(scripted_loader()));
    app.initialize().await.unwrap();
    app.start().await.unwrap();
    (app, camera)
}

#[tokio::test]
async fn test_streamed_frames_produce_label() {
    let temp_dir = TempDir::new().unwrap();
    let (mut app, _camera) = started_app(&temp_dir).await;

    let store = app.store().clone();
    wait_until(|| store.label() == "Daisy").await;

    assert_eq!(
        app.get_component_state("camera").await,
        Some(ComponentState::Running)
    );
    assert_eq!(
        app.get_component_state("classifier").await,
        Some(ComponentState::Running)
    );
    assert_eq!(
        store.snapshot().classifier,
        ClassifierStatus::Ready(ModelKind::MobileNet)
    );

    assert_eq!(app.shutdown().await.unwrap(), 0);
}

#[tokio::test]
async fn test_capture_save_retake_intents() {
    let temp_dir = TempDir::new().unwrap();
    let (mut app, camera) = started_app(&temp_dir).await;
    let store = app.store().clone();

    app.handle(Intent::Capture).await.unwrap();
    assert_eq!(store.phase(), SessionPhase::PhotoTaken);
    assert!(!camera.is_running());

    app.handle(Intent::Save).await.unwrap();
    app.handle(Intent::Save).await.unwrap();

    let state = store.snapshot();
    assert_eq!(state.phase, SessionPhase::Previewing);
    assert!(!state.is_saved());
    assert!(state.photo.is_empty());
    assert!(app.session().is_running());

    let library = DirectoryPhotoLibrary::new(&app.config().storage);
    assert_eq!(library.list().await.unwrap().len(), 1);

    app.handle(Intent::Capture).await.unwrap();
    app.handle(Intent::Retake).await.unwrap();
    assert_eq!(store.phase(), SessionPhase::Previewing);
    assert!(store.photo().is_empty());
    assert_eq!(library.list().await.unwrap().len(), 1);

    app.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_select_model_intent() {
    let temp_dir = TempDir::new().unwrap();
    let (mut app, _camera) = started_app(&temp_dir).await;
    let store = app.store().clone();

    app.handle(Intent::SelectModel(ModelKind::Food))
        .await
        .unwrap();
    assert_eq!(store.model(), ModelKind::Food);
    wait_until(|| store.label() == "Pizza").await;

    app.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_torch_intent_and_shutdown_switches_it_off() {
    let temp_dir = TempDir::new().unwrap();
    let (mut app, camera) = started_app(&temp_dir).await;

    app.handle(Intent::ToggleTorch).await.unwrap();
    assert!(app.store().torch());
    assert!(camera.torch_on());
    assert!(!camera.is_config_locked());

    app.shutdown().await.unwrap();
    assert!(!camera.torch_on());
    assert!(!app.store().torch());
}

#[tokio::test]
async fn test_torchless_camera_ignores_toggle() {
    let temp_dir = TempDir::new().unwrap();
    let config = create_test_config(temp_dir.path());
    let camera = Arc::new(MockCamera::new(config.camera.clone()).with_torch(false));
    let mut app = create_app(config, camera.clone(), Arc::new(scripted_loader()));
    app.initialize().await.unwrap();
    app.start().await.unwrap();

    app.handle(Intent::ToggleTorch).await.unwrap();
    assert!(!app.store().torch());
    assert_eq!(camera.lock_counts(), (0, 0));

    app.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_unavailable_camera_is_not_fatal() {
    let temp_dir = TempDir::new().unwrap();
    let config = create_test_config(temp_dir.path());
    let camera = Arc::new(MockCamera::new(config.camera.clone()).failing_open());
    let mut app = create_app(config, camera, Arc::new(scripted_loader()));

    app.initialize().await.unwrap();
    assert_eq!(
        app.get_component_state("camera").await,
        Some(ComponentState::Failed)
    );
    assert!(matches!(
        app.store().snapshot().last_error,
        Some(UserFacingError::CameraUnavailable(_))
    ));

    app.start().await.unwrap();
    assert!(app.handle(Intent::Capture).await.is_err());
    assert_eq!(app.store().phase(), SessionPhase::Previewing);

    assert_eq!(app.shutdown().await.unwrap(), 0);
}

#[tokio::test]
async fn test_missing_models_keep_app_running() {
    let temp_dir = TempDir::new().unwrap();
    let config = create_test_config(temp_dir.path());
    let camera = Arc::new(MockCamera::new(config.camera.clone()));
    let mut app = create_app(config, camera, Arc::new(UnavailableModelLoader));
    app.initialize().await.unwrap();
    app.start().await.unwrap();

    let store = app.store().clone();
    wait_until(|| {
        matches!(
            store.snapshot().classifier,
            ClassifierStatus::Unavailable { .. }
        )
    })
    .await;
    assert!(store.label().is_empty());

    app.handle(Intent::Capture).await.unwrap();
    app.handle(Intent::Save).await.unwrap();
    assert_eq!(store.phase(), SessionPhase::Previewing);

    app.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_run_stops_on_quit_intent() {
    let temp_dir = TempDir::new().unwrap();
    let (mut app, camera) = started_app(&temp_dir).await;

    app.intents().send(Intent::ToggleTorch).await.unwrap();
    app.intents().send(Intent::Quit).await.unwrap();

    let exit_code = app.run().await.unwrap();
    assert_eq!(exit_code, 0);
    assert!(!camera.is_running());
    assert!(!camera.torch_on());

    let states = app.get_all_component_states().await;
    for component in ["camera", "classifier", "presenter"] {
        assert_eq!(states.get(component), Some(&ComponentState::Stopped));
    }
}

#[tokio::test]
async fn test_run_can_only_be_called_once() {
    let temp_dir = TempDir::new().unwrap();
    let (mut app, _camera) = started_app(&temp_dir).await;

    app.intents().send(Intent::Quit).await.unwrap();
    app.run().await.unwrap();
    assert!(app.run().await.is_err());
}
