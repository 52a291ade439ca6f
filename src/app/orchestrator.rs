use super::keyboard::KeyboardInputHandler;
use super::types::{ComponentState, Intent, ShutdownReason};
use crate::camera::{CameraDevice, CaptureSessionManager, TorchControl};
use crate::classifier::{ModelLoader, ModelRegistry};
use crate::config::SmartCameraConfig;
use crate::events::EventBus;
use crate::photo::{PhotoCaptureFlow, PhotoLibrary};
use crate::pipeline::ClassificationPipeline;
use crate::state::StateStore;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Platform collaborators the application runs against
pub struct AppBackends {
    pub camera: Arc<dyn CameraDevice>,
    pub loader: Arc<dyn ModelLoader>,
    pub library: Arc<dyn PhotoLibrary>,
}

/// Wires the capture session, classification pipeline, photo flow and torch
/// together and owns their lifecycle
pub struct SmartCameraApp {
    pub(super) config: SmartCameraConfig,
    pub(super) event_bus: Arc<EventBus>,
    pub(super) store: StateStore,

    // Components
    pub(super) session: Arc<CaptureSessionManager>,
    pub(super) pipeline: Arc<ClassificationPipeline>,
    pub(super) photo_flow: PhotoCaptureFlow,
    pub(super) torch: TorchControl,
    pub(super) keyboard_handler: Option<KeyboardInputHandler>,
    pub(super) presenter: Option<JoinHandle<()>>,

    // Intents
    pub(super) intent_sender: mpsc::Sender<Intent>,
    pub(super) intent_receiver: Option<mpsc::Receiver<Intent>>,

    // Lifecycle management
    pub(super) component_states: Arc<Mutex<HashMap<String, ComponentState>>>,
    pub(super) shutdown_sender: Option<oneshot::Sender<ShutdownReason>>,
    pub(super) shutdown_receiver: Option<oneshot::Receiver<ShutdownReason>>,
    pub(super) cancellation_token: CancellationToken,
}

impl SmartCameraApp {
    pub fn new(config: SmartCameraConfig, backends: AppBackends) -> Self {
        let event_bus = Arc::new(EventBus::new(config.system.event_bus_capacity));
        let store = StateStore::new(config.classifier.default_model);
        let (shutdown_sender, shutdown_receiver) = oneshot::channel();
        let (intent_sender, intent_receiver) = mpsc::channel(16);

        let session = Arc::new(CaptureSessionManager::new(
            config.camera.clone(),
            Arc::clone(&backends.camera),
            store.clone(),
            Arc::clone(&event_bus),
        ));

        let registry = Arc::new(ModelRegistry::new(
            backends.loader,
            Duration::from_millis(config.classifier.model_retry_interval_ms),
        ));
        let pipeline = Arc::new(ClassificationPipeline::new(
            config.classifier.clone(),
            registry,
            store.clone(),
            Arc::clone(&event_bus),
        ));

        let photo_flow = PhotoCaptureFlow::new(
            Arc::clone(&session),
            backends.library,
            store.clone(),
            Arc::clone(&event_bus),
        );
        let torch = TorchControl::new(backends.camera, store.clone(), Arc::clone(&event_bus));

        Self {
            config,
            event_bus,
            store,
            session,
            pipeline,
            photo_flow,
            torch,
            keyboard_handler: None,
            presenter: None,
            intent_sender,
            intent_receiver: Some(intent_receiver),
            component_states: Arc::new(Mutex::new(HashMap::new())),
            shutdown_sender: Some(shutdown_sender),
            shutdown_receiver: Some(shutdown_receiver),
            cancellation_token: CancellationToken::new(),
        }
    }

    /// Read intents from the terminal while running
    pub fn enable_keyboard(&mut self) {
        self.keyboard_handler = Some(KeyboardInputHandler::new(self.intent_sender.clone()));
    }

    /// Sender for intents handled by [`SmartCameraApp::run`]
    pub fn intents(&self) -> mpsc::Sender<Intent> {
        self.intent_sender.clone()
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    pub fn event_bus(&self) -> Arc<EventBus> {
        Arc::clone(&self.event_bus)
    }

    pub fn pipeline(&self) -> Arc<ClassificationPipeline> {
        Arc::clone(&self.pipeline)
    }

    pub fn session(&self) -> Arc<CaptureSessionManager> {
        Arc::clone(&self.session)
    }

    pub fn config(&self) -> &SmartCameraConfig {
        &self.config
    }

    pub async fn set_component_state(&self, component: &str, state: ComponentState) {
        debug!("Component '{}' state changed to: {:?}", component, state);
        self.component_states
            .lock()
            .await
            .insert(component.to_string(), state);
    }

    pub async fn get_component_state(&self, component: &str) -> Option<ComponentState> {
        self.component_states.lock().await.get(component).cloned()
    }

    pub async fn get_all_component_states(&self) -> HashMap<String, ComponentState> {
        self.component_states.lock().await.clone()
    }
}
