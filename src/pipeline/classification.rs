use super::stats::{PipelineCounters, PipelineStats};
use crate::classifier::{accepted_label, ModelKind, ModelRegistry, Resolution};
use crate::config::{ClassifierConfig, InflightPolicy};
use crate::events::{EventBus, SmartCameraEvent};
use crate::frame::Frame;
use crate::state::{ClassifierStatus, StateStore, UserFacingError};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

/// A frame paired with the model that was active when it was submitted
#[derive(Debug, Clone)]
pub struct ClassificationRequest {
    pub frame: Frame,
    pub model: ModelKind,
    pub submitted_at: Instant,
}

struct Shared {
    config: ClassifierConfig,
    registry: Arc<ModelRegistry>,
    store: StateStore,
    event_bus: Arc<EventBus>,
    /// Single pending slot in front of the worker
    pending: Mutex<Option<ClassificationRequest>>,
    wake: Notify,
    /// Set while the worker owns a request; raised under the `pending` lock
    busy: AtomicBool,
    counters: PipelineCounters,
}

/// Classifies streamed frames on a background worker and publishes the
/// accepted label through the state store.
///
/// Submission never waits. At most one request runs at a time; what happens
/// to frames arriving meanwhile is set by [`InflightPolicy`].
pub struct ClassificationPipeline {
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
    delivery: Mutex<Option<JoinHandle<()>>>,
    cancellation_token: CancellationToken,
}

impl ClassificationPipeline {
    pub fn new(
        config: ClassifierConfig,
        registry: Arc<ModelRegistry>,
        store: StateStore,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                registry,
                store,
                event_bus,
                pending: Mutex::new(None),
                wake: Notify::new(),
                busy: AtomicBool::new(false),
                counters: PipelineCounters::default(),
            }),
            worker: Mutex::new(None),
            delivery: Mutex::new(None),
            cancellation_token: CancellationToken::new(),
        }
    }

    /// Spawn the classification worker
    pub fn start(&self) {
        let mut worker = self.worker.lock();
        if worker.is_some() {
            warn!("Classification pipeline is already running");
            return;
        }

        info!(
            "Starting classification pipeline (threshold {}, policy {:?})",
            self.shared.config.confidence_threshold, self.shared.config.inflight_policy
        );

        let shared = Arc::clone(&self.shared);
        let token = self.cancellation_token.clone();
        *worker = Some(tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = shared.wake.notified() => {}
                }

                while let Some(request) = shared.take_pending() {
                    shared.process(request).await;
                    shared.busy.store(false, Ordering::SeqCst);
                    if token.is_cancelled() {
                        break;
                    }
                }
            }
            debug!("Classification worker stopped");
        }));
    }

    /// Feed every frame from `frames` into the pipeline on a dedicated
    /// delivery task
    pub fn attach(self: &Arc<Self>, mut frames: mpsc::Receiver<Frame>) {
        let pipeline = Arc::clone(self);
        let token = self.cancellation_token.clone();
        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    frame = frames.recv() => match frame {
                        Some(frame) => {
                            pipeline.submit(frame);
                        }
                        None => break,
                    },
                }
            }
            debug!("Frame delivery task stopped");
        });
        if let Some(previous) = self.delivery.lock().replace(task) {
            previous.abort();
        }
    }

    /// Queue a frame for classification against the currently active model.
    /// Returns false when the frame was dropped.
    pub fn submit(&self, frame: Frame) -> bool {
        let shared = &self.shared;
        PipelineCounters::bump(&shared.counters.submitted);

        let request = ClassificationRequest {
            frame,
            model: shared.store.model(),
            submitted_at: Instant::now(),
        };
        trace!(
            "Submitting frame {} for {}",
            request.frame.id,
            request.model.display_name()
        );

        {
            let mut pending = shared.pending.lock();
            match shared.config.inflight_policy {
                InflightPolicy::LatestWins => {
                    if let Some(replaced) = pending.replace(request) {
                        trace!("Frame {} replaced by a newer frame", replaced.frame.id);
                        PipelineCounters::bump(&shared.counters.dropped);
                    }
                }
                InflightPolicy::DropWhileBusy => {
                    if shared.busy.load(Ordering::SeqCst) || pending.is_some() {
                        trace!("Classifier busy, dropping frame {}", request.frame.id);
                        PipelineCounters::bump(&shared.counters.dropped);
                        return false;
                    }
                    *pending = Some(request);
                }
            }
        }

        shared.wake.notify_one();
        true
    }

    /// Switch the active model. Requests already submitted keep the model
    /// they were submitted with.
    pub fn select_model(&self, model: ModelKind) {
        let previous = self.shared.store.set_model(model);
        if previous != model {
            info!(
                "Model switched from {} to {}",
                previous.display_name(),
                model.display_name()
            );
            self.shared
                .event_bus
                .notify(SmartCameraEvent::ModelChanged { model });
        }
    }

    pub fn stats(&self) -> PipelineStats {
        self.shared.counters.snapshot()
    }

    /// Whether a request is running or waiting
    pub fn is_busy(&self) -> bool {
        let pending = self.shared.pending.lock();
        pending.is_some() || self.shared.busy.load(Ordering::SeqCst)
    }

    /// Stop the worker and the frame delivery task. A request already
    /// running finishes first.
    pub async fn stop(&self) {
        self.cancellation_token.cancel();
        let delivery = self.delivery.lock().take();
        let worker = self.worker.lock().take();
        for task in delivery.into_iter().chain(worker) {
            if let Err(e) = task.await {
                warn!("Classification task ended abnormally: {}", e);
            }
        }
        info!("Classification pipeline stopped");
    }
}

impl Shared {
    fn take_pending(&self) -> Option<ClassificationRequest> {
        let mut pending = self.pending.lock();
        let request = pending.take();
        if request.is_some() {
            self.busy.store(true, Ordering::SeqCst);
        }
        request
    }

    async fn process(&self, request: ClassificationRequest) {
        PipelineCounters::bump(&self.counters.started);
        let model = request.model;

        let registry = Arc::clone(&self.registry);
        let resolution = match tokio::task::spawn_blocking(move || registry.resolve(model)).await {
            Ok(Ok(resolution)) => resolution,
            Ok(Err(e)) => {
                self.update_classifier_status(ClassifierStatus::Unavailable {
                    model,
                    reason: e.to_string(),
                });
                PipelineCounters::bump(&self.counters.failed);
                return;
            }
            Err(e) => {
                warn!("Model lookup task failed: {}", e);
                PipelineCounters::bump(&self.counters.failed);
                return;
            }
        };

        match &resolution {
            Resolution::Ready(_) => {
                self.update_classifier_status(ClassifierStatus::Ready(model));
            }
            Resolution::Fallback { classifier, error } => {
                debug!("Using fallback model: {}", error);
                self.update_classifier_status(ClassifierStatus::Fallback {
                    requested: model,
                    using: classifier.model(),
                });
            }
        }

        let classifier = resolution.classifier();
        let results = match classifier.classify(&request.frame).await {
            Ok(results) => results,
            Err(e) => {
                warn!("Failed to classify frame {}: {}", request.frame.id, e);
                PipelineCounters::bump(&self.counters.failed);
                return;
            }
        };

        match accepted_label(
            &results,
            self.config.confidence_threshold,
            &self.config.label_delimiter,
        ) {
            Some((label, confidence)) => {
                PipelineCounters::bump(&self.counters.accepted);
                debug!(
                    "Frame {} classified as '{}' ({:.2}) in {:?}",
                    request.frame.id,
                    label,
                    confidence,
                    request.submitted_at.elapsed()
                );
                if self.store.set_label(label.clone()) {
                    self.event_bus.notify(SmartCameraEvent::LabelChanged {
                        label,
                        model: classifier.model(),
                        confidence,
                    });
                }
            }
            None => {
                PipelineCounters::bump(&self.counters.rejected);
                trace!(
                    "Frame {} below confidence threshold, label unchanged",
                    request.frame.id
                );
            }
        }
        PipelineCounters::bump(&self.counters.completed);
    }

    /// Record a classifier status change, surfacing new unavailability once
    fn update_classifier_status(&self, status: ClassifierStatus) {
        if self.store.snapshot().classifier == status {
            return;
        }

        match &status {
            ClassifierStatus::Unavailable { model, reason } => {
                self.store
                    .report_error(UserFacingError::ClassifierUnavailable(format!(
                        "{}: {}",
                        model.display_name(),
                        reason
                    )));
            }
            ClassifierStatus::Fallback { requested, using } => {
                warn!(
                    "{} model unavailable, classifying with {}",
                    requested.display_name(),
                    using.display_name()
                );
            }
            ClassifierStatus::Ready(model) => {
                info!("{} model ready", model.display_name());
                self.store.clear_classifier_error();
            }
            _ => {}
        }
        self.store.set_classifier_status(status);
    }
}
