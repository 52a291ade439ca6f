use super::model::{Classifier, ModelKind, ModelLoader};
use crate::error::ClassifierError;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Outcome of looking up the classifier for a request
pub enum Resolution {
    /// The requested model is loaded
    Ready(Arc<dyn Classifier>),
    /// The requested model failed to load; the last model that did load is
    /// used instead
    Fallback {
        classifier: Arc<dyn Classifier>,
        error: ClassifierError,
    },
}

impl Resolution {
    pub fn classifier(&self) -> &Arc<dyn Classifier> {
        match self {
            Resolution::Ready(classifier) => classifier,
            Resolution::Fallback { classifier, .. } => classifier,
        }
    }
}

#[derive(Default)]
struct RegistryState {
    loaded: HashMap<ModelKind, Arc<dyn Classifier>>,
    last_good: Option<Arc<dyn Classifier>>,
    failures: HashMap<ModelKind, (Instant, ClassifierError)>,
}

/// Caches loaded models and turns load failures into a fallback or an
/// `Unavailable` error instead of aborting.
pub struct ModelRegistry {
    loader: Arc<dyn ModelLoader>,
    retry_interval: Duration,
    state: Mutex<RegistryState>,
}

impl ModelRegistry {
    pub fn new(loader: Arc<dyn ModelLoader>, retry_interval: Duration) -> Self {
        Self {
            loader,
            retry_interval,
            state: Mutex::new(RegistryState::default()),
        }
    }

    /// Find a classifier for `model`, loading it if needed
    pub fn resolve(&self, model: ModelKind) -> Result<Resolution, ClassifierError> {
        let recent_failure = {
            let state = self.state.lock();
            if let Some(classifier) = state.loaded.get(&model) {
                return Ok(Resolution::Ready(Arc::clone(classifier)));
            }
            state
                .failures
                .get(&model)
                .filter(|(at, _)| at.elapsed() < self.retry_interval)
                .map(|(_, error)| error.clone())
        };

        let error = match recent_failure {
            Some(error) => {
                debug!("Skipping reload of {} until retry interval elapses", model);
                error
            }
            None => match self.loader.load(model) {
                Ok(classifier) => {
                    info!("Loaded {} model", model.display_name());
                    let mut state = self.state.lock();
                    state.failures.remove(&model);
                    state.loaded.insert(model, Arc::clone(&classifier));
                    state.last_good = Some(Arc::clone(&classifier));
                    return Ok(Resolution::Ready(classifier));
                }
                Err(error) => {
                    warn!("Failed to load {} model: {}", model.display_name(), error);
                    self.state
                        .lock()
                        .failures
                        .insert(model, (Instant::now(), error.clone()));
                    error
                }
            },
        };

        match self.state.lock().last_good.clone() {
            Some(classifier) => Ok(Resolution::Fallback { classifier, error }),
            None => Err(ClassifierError::Unavailable {
                model: model.display_name().to_string(),
            }),
        }
    }

    /// Whether `model` is loaded and cached
    pub fn is_loaded(&self, model: ModelKind) -> bool {
        self.state.lock().loaded.contains_key(&model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::Classification;
    use crate::frame::Frame;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedClassifier(ModelKind);

    #[async_trait]
    impl Classifier for FixedClassifier {
        fn model(&self) -> ModelKind {
            self.0
        }

        async fn classify(&self, _frame: &Frame) -> Result<Vec<Classification>, ClassifierError> {
            Ok(vec![])
        }
    }

    /// Loads MobileNet only; counts every attempt
    #[derive(Default)]
    struct PartialLoader {
        attempts: AtomicUsize,
    }

    impl ModelLoader for PartialLoader {
        fn load(&self, model: ModelKind) -> Result<Arc<dyn Classifier>, ClassifierError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            match model {
                ModelKind::MobileNet => Ok(Arc::new(FixedClassifier(model))),
                _ => Err(ClassifierError::ModelLoad {
                    model: model.display_name().to_string(),
                    details: "missing asset".to_string(),
                }),
            }
        }
    }

    #[test]
    fn test_loaded_models_are_cached() {
        let loader = Arc::new(PartialLoader::default());
        let registry = ModelRegistry::new(loader.clone(), Duration::from_secs(60));

        assert!(matches!(
            registry.resolve(ModelKind::MobileNet),
            Ok(Resolution::Ready(_))
        ));
        assert!(matches!(
            registry.resolve(ModelKind::MobileNet),
            Ok(Resolution::Ready(_))
        ));
        assert_eq!(loader.attempts.load(Ordering::SeqCst), 1);
        assert!(registry.is_loaded(ModelKind::MobileNet));
    }

    #[test]
    fn test_failure_without_fallback_is_unavailable() {
        let registry = ModelRegistry::new(
            Arc::new(PartialLoader::default()),
            Duration::from_secs(60),
        );

        match registry.resolve(ModelKind::Food) {
            Err(ClassifierError::Unavailable { model }) => assert_eq!(model, "Food"),
            _ => panic!("Expected unavailable classifier"),
        }
    }

    #[test]
    fn test_failure_falls_back_to_last_good() {
        let registry = ModelRegistry::new(
            Arc::new(PartialLoader::default()),
            Duration::from_secs(60),
        );
        registry.resolve(ModelKind::MobileNet).ok();

        match registry.resolve(ModelKind::Flowers) {
            Ok(Resolution::Fallback { classifier, error }) => {
                assert_eq!(classifier.model(), ModelKind::MobileNet);
                assert!(matches!(error, ClassifierError::ModelLoad { .. }));
            }
            _ => panic!("Expected fallback classifier"),
        }
    }

    #[test]
    fn test_retry_waits_for_interval() {
        let loader = Arc::new(PartialLoader::default());
        let registry = ModelRegistry::new(loader.clone(), Duration::from_secs(60));

        registry.resolve(ModelKind::Food).ok();
        registry.resolve(ModelKind::Food).ok();
        assert_eq!(loader.attempts.load(Ordering::SeqCst), 1);

        let registry = ModelRegistry::new(loader.clone(), Duration::ZERO);
        registry.resolve(ModelKind::Food).ok();
        registry.resolve(ModelKind::Food).ok();
        assert_eq!(loader.attempts.load(Ordering::SeqCst), 3);
    }
}
