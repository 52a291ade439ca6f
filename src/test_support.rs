//! Test doubles shared by the unit tests.

use crate::classifier::{Classification, Classifier, ModelKind, ModelLoader};
use crate::error::ClassifierError;
use crate::frame::{Frame, PixelFormat};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Notify, Semaphore};

/// Classifier returning a fixed result list, optionally held until a permit
/// is released on its gate
pub struct ScriptedClassifier {
    model: ModelKind,
    results: Mutex<Vec<Classification>>,
    gate: Option<Arc<Semaphore>>,
    pub started: Arc<Notify>,
    calls: AtomicUsize,
    fail: AtomicBool,
}

impl ScriptedClassifier {
    pub fn new(model: ModelKind, identifier: &str, confidence: f32) -> Self {
        Self {
            model,
            results: Mutex::new(vec![Classification::new(identifier, confidence)]),
            gate: None,
            started: Arc::new(Notify::new()),
            calls: AtomicUsize::new(0),
            fail: AtomicBool::new(false),
        }
    }

    pub fn gated(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn set_results(&self, results: Vec<Classification>) {
        *self.results.lock() = results;
    }

    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Classifier for ScriptedClassifier {
    fn model(&self) -> ModelKind {
        self.model
    }

    async fn classify(&self, _frame: &Frame) -> Result<Vec<Classification>, ClassifierError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.started.notify_one();

        if let Some(gate) = &self.gate {
            gate.acquire()
                .await
                .map_err(|e| ClassifierError::Inference {
                    details: e.to_string(),
                })?
                .forget();
        }

        if self.fail.load(Ordering::SeqCst) {
            return Err(ClassifierError::Inference {
                details: "scripted failure".to_string(),
            });
        }
        Ok(self.results.lock().clone())
    }
}

/// Loader serving a fixed set of scripted classifiers; other models fail,
/// as does every model while the loader is offline
#[derive(Default)]
pub struct ScriptedLoader {
    classifiers: HashMap<ModelKind, Arc<ScriptedClassifier>>,
    offline: AtomicBool,
}

impl ScriptedLoader {
    pub fn with(mut self, classifier: Arc<ScriptedClassifier>) -> Self {
        self.classifiers.insert(classifier.model(), classifier);
        self
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }
}

impl ModelLoader for ScriptedLoader {
    fn load(&self, model: ModelKind) -> Result<Arc<dyn Classifier>, ClassifierError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(ClassifierError::ModelLoad {
                model: model.display_name().to_string(),
                details: "assets offline".to_string(),
            });
        }
        self.classifiers
            .get(&model)
            .map(|c| Arc::clone(c) as Arc<dyn Classifier>)
            .ok_or_else(|| ClassifierError::ModelLoad {
                model: model.display_name().to_string(),
                details: "missing asset".to_string(),
            })
    }
}

pub fn test_frame(id: u64) -> Frame {
    Frame::new(id, vec![0u8; 4 * 4 * 4], 4, 4, PixelFormat::Bgra32)
}

/// Poll `condition` until it holds, panicking after five seconds
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}
