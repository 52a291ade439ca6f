use super::model::{Classification, Classifier, ModelKind, ModelLoader};
use crate::config::ClassifierConfig;
use crate::error::ClassifierError;
use crate::frame::Frame;
use async_trait::async_trait;
use image::imageops::{self, FilterType};
use ort::{inputs, session::Session, value::Tensor};
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Loads `<model_dir>/<stem>.onnx` together with its labels file
pub struct OnnxModelLoader {
    config: ClassifierConfig,
}

impl OnnxModelLoader {
    pub fn new(config: ClassifierConfig) -> Self {
        Self { config }
    }
}

impl ModelLoader for OnnxModelLoader {
    fn load(&self, model: ModelKind) -> Result<Arc<dyn Classifier>, ClassifierError> {
        let classifier = OnnxClassifier::load(
            model,
            &self.config.model_path(model),
            &self.config.labels_path(model),
            self.config.input_size,
            self.config.top_k,
        )?;
        Ok(Arc::new(classifier))
    }
}

/// Image classifier backed by an ONNX Runtime session
pub struct OnnxClassifier {
    model: ModelKind,
    session: Arc<Mutex<Session>>,
    input_name: String,
    labels: Arc<Vec<String>>,
    input_size: u32,
    top_k: usize,
}

impl OnnxClassifier {
    pub fn load(
        model: ModelKind,
        model_path: &Path,
        labels_path: &Path,
        input_size: u32,
        top_k: usize,
    ) -> Result<Self, ClassifierError> {
        let load_error = |details: String| ClassifierError::ModelLoad {
            model: model.display_name().to_string(),
            details,
        };

        let labels = std::fs::read_to_string(labels_path)
            .map_err(|e| load_error(format!("{}: {}", labels_path.display(), e)))?
            .lines()
            .map(|line| line.trim().to_string())
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>();
        if labels.is_empty() {
            return Err(load_error(format!("{} has no labels", labels_path.display())));
        }

        let session = Session::builder()
            .map_err(|e| load_error(format!("failed to create session builder: {}", e)))?
            .commit_from_file(model_path)
            .map_err(|e| load_error(format!("{}: {}", model_path.display(), e)))?;

        let input_name = session
            .inputs()
            .first()
            .map(|input| input.name().to_string())
            .ok_or_else(|| load_error("model has no inputs".to_string()))?;

        info!(
            "Loaded ONNX model {} ({} labels, input '{}')",
            model_path.display(),
            labels.len(),
            input_name
        );

        Ok(Self {
            model,
            session: Arc::new(Mutex::new(session)),
            input_name,
            labels: Arc::new(labels),
            input_size,
            top_k,
        })
    }
}

#[async_trait]
impl Classifier for OnnxClassifier {
    fn model(&self) -> ModelKind {
        self.model
    }

    async fn classify(&self, frame: &Frame) -> Result<Vec<Classification>, ClassifierError> {
        let frame = frame.clone();
        let session = Arc::clone(&self.session);
        let labels = Arc::clone(&self.labels);
        let input_name = self.input_name.clone();
        let input_size = self.input_size;
        let top_k = self.top_k;

        tokio::task::spawn_blocking(move || {
            let tensor = preprocess(&frame, input_size)?;
            let input = Tensor::from_array((
                [1usize, 3, input_size as usize, input_size as usize],
                tensor,
            ))
            .map_err(|e| ClassifierError::Inference {
                details: format!("failed to build input tensor: {}", e),
            })?;

            let mut session = session.lock();
            let outputs = session
                .run(inputs![input_name.as_str() => input])
                .map_err(|e| ClassifierError::Inference {
                    details: format!("inference failed: {}", e),
                })?;

            let (_, scores) = outputs[0]
                .try_extract_tensor::<f32>()
                .map_err(|e| ClassifierError::Inference {
                    details: format!("output is not f32: {}", e),
                })?;

            debug!("Frame {} produced {} scores", frame.id, scores.len());
            Ok(rank(&probabilities(scores), &labels, top_k))
        })
        .await
        .map_err(|e| ClassifierError::Inference {
            details: format!("inference task failed: {}", e),
        })?
    }
}

/// Centre-crop, resize and normalise a frame into an NCHW tensor
fn preprocess(frame: &Frame, input_size: u32) -> Result<Vec<f32>, ClassifierError> {
    let mut image = frame.to_rgb_image()?;

    let (width, height) = image.dimensions();
    let edge = width.min(height);
    let cropped = imageops::crop(&mut image, (width - edge) / 2, (height - edge) / 2, edge, edge)
        .to_image();
    let resized = imageops::resize(&cropped, input_size, input_size, FilterType::Triangle);

    let plane = (input_size * input_size) as usize;
    let mut tensor = vec![0f32; plane * 3];
    for (i, pixel) in resized.pixels().enumerate() {
        for channel in 0..3 {
            let value = pixel.0[channel] as f32 / 255.0;
            tensor[channel * plane + i] = (value - IMAGENET_MEAN[channel]) / IMAGENET_STD[channel];
        }
    }
    Ok(tensor)
}

/// Apply softmax unless the model already emits probabilities
fn probabilities(scores: &[f32]) -> Vec<f32> {
    let sum: f32 = scores.iter().sum();
    let already_normalised = scores.iter().all(|s| (0.0..=1.0).contains(s)) && (sum - 1.0).abs() < 1e-3;
    if already_normalised {
        return scores.to_vec();
    }

    let max = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = scores.iter().map(|s| (s - max).exp()).collect();
    let total: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / total).collect()
}

fn rank(probabilities: &[f32], labels: &[String], top_k: usize) -> Vec<Classification> {
    let mut indexed: Vec<(usize, f32)> = probabilities.iter().copied().enumerate().collect();
    indexed.sort_by(|a, b| b.1.total_cmp(&a.1));
    indexed
        .into_iter()
        .take(top_k)
        .map(|(index, confidence)| {
            let identifier = labels
                .get(index)
                .cloned()
                .unwrap_or_else(|| format!("class {}", index));
            Classification::new(identifier, confidence)
        })
        .collect()
}
