mod label;
mod model;
#[cfg(feature = "onnx")]
mod onnx;
mod registry;

pub use label::{accepted_label, format_label, top_classification};
pub use model::{Classification, Classifier, ModelKind, ModelLoader, UnavailableModelLoader};
#[cfg(feature = "onnx")]
pub use onnx::{OnnxClassifier, OnnxModelLoader};
pub use registry::{ModelRegistry, Resolution};
