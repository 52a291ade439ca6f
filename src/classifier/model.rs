use crate::error::ClassifierError;
use crate::frame::Frame;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// The fixed set of models a user can choose from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    /// General-purpose ImageNet classifier
    #[default]
    MobileNet,
    /// Food-101 dishes
    Food,
    /// Oxford 102 flower species
    Flowers,
}

impl ModelKind {
    pub const ALL: [ModelKind; 3] = [ModelKind::MobileNet, ModelKind::Food, ModelKind::Flowers];

    /// Name shown in menus and logs
    pub fn display_name(&self) -> &'static str {
        match self {
            ModelKind::MobileNet => "MobileNet",
            ModelKind::Food => "Food",
            ModelKind::Flowers => "Flowers",
        }
    }

    /// Base name of the model and label files on disk
    pub fn file_stem(&self) -> &'static str {
        match self {
            ModelKind::MobileNet => "mobilenet_v2",
            ModelKind::Food => "food101",
            ModelKind::Flowers => "oxford102",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let key = match self {
            ModelKind::MobileNet => "mobilenet",
            ModelKind::Food => "food",
            ModelKind::Flowers => "flowers",
        };
        f.write_str(key)
    }
}

impl FromStr for ModelKind {
    type Err = ClassifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mobilenet" | "mobilenetv2" | "mobilenet_v2" => Ok(ModelKind::MobileNet),
            "food" | "food101" => Ok(ModelKind::Food),
            "flowers" | "oxford102" => Ok(ModelKind::Flowers),
            other => Err(ClassifierError::InvalidInput {
                details: format!("Unknown model '{}'", other),
            }),
        }
    }
}

/// One labeled confidence score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    /// Raw class identifier, possibly several synonyms joined by a delimiter
    pub identifier: String,
    pub confidence: f32,
}

impl Classification {
    pub fn new(identifier: impl Into<String>, confidence: f32) -> Self {
        Self {
            identifier: identifier.into(),
            confidence,
        }
    }
}

/// Runs inference on a single frame
#[async_trait]
pub trait Classifier: Send + Sync {
    fn model(&self) -> ModelKind;

    async fn classify(&self, frame: &Frame) -> Result<Vec<Classification>, ClassifierError>;
}

/// Loads the classifier for a model
pub trait ModelLoader: Send + Sync {
    fn load(&self, model: ModelKind) -> Result<Arc<dyn Classifier>, ClassifierError>;
}

/// Loader used when no inference backend is compiled in. Every load fails,
/// which leaves classification unavailable without affecting capture.
#[derive(Debug, Default, Clone)]
pub struct UnavailableModelLoader;

impl ModelLoader for UnavailableModelLoader {
    fn load(&self, model: ModelKind) -> Result<Arc<dyn Classifier>, ClassifierError> {
        Err(ClassifierError::ModelLoad {
            model: model.display_name().to_string(),
            details: "no inference backend compiled in (enable the `onnx` feature)".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_kind_parsing() {
        assert_eq!("MobileNet".parse::<ModelKind>().unwrap(), ModelKind::MobileNet);
        assert_eq!("food".parse::<ModelKind>().unwrap(), ModelKind::Food);
        assert_eq!(" Oxford102 ".parse::<ModelKind>().unwrap(), ModelKind::Flowers);
        assert!("resnet".parse::<ModelKind>().is_err());
    }

    #[test]
    fn test_display_round_trips_through_parse() {
        for model in ModelKind::ALL {
            assert_eq!(model.to_string().parse::<ModelKind>().unwrap(), model);
        }
    }

    #[test]
    fn test_unavailable_loader() {
        let result = UnavailableModelLoader.load(ModelKind::Food);
        match result {
            Err(ClassifierError::ModelLoad { model, .. }) => assert_eq!(model, "Food"),
            _ => panic!("Expected model load error"),
        }
    }
}
