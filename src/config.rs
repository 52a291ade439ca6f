use crate::classifier::ModelKind;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SmartCameraConfig {
    pub camera: CameraConfig,
    pub classifier: ClassifierConfig,
    pub storage: StorageConfig,
    pub system: SystemConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CameraConfig {
    /// Camera device index (e.g., 0 for /dev/video0)
    #[serde(default = "default_camera_index")]
    pub index: u32,

    /// Camera resolution (width, height)
    #[serde(default = "default_camera_resolution")]
    pub resolution: (u32, u32),

    /// Frames per second
    #[serde(default = "default_camera_fps")]
    pub fps: u32,

    /// Drop frames the classifier is not ready for instead of buffering them
    #[serde(default = "default_discard_late_frames")]
    pub discard_late_frames: bool,

    /// Frames held between the device and the frame delivery task
    #[serde(default = "default_frame_queue_depth")]
    pub frame_queue_depth: usize,
}

/// How the classification pipeline treats frames that arrive while a
/// request is already running.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum InflightPolicy {
    /// Keep a single pending frame, replacing it with every newer frame
    LatestWins,
    /// Drop frames while a request is running or pending
    DropWhileBusy,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ClassifierConfig {
    /// Model used until the user selects another one
    #[serde(default = "default_model")]
    pub default_model: ModelKind,

    /// Top confidence must be strictly greater than this to update the label
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f32,

    /// Separator between synonyms in a classification identifier
    #[serde(default = "default_label_delimiter")]
    pub label_delimiter: String,

    #[serde(default = "default_inflight_policy")]
    pub inflight_policy: InflightPolicy,

    /// Directory holding `<model>.onnx` and `<model>.labels.txt` files
    #[serde(default = "default_model_dir")]
    pub model_dir: String,

    /// Square input edge the models expect
    #[serde(default = "default_input_size")]
    pub input_size: u32,

    /// Number of classifications kept per frame
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Minimum delay before retrying a model that failed to load
    #[serde(default = "default_model_retry_interval_ms")]
    pub model_retry_interval_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StorageConfig {
    /// Directory photos are saved to
    #[serde(default = "default_storage_path")]
    pub path: String,

    /// Write a JSON sidecar next to every saved photo
    #[serde(default = "default_save_metadata")]
    pub save_metadata: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SystemConfig {
    /// Event bus capacity
    #[serde(default = "default_event_bus_capacity")]
    pub event_bus_capacity: usize,
}

impl ClassifierConfig {
    pub fn model_path(&self, model: ModelKind) -> PathBuf {
        Path::new(&self.model_dir).join(format!("{}.onnx", model.file_stem()))
    }

    pub fn labels_path(&self, model: ModelKind) -> PathBuf {
        Path::new(&self.model_dir).join(format!("{}.labels.txt", model.file_stem()))
    }
}

impl SmartCameraConfig {
    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            .set_default("camera.index", default_camera_index())?
            .set_default(
                "camera.resolution",
                vec![default_camera_resolution().0, default_camera_resolution().1],
            )?
            .set_default("camera.fps", default_camera_fps())?
            .set_default("camera.discard_late_frames", default_discard_late_frames())?
            .set_default(
                "camera.frame_queue_depth",
                default_frame_queue_depth() as i64,
            )?
            .set_default("classifier.default_model", default_model().to_string())?
            .set_default(
                "classifier.confidence_threshold",
                default_confidence_threshold() as f64,
            )?
            .set_default("classifier.label_delimiter", default_label_delimiter())?
            .set_default("classifier.inflight_policy", "latest_wins")?
            .set_default("classifier.model_dir", default_model_dir())?
            .set_default("classifier.input_size", default_input_size())?
            .set_default("classifier.top_k", default_top_k() as i64)?
            .set_default(
                "classifier.model_retry_interval_ms",
                default_model_retry_interval_ms(),
            )?
            .set_default("storage.path", default_storage_path())?
            .set_default("storage.save_metadata", default_save_metadata())?
            .set_default(
                "system.event_bus_capacity",
                default_event_bus_capacity() as i64,
            )?
            // Add configuration file (optional)
            .add_source(File::with_name(&path_str).required(false))
            // SMARTCAM_CAMERA__FPS=15 style overrides
            .add_source(
                Environment::with_prefix("SMARTCAM")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let config: SmartCameraConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.camera.resolution.0 == 0 || self.camera.resolution.1 == 0 {
            return Err(ConfigError::Message(
                "Camera resolution must be greater than 0".to_string(),
            ));
        }

        if self.camera.fps == 0 {
            return Err(ConfigError::Message(
                "Camera fps must be greater than 0".to_string(),
            ));
        }

        if self.camera.frame_queue_depth == 0 {
            return Err(ConfigError::Message(
                "Camera frame_queue_depth must be greater than 0".to_string(),
            ));
        }

        let threshold = self.classifier.confidence_threshold;
        if !(0.0..1.0).contains(&threshold) {
            return Err(ConfigError::Message(format!(
                "Classifier confidence_threshold must be in [0, 1), got {}",
                threshold
            )));
        }

        if self.classifier.label_delimiter.is_empty() {
            return Err(ConfigError::Message(
                "Classifier label_delimiter must not be empty".to_string(),
            ));
        }

        if self.classifier.input_size == 0 || self.classifier.top_k == 0 {
            return Err(ConfigError::Message(
                "Classifier input_size and top_k must be greater than 0".to_string(),
            ));
        }

        if self.system.event_bus_capacity == 0 {
            return Err(ConfigError::Message(
                "Event bus capacity must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for SmartCameraConfig {
    fn default() -> Self {
        Self {
            camera: CameraConfig {
                index: default_camera_index(),
                resolution: default_camera_resolution(),
                fps: default_camera_fps(),
                discard_late_frames: default_discard_late_frames(),
                frame_queue_depth: default_frame_queue_depth(),
            },
            classifier: ClassifierConfig {
                default_model: default_model(),
                confidence_threshold: default_confidence_threshold(),
                label_delimiter: default_label_delimiter(),
                inflight_policy: default_inflight_policy(),
                model_dir: default_model_dir(),
                input_size: default_input_size(),
                top_k: default_top_k(),
                model_retry_interval_ms: default_model_retry_interval_ms(),
            },
            storage: StorageConfig {
                path: default_storage_path(),
                save_metadata: default_save_metadata(),
            },
            system: SystemConfig {
                event_bus_capacity: default_event_bus_capacity(),
            },
        }
    }
}

// Default value functions
fn default_camera_index() -> u32 {
    0
}
fn default_camera_resolution() -> (u32, u32) {
    (640, 480)
}
fn default_camera_fps() -> u32 {
    30
}
fn default_discard_late_frames() -> bool {
    true
}
fn default_frame_queue_depth() -> usize {
    1
}

fn default_model() -> ModelKind {
    ModelKind::MobileNet
}
fn default_confidence_threshold() -> f32 {
    0.5
}
fn default_label_delimiter() -> String {
    ",".to_string()
}
fn default_inflight_policy() -> InflightPolicy {
    InflightPolicy::LatestWins
}
fn default_model_dir() -> String {
    "./models".to_string()
}
fn default_input_size() -> u32 {
    224
}
fn default_top_k() -> usize {
    5
}
fn default_model_retry_interval_ms() -> u64 {
    5000
}

fn default_storage_path() -> String {
    "./photos".to_string()
}
fn default_save_metadata() -> bool {
    false
}

fn default_event_bus_capacity() -> usize {
    100
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = SmartCameraConfig::default();

        assert!(config.validate().is_ok());
        assert_eq!(config.classifier.confidence_threshold, 0.5);
        assert_eq!(config.classifier.label_delimiter, ",");
        assert_eq!(config.classifier.default_model, ModelKind::MobileNet);
        assert_eq!(config.classifier.inflight_policy, InflightPolicy::LatestWins);
        assert!(config.camera.discard_late_frames);
    }

    #[test]
    fn test_config_validation() {
        let mut config = SmartCameraConfig::default();
        config.camera.resolution = (0, 0);
        assert!(config.validate().is_err());

        config.camera.resolution = (640, 480);
        assert!(config.validate().is_ok());

        config.classifier.confidence_threshold = 1.0;
        assert!(config.validate().is_err());

        config.classifier.confidence_threshold = 0.5;
        config.classifier.label_delimiter.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        writeln!(
            file,
            r#"
[camera]
fps = 15

[classifier]
default_model = "flowers"
inflight_policy = "drop_while_busy"

[storage]
path = "/tmp/smartcam-photos"
"#
        )
        .unwrap();

        let config = SmartCameraConfig::load_from_file(file.path()).unwrap();

        assert_eq!(config.camera.fps, 15);
        assert_eq!(config.camera.resolution, (640, 480));
        assert_eq!(config.classifier.default_model, ModelKind::Flowers);
        assert_eq!(
            config.classifier.inflight_policy,
            InflightPolicy::DropWhileBusy
        );
        assert_eq!(config.storage.path, "/tmp/smartcam-photos");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_model_paths() {
        let config = SmartCameraConfig::default();

        assert_eq!(
            config.classifier.model_path(ModelKind::Food),
            Path::new("./models").join("food101.onnx")
        );
        assert_eq!(
            config.classifier.labels_path(ModelKind::Flowers),
            Path::new("./models").join("oxford102.labels.txt")
        );
    }
}
