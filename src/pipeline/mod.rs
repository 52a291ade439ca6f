mod classification;
mod stats;


pub use classification::{ClassificationPipeline, ClassificationRequest};
pub use stats::PipelineStats;
