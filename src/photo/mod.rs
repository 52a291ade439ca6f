mod flow;
mod library;

#[cfg(test)]
mod tests;

pub use flow::PhotoCaptureFlow;
pub use library::{DirectoryPhotoLibrary, PhotoLibrary, PhotoMetadata, SavedPhoto};
