use crate::classifier::ModelKind;
use crate::config::StorageConfig;
use crate::error::StorageError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tokio::fs;
use tracing::{debug, info, warn};

/// Capture details written next to a saved photo
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotoMetadata {
    pub captured_at: DateTime<Utc>,
    pub size_bytes: usize,
    pub model: ModelKind,
    /// Label shown when the photo was saved; empty if none was accepted yet
    pub label: String,
}

/// A photo that has been written to the library
#[derive(Debug, Clone)]
pub struct SavedPhoto {
    pub path: PathBuf,
    pub metadata_path: Option<PathBuf>,
    pub size_bytes: u64,
    pub modified: SystemTime,
}

/// Destination for captured stills
#[async_trait]
pub trait PhotoLibrary: Send + Sync {
    /// Write the encoded image and return where it landed
    async fn persist(
        &self,
        bytes: &[u8],
        metadata: &PhotoMetadata,
    ) -> Result<SavedPhoto, StorageError>;
}

/// Photo library backed by a plain directory of JPEG files
pub struct DirectoryPhotoLibrary {
    root: PathBuf,
    save_metadata: bool,
}

impl DirectoryPhotoLibrary {
    pub fn new(config: &StorageConfig) -> Self {
        Self {
            root: PathBuf::from(&config.path),
            save_metadata: config.save_metadata,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `IMG_20240101_120000_1a2b3c4d.jpg`
    fn file_name(captured_at: &DateTime<Utc>) -> String {
        let id = uuid::Uuid::new_v4().simple().to_string();
        format!("IMG_{}_{}.jpg", captured_at.format("%Y%m%d_%H%M%S"), &id[..8])
    }

    fn is_photo_name(name: &str) -> bool {
        name.starts_with("IMG_") && name.ends_with(".jpg")
    }

    async fn ensure_root(&self) -> Result<(), StorageError> {
        fs::create_dir_all(&self.root)
            .await
            .map_err(|e| StorageError::Directory {
                path: self.root.display().to_string(),
                details: e.to_string(),
            })
    }

    async fn write_metadata(
        &self,
        photo_path: &Path,
        metadata: &PhotoMetadata,
    ) -> Result<PathBuf, StorageError> {
        let metadata_path = photo_path.with_extension("json");
        let json = serde_json::to_string_pretty(metadata).map_err(|e| StorageError::Metadata {
            details: e.to_string(),
        })?;
        fs::write(&metadata_path, json)
            .await
            .map_err(|e| StorageError::Metadata {
                details: format!("{}: {}", metadata_path.display(), e),
            })?;
        Ok(metadata_path)
    }

    /// Saved photos, newest first
    pub async fn list(&self) -> Result<Vec<SavedPhoto>, StorageError> {
        let directory_error = |e: std::io::Error| StorageError::Directory {
            path: self.root.display().to_string(),
            details: e.to_string(),
        };

        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(directory_error(e)),
        };

        let mut photos = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(directory_error)? {
            let path = entry.path();
            let is_photo = path
                .file_name()
                .and_then(|n| n.to_str())
                .map(Self::is_photo_name)
                .unwrap_or(false);
            if !is_photo {
                continue;
            }

            let file_metadata = match entry.metadata().await {
                Ok(m) => m,
                Err(e) => {
                    warn!("Failed to stat {}: {}", path.display(), e);
                    continue;
                }
            };
            let sidecar = path.with_extension("json");
            photos.push(SavedPhoto {
                metadata_path: sidecar.exists().then_some(sidecar),
                size_bytes: file_metadata.len(),
                modified: file_metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
                path,
            });
        }

        photos.sort_by(|a, b| b.modified.cmp(&a.modified).then_with(|| b.path.cmp(&a.path)));
        Ok(photos)
    }
}

#[async_trait]
impl PhotoLibrary for DirectoryPhotoLibrary {
    async fn persist(
        &self,
        bytes: &[u8],
        metadata: &PhotoMetadata,
    ) -> Result<SavedPhoto, StorageError> {
        self.ensure_root().await?;

        let path = self.root.join(Self::file_name(&metadata.captured_at));
        self.write_photo(path, bytes, metadata).await
    }
}

impl DirectoryPhotoLibrary {
    /// Write the image and its sidecar. A photo is only kept when both land,
    /// so a retried save never leaves a duplicate behind.
    async fn write_photo(
        &self,
        path: PathBuf,
        bytes: &[u8],
        metadata: &PhotoMetadata,
    ) -> Result<SavedPhoto, StorageError> {
        fs::write(&path, bytes)
            .await
            .map_err(|source| StorageError::Write {
                path: path.display().to_string(),
                source,
            })?;
        debug!("Wrote {} bytes to {}", bytes.len(), path.display());

        let metadata_path = if self.save_metadata {
            match self.write_metadata(&path, metadata).await {
                Ok(metadata_path) => Some(metadata_path),
                Err(e) => {
                    if let Err(remove) = fs::remove_file(&path).await {
                        warn!("Failed to remove {}: {}", path.display(), remove);
                    }
                    return Err(e);
                }
            }
        } else {
            None
        };

        info!("Saved photo {}", path.display());
        Ok(SavedPhoto {
            path,
            metadata_path,
            size_bytes: bytes.len() as u64,
            modified: SystemTime::now(),
        })
    }
}
