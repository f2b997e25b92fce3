//! On-disk attachment storage.
//!
//! Uploaded files land under one flat directory as `<uuid>_<name>` and are
//! served back by the same handle. File names are sanitized before they
//! touch the filesystem.

use std::path::PathBuf;

use tokio::fs;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::ApiError;

/// Extensions accepted for upload: images, PDF and common audio containers.
const ACCEPTED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "pdf", "mp3", "wav", "ogg"];

#[derive(Debug, Clone)]
pub struct UploadStore {
    base_path: PathBuf,
    max_size: usize,
}

impl UploadStore {
    pub async fn new(base_path: PathBuf, max_size: usize) -> Result<Self, ApiError> {
        fs::create_dir_all(&base_path).await.map_err(|e| {
            ApiError::UploadStorage(format!(
                "Failed to create upload directory '{}': {}",
                base_path.display(),
                e
            ))
        })?;

        info!(path = %base_path.display(), "Upload store initialized");

        Ok(Self {
            base_path,
            max_size,
        })
    }

    /// Persist an uploaded file and return its public URL path.
    pub async fn store(&self, file_name: &str, data: &[u8]) -> Result<String, ApiError> {
        if data.is_empty() {
            return Err(ApiError::BadRequest("Empty upload".to_string()));
        }
        if data.len() > self.max_size {
            return Err(ApiError::UploadTooLarge {
                size: data.len(),
                max: self.max_size,
            });
        }

        let sanitized = sanitize_file_name(file_name)?;
        let stored_name = format!("{}_{}", Uuid::new_v4(), sanitized);
        let path = self.safe_path(&stored_name)?;

        fs::write(&path, data).await.map_err(|e| {
            ApiError::UploadStorage(format!("Failed to write upload {}: {}", stored_name, e))
        })?;

        debug!(name = %stored_name, size = data.len(), "Stored upload");
        Ok(format!("/uploads/{stored_name}"))
    }

    /// Read a previously stored file back.
    pub async fn load(&self, stored_name: &str) -> Result<Vec<u8>, ApiError> {
        let path = self.safe_path(stored_name)?;

        if !path.exists() {
            return Err(ApiError::NotFound(format!("upload {stored_name}")));
        }

        fs::read(&path).await.map_err(|e| {
            ApiError::UploadStorage(format!("Failed to read upload {}: {}", stored_name, e))
        })
    }

    /// Join a file name onto the base directory, rejecting traversal.
    fn safe_path(&self, name: &str) -> Result<PathBuf, ApiError> {
        if name.contains('/') || name.contains('\\') || name.contains("..") {
            return Err(ApiError::BadRequest("Path traversal detected".to_string()));
        }
        Ok(self.base_path.join(name))
    }
}

/// Strip directories from a client-supplied file name and check its
/// extension against the accepted list.
fn sanitize_file_name(raw: &str) -> Result<String, ApiError> {
    let name = raw
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(raw)
        .replace("..", "_");
    if name.is_empty() {
        return Err(ApiError::BadRequest("Missing file name".to_string()));
    }

    let extension = name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    if !ACCEPTED_EXTENSIONS.contains(&extension.as_str()) {
        return Err(ApiError::BadRequest(format!(
            "Unsupported file type: .{extension}"
        )));
    }

    Ok(name)
}
