use std::path::{Path, PathBuf};

use base64::Engine;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("Invalid base64 image data: {0}")]
    Decode(#[from] base64::DecodeError),
}

#[derive(Debug, Clone)]
pub struct SavedImage {
    pub filename: String,
    pub file_path: String,
}

/// Writes generated images under the asset directory, partitioned per user
/// and account so account deletion can clean up one directory tree.
#[derive(Debug, Clone)]
pub struct ImageStorage {
    root: PathBuf,
}

impl ImageStorage {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn with_default_root() -> Self {
        Self::new(utils::assets::upload_dir())
    }

    fn partition_dir(&self, user_id: Uuid, account_id: Option<Uuid>) -> PathBuf {
        let account_part = match account_id {
            Some(id) => format!("account_{id}"),
            None => "global".to_string(),
        };
        self.root.join(format!("user_{user_id}")).join(account_part)
    }

    /// Decodes and writes a base64 image, returning the stored filename and
    /// absolute path. Filenames are millisecond timestamps, which keeps
    /// directory listings in generation order.
    pub async fn save_base64(
        &self,
        user_id: Uuid,
        account_id: Option<Uuid>,
        image_base64: &str,
    ) -> Result<SavedImage, StorageError> {
        let bytes = base64::engine::general_purpose::STANDARD.decode(image_base64)?;

        let dir = self.partition_dir(user_id, account_id);
        tokio::fs::create_dir_all(&dir).await?;

        let filename = format!("{}.png", chrono::Utc::now().timestamp_millis());
        let file_path = dir.join(&filename);
        tokio::fs::write(&file_path, bytes).await?;

        Ok(SavedImage {
            filename,
            file_path: file_path.to_string_lossy().into_owned(),
        })
    }

    pub async fn read_as_base64(&self, file_path: &str) -> Result<String, StorageError> {
        let bytes = tokio::fs::read(file_path).await?;
        Ok(base64::engine::general_purpose::STANDARD.encode(bytes))
    }

    /// Removes a stored file. Missing files are not an error; the row may
    /// outlive the file after a partial cleanup.
    pub async fn delete_file(&self, file_path: &str) {
        match tokio::fs::remove_file(file_path).await {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => {
                tracing::warn!("Failed to delete image file {}: {}", file_path, err);
            }
        }
    }

    pub async fn delete_files<P: AsRef<Path>>(&self, file_paths: impl IntoIterator<Item = P>) {
        for path in file_paths {
            self.delete_file(&path.as_ref().to_string_lossy()).await;
        }
    }
}
