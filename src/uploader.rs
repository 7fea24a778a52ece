use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::RwLock;
use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;
use crate::game::UserId;

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("upload io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("upload lock poisoned")]
    Lock,
}

/// Stores a host's puzzle image and hands back a public URL for it.
#[async_trait]
pub trait ImageUploader: Send + Sync {
    async fn upload_image(&self, owner_id: UserId, bytes: &[u8]) -> Result<String, UploadError>;
}

/// File extension for an image payload, by magic bytes.
pub fn image_extension(bytes: &[u8]) -> &'static str {
    match bytes {
        [0x89, b'P', b'N', b'G', ..] => "png",
        [0xFF, 0xD8, 0xFF, ..] => "jpg",
        [b'G', b'I', b'F', b'8', ..] => "gif",
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => "webp",
        _ => "bin",
    }
}

/// Writes images under `dir/<owner>/<uuid>.<ext>` and serves them from
/// `public_url/<owner>/<uuid>.<ext>`.
pub struct FsUploader {
    dir: PathBuf,
    public_url: String,
}

impl FsUploader {
    pub fn new(dir: impl Into<PathBuf>, public_url: impl Into<String>) -> Self {
        FsUploader {
            dir: dir.into(),
            public_url: public_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl ImageUploader for FsUploader {
    async fn upload_image(&self, owner_id: UserId, bytes: &[u8]) -> Result<String, UploadError> {
        let owner_dir = self.dir.join(owner_id.to_string());
        tokio::fs::create_dir_all(&owner_dir).await?;

        let file_name = format!("{}.{}", Uuid::new_v4(), image_extension(bytes));
        tokio::fs::write(owner_dir.join(&file_name), bytes).await?;

        tracing::info!(owner_id, file = %file_name, size = bytes.len(), "image stored");
        Ok(format!("{}/{}/{}", self.public_url, owner_id, file_name))
    }
}

/// Keeps uploads in memory under `memory://<owner>/<uuid>.<ext>` URLs.
#[derive(Default)]
pub struct MemoryUploader {
    images: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryUploader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn image(&self, url: &str) -> Option<Vec<u8>> {
        self.images.read().ok()?.get(url).cloned()
    }
}

#[async_trait]
impl ImageUploader for MemoryUploader {
    async fn upload_image(&self, owner_id: UserId, bytes: &[u8]) -> Result<String, UploadError> {
        let url = format!("memory://{}/{}.{}", owner_id, Uuid::new_v4(), image_extension(bytes));
        let mut images = self.images.write().map_err(|_| UploadError::Lock)?;
        images.insert(url.clone(), bytes.to_vec());
        Ok(url)
    }
}
