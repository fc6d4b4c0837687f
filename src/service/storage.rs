use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::model::ticket::AttachmentUpload;

pub const MAX_ATTACHMENT_BYTES: u64 = 10 * 1024 * 1024;
pub const MAX_SUBMISSION_ATTACHMENTS: usize = 5;

#[derive(Debug, Error)]
pub enum FileStorageError {
    #[error("file of {size} bytes exceeds the 10 MiB limit")]
    TooLarge { size: u64 },

    #[error("file is empty")]
    Empty,

    #[error("file name is missing")]
    MissingName,

    #[error("`{0}` is not a file stored by this server")]
    UnknownLocator(String),

    #[error("file storage io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Accepts uploaded bytes and hands back a locator the ticket can keep.
#[async_trait]
pub trait FileStorage: Send + Sync {
    async fn store(
        &self,
        name: &str,
        mime_type: &str,
        content: Bytes,
    ) -> Result<AttachmentUpload, FileStorageError>;

    /// Checks that `upload` names a file this storage handed out and
    /// returns it with the size read back from storage.
    async fn verify(&self, upload: &AttachmentUpload) -> Result<AttachmentUpload, FileStorageError>;
}

pub struct LocalFileStorage {
    root: PathBuf,
}

impl LocalFileStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl FileStorage for LocalFileStorage {
    #[instrument(skip(self, content), fields(size = content.len()))]
    async fn store(
        &self,
        name: &str,
        mime_type: &str,
        content: Bytes,
    ) -> Result<AttachmentUpload, FileStorageError> {
        let size = content.len() as u64;
        if size > MAX_ATTACHMENT_BYTES {
            return Err(FileStorageError::TooLarge { size });
        }
        if size == 0 {
            return Err(FileStorageError::Empty);
        }
        let safe_name = sanitize_file_name(name).ok_or(FileStorageError::MissingName)?;

        fs::create_dir_all(&self.root).await?;
        let file_name = format!("{}-{}", Uuid::new_v4().simple(), safe_name);
        let path = self.root.join(&file_name);
        // an existing path is an error, never overwritten
        let mut file = OpenOptions::new().write(true).create_new(true).open(&path).await?;
        file.write_all(&content).await?;
        file.flush().await?;

        info!(path = %path.display(), "attachment stored");

        Ok(AttachmentUpload {
            name: safe_name,
            size: size as i64,
            mime_type: if mime_type.is_empty() { "application/octet-stream".into() } else { mime_type.to_string() },
            url: path.to_string_lossy().into_owned(),
        })
    }

    async fn verify(&self, upload: &AttachmentUpload) -> Result<AttachmentUpload, FileStorageError> {
        let path = Path::new(&upload.url);
        let issued = path.file_name().is_some_and(|name| self.root.join(name) == path);
        if !issued {
            return Err(FileStorageError::UnknownLocator(upload.url.clone()));
        }

        let metadata = match fs::metadata(path).await {
            Ok(metadata) if metadata.is_file() => metadata,
            Ok(_) => return Err(FileStorageError::UnknownLocator(upload.url.clone())),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(FileStorageError::UnknownLocator(upload.url.clone()));
            }
            Err(err) => return Err(err.into()),
        };
        let size = metadata.len();
        if size > MAX_ATTACHMENT_BYTES {
            return Err(FileStorageError::TooLarge { size });
        }

        Ok(AttachmentUpload { size: size as i64, ..upload.clone() })
    }
}

/// Keeps only the final path component, with anything outside
/// `[A-Za-z0-9._-]` replaced by `_`.
fn sanitize_file_name(name: &str) -> Option<String> {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default().trim();
    let cleaned: String = base
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .collect();
    let cleaned = cleaned.trim_start_matches('.').to_string();
    if cleaned.is_empty() { None } else { Some(cleaned) }
}
