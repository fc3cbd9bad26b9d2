use std::{
    io,
    path::{Component, Path, PathBuf},
};

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use tokio::{
    fs,
    io::{AsyncWrite, AsyncWriteExt},
};
use tracing::{debug, warn};
use uuid::Uuid;

const ALLOWED_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "gif"];

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("invalid file type: {0}")]
    InvalidFileType(String),

    #[error("invalid blob reference: {0}")]
    PathTraversal(String),

    #[error("blob io: {0}")]
    Io(#[from] io::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Logical subdirectory a blob lives under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlobKind {
    Users,
    Products,
}

impl BlobKind {
    pub fn dir(self) -> &'static str {
        match self {
            BlobKind::Users => "users",
            BlobKind::Products => "products",
        }
    }
}

/// A file received from a client, not yet persisted.
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub body: Bytes,
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Persists the upload and returns its reference (`<subdir>/<uuid>.<ext>`).
    async fn save(&self, upload: Upload, kind: BlobKind) -> StorageResult<String>;

    /// Absolute path for a reference, or `None` when the reference is unsafe.
    fn resolve(&self, reference: &str) -> Option<PathBuf>;

    /// Removes the blob. A reference whose file is already gone is not an error.
    async fn delete(&self, reference: &str) -> StorageResult<()>;
}

/// Blob store backed by a directory on the local filesystem.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    /// Creates the root directory if needed and pins it to an absolute path.
    pub async fn init(root: impl AsRef<Path>) -> io::Result<Self> {
        let root = root.as_ref();
        if fs::metadata(root).await.is_err() {
            debug!(root = %root.display(), "creating upload directory");
            fs::create_dir_all(root).await?;
        }
        let root = fs::canonicalize(root).await?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Returns the extension (without dot) if it is on the allow-list.
fn allowed_extension(file_name: &str) -> StorageResult<&str> {
    let ext = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default();
    if ALLOWED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()) {
        Ok(ext)
    } else {
        Err(StorageError::InvalidFileType(format!(".{ext}")))
    }
}

/// Destination of a blob write. `commit` makes the written bytes durable.
#[async_trait]
trait BlobSink: AsyncWrite + Unpin + Send {
    async fn commit(&mut self) -> io::Result<()>;
}

#[async_trait]
impl BlobSink for fs::File {
    async fn commit(&mut self) -> io::Result<()> {
        self.sync_all().await
    }
}

async fn write_body<S: BlobSink>(sink: &mut S, body: &[u8]) -> io::Result<()> {
    sink.write_all(body).await?;
    sink.commit().await
}

impl LocalStorage {
    /// Writes the upload through the sink built by `wrap` around the new file.
    /// Any failure removes the file before returning.
    async fn save_via<S, F>(&self, upload: Upload, kind: BlobKind, wrap: F) -> StorageResult<String>
    where
        S: BlobSink,
        F: FnOnce(fs::File) -> S + Send,
    {
        let ext = allowed_extension(&upload.file_name)?;

        let dir = self.root.join(kind.dir());
        fs::create_dir_all(&dir).await?;

        let file_name = format!("{}.{}", Uuid::new_v4(), ext);
        let reference = format!("{}/{}", kind.dir(), file_name);
        let path = dir.join(&file_name);

        let file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await?;
        let mut sink = wrap(file);

        if let Err(e) = write_body(&mut sink, &upload.body).await {
            drop(sink);
            if let Err(rm) = fs::remove_file(&path).await {
                warn!(path = %path.display(), error = %rm, "failed to remove partial upload");
            }
            return Err(e.into());
        }

        debug!(%reference, bytes = upload.body.len(), "blob saved");
        Ok(reference)
    }
}

#[async_trait]
impl BlobStore for LocalStorage {
    async fn save(&self, upload: Upload, kind: BlobKind) -> StorageResult<String> {
        self.save_via(upload, kind, |file| file).await
    }

    fn resolve(&self, reference: &str) -> Option<PathBuf> {
        if reference.is_empty() || reference.contains("..") {
            warn!(%reference, "rejected blob reference");
            return None;
        }
        let rel = Path::new(reference);
        let only_normal = rel
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        if !only_normal {
            warn!(%reference, "rejected blob reference");
            return None;
        }
        Some(self.root.join(rel))
    }

    async fn delete(&self, reference: &str) -> StorageResult<()> {
        let path = self
            .resolve(reference)
            .ok_or_else(|| StorageError::PathTraversal(reference.to_string()))?;

        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!(%reference, "blob deleted");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(%reference, "blob already absent");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}
