//! Filesystem access for the shared file.

use async_trait::async_trait;
use std::io;
use std::path::Path;
use tokio::io::AsyncRead;

/// Open readable byte stream plus its length when known.
pub struct FileStream {
    pub reader: Box<dyn AsyncRead + Send + Unpin>,
    pub len: Option<u64>,
}

#[async_trait]
pub trait FileGateway: Send + Sync {
    /// True when `path` names an existing regular file.
    async fn exists(&self, path: &Path) -> bool;

    async fn open(&self, path: &Path) -> io::Result<FileStream>;
}

/// Local disk via tokio's blocking-pool file I/O.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFileGateway;

#[async_trait]
impl FileGateway for LocalFileGateway {
    async fn exists(&self, path: &Path) -> bool {
        tokio::fs::metadata(path)
            .await
            .map(|meta| meta.is_file())
            .unwrap_or(false)
    }

    async fn open(&self, path: &Path) -> io::Result<FileStream> {
        let file = tokio::fs::File::open(path).await?;
        let len = file.metadata().await.ok().map(|m| m.len());
        Ok(FileStream {
            reader: Box::new(file),
            len,
        })
    }
}
