//! Read-only storage backend.
//!
//! Origins are only ever read from. Wrapping them here means a bug in the
//! pull pipeline can't write into somebody else's archive.

use async_trait::async_trait;
use std::path::Path;

use crate::backend::{BoxSyncRead, BoxSyncWrite};
use crate::error::{ErrorKind, Result};
use crate::{BackendHandle, StorageBackend, file::FileInfo};

/// Read-only storage backend.
///
/// Wraps another backend and refuses every mutating operation with
/// [`PermissionDenied`](ErrorKind::PermissionDenied).
#[derive(Clone)]
pub struct ReadOnlyBackend {
    inner: BackendHandle,
}
impl ReadOnlyBackend {
    pub fn new(inner: BackendHandle) -> Self {
        Self { inner }
    }

    fn refuse(&self, operation: &str, path: &Path) -> crate::error::Error {
        tracing::warn!(backend = self.inner.name(), path = %path.display(), operation, "Refusing write to read-only backend");
        ErrorKind::PermissionDenied(path.to_path_buf()).into()
    }
}

#[async_trait]
impl StorageBackend for ReadOnlyBackend {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        self.inner.exists(path).await
    }

    async fn read(&self, path: &Path) -> Result<Vec<u8>> {
        self.inner.read(path).await
    }

    async fn reader(&self, path: &Path) -> Result<BoxSyncRead> {
        self.inner.reader(path).await
    }

    async fn write(&self, path: &Path, _data: &[u8]) -> Result<()> {
        Err(self.refuse("write", path))
    }

    async fn writer(&self, path: &Path) -> Result<BoxSyncWrite> {
        Err(self.refuse("writer", path))
    }

    async fn delete(&self, path: &Path) -> Result<()> {
        Err(self.refuse("delete", path))
    }

    async fn rename(&self, from: &Path, _to: &Path) -> Result<()> {
        Err(self.refuse("rename", from))
    }

    async fn stat(&self, path: &Path) -> Result<FileInfo> {
        self.inner.stat(path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::LocalBackend;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_reads_pass_through_and_writes_are_refused() {
        let temp_dir = tempfile::tempdir().unwrap();
        let local = LocalBackend::new("archive", temp_dir.path()).unwrap();
        local.write(Path::new("docs/report.pdf"), b"content").await.unwrap();
        let backend = ReadOnlyBackend::new(Arc::new(local));

        assert_eq!(backend.name(), "archive");
        assert!(backend.exists(Path::new("docs/report.pdf")).await.unwrap());
        assert_eq!(backend.stat(Path::new("docs/report.pdf")).await.unwrap().size, 7);

        let err = backend.write(Path::new("docs/other.pdf"), b"x").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::PermissionDenied(_)));
        assert!(backend.writer(Path::new("docs/other.pdf")).await.is_err());
        assert!(backend.delete(Path::new("docs/report.pdf")).await.is_err());
        assert!(backend.exists(Path::new("docs/report.pdf")).await.unwrap());
    }
}
