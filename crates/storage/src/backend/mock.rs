//! In-memory storage backend for testing.

use crate::backend::{BoxSyncRead, BoxSyncWrite};
use crate::error::{ErrorKind, Result};
use crate::file::FileInfo;
use crate::path::validate as validate_path;
use crate::StorageBackend;
use async_trait::async_trait;
use std::collections::HashMap;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use time::UtcDateTime;

type Files = Arc<RwLock<HashMap<PathBuf, (UtcDateTime, Vec<u8>)>>>;

/// In-memory storage backend for testing.
///
/// Files live in a `HashMap` behind a std [`RwLock`] (never held across an
/// await point), so the sync writers returned by
/// [`writer()`](StorageBackend::writer) can commit from blocking threads.
///
/// ```
/// use golink_storage::backend::{MockBackend, StorageBackend};
/// use std::path::Path;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = MockBackend::with_files([("docs/report.pdf", b"%PDF")]);
/// assert!(backend.exists(Path::new("docs/report.pdf")).await?);
/// # Ok(())
/// # }
/// ```
pub struct MockBackend {
    name: String,
    storage: Files,
}

impl MockBackend {
    /// Create a mock backend pre-populated with files.
    ///
    /// Panics if any path fails validation. If test setup is wrong, then the
    /// test should not pass.
    pub fn with_files(files: impl IntoIterator<Item = (impl Into<PathBuf>, impl Into<Vec<u8>>)>) -> Self {
        let now = UtcDateTime::now();
        let map = files
            .into_iter()
            .map(|(path, data)| {
                let path = path.into();
                let Ok(validated) = validate_path(&path) else {
                    panic!("MockBackend::with_files: invalid path {}", path.display());
                };
                (validated, (now, data.into()))
            })
            .collect();
        Self {
            name: "mock".to_string(),
            storage: Arc::new(RwLock::new(map)),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Snapshot of every stored path, sorted.
    pub fn paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<_> = self.files().keys().cloned().collect();
        paths.sort();
        paths
    }

    fn files(&self) -> std::sync::RwLockReadGuard<'_, HashMap<PathBuf, (UtcDateTime, Vec<u8>)>> {
        self.storage.read().expect("mock storage lock poisoned")
    }

    fn files_mut(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<PathBuf, (UtcDateTime, Vec<u8>)>> {
        self.storage.write().expect("mock storage lock poisoned")
    }

    fn get(&self, path: &Path) -> Result<(UtcDateTime, Vec<u8>)> {
        let path = validate_path(path)?;
        let found = self.files().get(&path).cloned();
        found.ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(path)))
    }
}
impl Default for MockBackend {
    fn default() -> Self {
        let files: [(&str, &str); 0] = [];
        Self::with_files(files)
    }
}

/// Buffers writes and commits them to the shared map on `flush()`.
struct MockWriter {
    path: PathBuf,
    buffer: Vec<u8>,
    storage: Files,
}
impl Write for MockWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        let mut files = self.storage.write().map_err(|_| std::io::Error::other("mock storage lock poisoned"))?;
        files.insert(self.path.clone(), (UtcDateTime::now(), self.buffer.clone()));
        Ok(())
    }
}

#[async_trait]
impl StorageBackend for MockBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        let path = validate_path(path)?;
        Ok(self.files().contains_key(&path))
    }

    async fn read(&self, path: &Path) -> Result<Vec<u8>> {
        Ok(self.get(path)?.1)
    }

    async fn reader(&self, path: &Path) -> Result<BoxSyncRead> {
        Ok(Box::new(Cursor::new(self.get(path)?.1)))
    }

    async fn write(&self, path: &Path, data: &[u8]) -> Result<()> {
        let path = validate_path(path)?;
        self.files_mut().insert(path, (UtcDateTime::now(), data.to_vec()));
        Ok(())
    }

    async fn writer(&self, path: &Path) -> Result<BoxSyncWrite> {
        let path = validate_path(path)?;
        Ok(Box::new(MockWriter {
            path,
            buffer: Vec::new(),
            storage: Arc::clone(&self.storage),
        }))
    }

    async fn delete(&self, path: &Path) -> Result<()> {
        let path = validate_path(path)?;
        let removed = self.files_mut().remove(&path);
        removed.map(|_| ()).ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(path)))
    }

    async fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        let from = validate_path(from)?;
        let to = validate_path(to)?;
        let mut files = self.files_mut();
        let data = files.remove(&from).ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(from)))?;
        files.insert(to, data);
        Ok(())
    }

    async fn stat(&self, path: &Path) -> Result<FileInfo> {
        let (inserted, data) = self.get(path)?;
        Ok(FileInfo::new(validate_path(path)?, data.len() as u64, inserted))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[tokio::test]
    async fn test_write_and_read() {
        let backend = MockBackend::default();
        backend.write(Path::new("docs/report.pdf"), b"hello").await.unwrap();
        assert_eq!(backend.read(Path::new("docs/report.pdf")).await.unwrap(), b"hello");
    }

    #[tokio::test]
    async fn test_writer_commits_on_flush() {
        let backend = MockBackend::default();
        let mut writer = backend.writer(Path::new("docs/report.pdf")).await.unwrap();
        writer.write_all(b"streamed").unwrap();
        assert!(!backend.exists(Path::new("docs/report.pdf")).await.unwrap());
        writer.flush().unwrap();
        assert_eq!(backend.read(Path::new("docs/report.pdf")).await.unwrap(), b"streamed");
    }

    #[tokio::test]
    async fn test_reader() {
        let backend = MockBackend::with_files([("a.txt", Vec::from(*b"0123456789"))]);
        let mut reader = backend.reader(Path::new("a.txt")).await.unwrap();
        let mut buf = String::new();
        reader.read_to_string(&mut buf).unwrap();
        assert_eq!(buf, "0123456789");
    }

    #[tokio::test]
    async fn test_not_found() {
        let backend = MockBackend::default();
        let err = backend.read(Path::new("missing.txt")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
        let err = backend.delete(Path::new("missing.txt")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[tokio::test]
    async fn test_rename_and_stat() {
        let backend = MockBackend::with_files([("report.pdf.partial", Vec::from(*b"12345"))]);
        backend.rename(Path::new("report.pdf.partial"), Path::new("docs/report.pdf")).await.unwrap();
        assert_eq!(backend.paths(), vec![PathBuf::from("docs/report.pdf")]);
        let info = backend.stat(Path::new("docs/report.pdf")).await.unwrap();
        assert_eq!(info.size, 5);
    }

    #[test]
    #[should_panic(expected = "invalid path")]
    fn test_with_files_panics_on_bad_path() {
        MockBackend::with_files([("../escape", Vec::from(*b"bad"))]);
    }
}
