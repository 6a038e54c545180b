//! Fetching content from origins.
//!
//! An origin is a named storage backend that content was originally published
//! from. Pullable origins may also be used to bring content back after it has
//! disappeared from local storage.

use async_trait::async_trait;
use golink_storage::backend::{BoxSyncRead, ReadOnlyBackend};
use golink_storage::error::{ErrorKind as StorageErrorKind, Result as StorageResult};
use golink_storage::file::FileInfo;
use golink_storage::{BackendHandle, StorageBackend};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Where a record's content lives at its origin.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OriginRef {
    pub origin: String,
    pub path: PathBuf,
}
impl OriginRef {
    pub fn new(origin: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self { origin: origin.into(), path: path.into() }
    }
}
impl fmt::Display for OriginRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.origin, self.path.display())
    }
}

/// Source of content for the pull pipeline.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Whether `origin` is configured at all.
    fn has_origin(&self, origin: &str) -> bool;

    /// Whether content may be pulled back from `origin` on request.
    fn is_pullable(&self, origin: &str) -> bool;

    /// Open the content for streaming reads.
    async fn fetch(&self, source: &OriginRef) -> StorageResult<BoxSyncRead>;

    async fn exists(&self, source: &OriginRef) -> StorageResult<bool>;

    async fn stat(&self, source: &OriginRef) -> StorageResult<FileInfo>;
}

pub type FetcherHandle = Arc<dyn Fetcher>;

struct Origin {
    backend: BackendHandle,
    pullable: bool,
}

/// [`Fetcher`] over named storage backends.
///
/// Every backend is wrapped in a [`ReadOnlyBackend`] on registration.
#[derive(Default)]
pub struct OriginFetcher {
    origins: BTreeMap<String, Origin>,
}
impl OriginFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `backend` under its own [`name`](StorageBackend::name).
    pub fn with_origin(mut self, backend: BackendHandle, pullable: bool) -> Self {
        let name = backend.name().to_string();
        tracing::debug!(origin = %name, pullable, "Registered origin");
        let backend: BackendHandle = Arc::new(ReadOnlyBackend::new(backend));
        self.origins.insert(name, Origin { backend, pullable });
        self
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.origins.keys().map(String::as_str)
    }

    fn backend(&self, origin: &str) -> StorageResult<&BackendHandle> {
        match self.origins.get(origin) {
            Some(found) => Ok(&found.backend),
            None => exn::bail!(StorageErrorKind::BackendError(format!("unknown origin: {origin}"))),
        }
    }
}

#[async_trait]
impl Fetcher for OriginFetcher {
    fn has_origin(&self, origin: &str) -> bool {
        self.origins.contains_key(origin)
    }

    fn is_pullable(&self, origin: &str) -> bool {
        self.origins.get(origin).is_some_and(|found| found.pullable)
    }

    async fn fetch(&self, source: &OriginRef) -> StorageResult<BoxSyncRead> {
        tracing::debug!(origin = %source.origin, path = %source.path.display(), "Fetching from origin");
        self.backend(&source.origin)?.reader(&source.path).await
    }

    async fn exists(&self, source: &OriginRef) -> StorageResult<bool> {
        self.backend(&source.origin)?.exists(&source.path).await
    }

    async fn stat(&self, source: &OriginRef) -> StorageResult<FileInfo> {
        self.backend(&source.origin)?.stat(&source.path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use golink_storage::backend::MockBackend;
    use std::io::Read;

    fn fetcher() -> OriginFetcher {
        let archive = MockBackend::with_files([("docs/report.pdf", b"%PDF-1.7".as_slice())]).with_name("archive");
        let scratch = MockBackend::with_files([("notes.txt", b"notes".as_slice())]).with_name("scratch");
        OriginFetcher::new().with_origin(Arc::new(archive), true).with_origin(Arc::new(scratch), false)
    }

    #[test]
    fn test_origin_flags() {
        let fetcher = fetcher();
        assert!(fetcher.has_origin("archive"));
        assert!(fetcher.has_origin("scratch"));
        assert!(!fetcher.has_origin("elsewhere"));
        assert!(fetcher.is_pullable("archive"));
        assert!(!fetcher.is_pullable("scratch"));
        assert!(!fetcher.is_pullable("elsewhere"));
        assert_eq!(fetcher.names().collect::<Vec<_>>(), vec!["archive", "scratch"]);
    }

    #[tokio::test]
    async fn test_fetch() {
        let fetcher = fetcher();
        let source = OriginRef::new("archive", "docs/report.pdf");
        assert!(fetcher.exists(&source).await.unwrap());
        assert_eq!(fetcher.stat(&source).await.unwrap().size, 8);
        let mut reader = fetcher.fetch(&source).await.unwrap();
        let mut contents = Vec::new();
        reader.read_to_end(&mut contents).unwrap();
        assert_eq!(contents, b"%PDF-1.7");
    }

    #[tokio::test]
    async fn test_missing_content() {
        let fetcher = fetcher();
        let source = OriginRef::new("archive", "docs/missing.pdf");
        assert!(!fetcher.exists(&source).await.unwrap());
        let err = fetcher.fetch(&source).await.err().unwrap();
        assert!(matches!(&*err, StorageErrorKind::NotFound(_)));
    }

    #[tokio::test]
    async fn test_unknown_origin() {
        let fetcher = fetcher();
        let err = fetcher.exists(&OriginRef::new("elsewhere", "a.txt")).await.unwrap_err();
        assert!(matches!(&*err, StorageErrorKind::BackendError(_)));
    }

    #[test]
    fn test_display() {
        assert_eq!(OriginRef::new("archive", "docs/report.pdf").to_string(), "archive:docs/report.pdf");
    }
}
