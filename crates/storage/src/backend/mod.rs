//! Storage backend trait and implementations.
//!
//! The same trait describes both the durable local store that downloads are
//! served from and the origins that content is pulled from. Origins are
//! wrapped in [`ReadOnlyBackend`] so that nothing in the pull pipeline can
//! modify them.

mod local;
#[cfg(feature = "mock")]
mod mock;
mod ro;

pub use self::local::LocalBackend;
#[cfg(feature = "mock")]
pub use self::mock::MockBackend;
pub use self::ro::ReadOnlyBackend;
use crate::error::Result;
use crate::file::FileInfo;
use async_trait::async_trait;
use std::io::{Read, Write};
use std::path::Path;

pub type BoxSyncRead = Box<dyn Read + Send + 'static>;
pub type BoxSyncWrite = Box<dyn Write + Send + 'static>;

/// Unified interface for storage backends.
///
/// All operations are asynchronous; streaming access hands out `'static`
/// sync readers and writers intended to be driven from
/// [`spawn_blocking`](tokio::task::spawn_blocking), so hashing and copying
/// never hold whole files in memory.
///
/// # Path Handling
/// All paths are relative to the storage root and must be validated using
/// [`validate_path`](crate::validate_path) before use. Implementations
/// enforce this validation.
///
/// # Examples
///
/// ```no_run
/// use std::path::Path;
/// use golink_storage::{backend::StorageBackend, error::Result};
///
/// async fn size_of(backend: &dyn StorageBackend) -> Result<u64> {
///     let path = Path::new("docs/report.pdf");
///     if backend.exists(path).await? {
///         Ok(backend.stat(path).await?.size)
///     } else {
///         Ok(0)
///     }
/// }
/// ```
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Name of the configured backend (name taken from the configuration
    /// object key). Used for logging and for addressing origins.
    fn name(&self) -> &str;

    /// Check if a file exists.
    async fn exists(&self, path: &Path) -> Result<bool>;

    /// Read file contents.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the file
    /// does not exist. Prefer [`reader()`](Self::reader) for anything that
    /// isn't known to be small.
    async fn read(&self, path: &Path) -> Result<Vec<u8>>;

    /// Open a file for streaming reads.
    ///
    /// The async setup (opening the file) happens before returning.
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the file
    /// does not exist.
    ///
    /// ```no_run
    /// use std::path::Path;
    /// # use golink_storage::backend::StorageBackend;
    /// # async fn example(backend: &dyn StorageBackend) -> Result<(), Box<dyn std::error::Error>> {
    /// let mut reader = backend.reader(Path::new("docs/report.pdf")).await?;
    /// let copied = tokio::task::spawn_blocking(move || {
    ///     std::io::copy(&mut reader, &mut std::io::sink())
    /// }).await.unwrap()?;
    /// # Ok(())
    /// # }
    /// ```
    async fn reader(&self, path: &Path) -> Result<BoxSyncRead>;

    /// Write file contents, creating parent directories as needed.
    async fn write(&self, path: &Path, data: &[u8]) -> Result<()>;

    /// Open a file for streaming writes.
    ///
    /// # Notes
    /// - Implementations create parent directories as needed.
    /// - Callers must call `flush()` before dropping; some backends only
    ///   commit data on `flush()`.
    async fn writer(&self, path: &Path) -> Result<BoxSyncWrite>;

    /// Delete a file.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the file
    /// does not exist.
    async fn delete(&self, path: &Path) -> Result<()>;

    /// Rename/move a file within the same backend, overwriting the
    /// destination if it exists.
    async fn rename(&self, from: &Path, to: &Path) -> Result<()>;

    /// Get file metadata without reading contents.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the file
    /// does not exist.
    async fn stat(&self, path: &Path) -> Result<FileInfo>;
}
