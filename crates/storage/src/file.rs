//! File metadata reported by storage backends.

use std::path::PathBuf;
use time::UtcDateTime;

/// File metadata returned by storage backends.
///
/// Paths are always relative to the backend root, so the same `FileInfo` can
/// describe a file at an origin and its copy in local storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    /// Relative path from storage root
    pub path: PathBuf,
    /// File size in bytes
    pub size: u64,
    /// Last modified timestamp
    pub modified: UtcDateTime,
}
impl FileInfo {
    pub fn new(path: impl Into<PathBuf>, size: u64, modified: UtcDateTime) -> Self {
        Self { path: path.into(), size, modified }
    }

    /// Final component of the path, used as the user-facing file name.
    pub fn file_name(&self) -> Option<&str> {
        self.path.file_name().and_then(|name| name.to_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_name() {
        let info = FileInfo::new("docs/2024/report.pdf", 12, UtcDateTime::now());
        assert_eq!(info.file_name(), Some("report.pdf"));
    }
}
