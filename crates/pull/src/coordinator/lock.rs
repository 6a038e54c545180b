//! Per-path exclusion for pipelines.
//!
//! Versions of the same origin file share one local path, and therefore one
//! `.partial` file. Only one pipeline may fetch, rename and hash a given path
//! at a time; the others queue behind it.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type Slots = Arc<Mutex<HashMap<PathBuf, Arc<AsyncMutex<()>>>>>;

#[derive(Clone, Debug, Default)]
pub(crate) struct PathLocks {
    slots: Slots,
}

impl PathLocks {
    /// Wait until nothing else holds `path`.
    pub(crate) async fn lock(&self, path: &Path) -> PathGuard {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            slots.entry(path.to_path_buf()).or_default().clone()
        };
        let guard = slot.lock_owned().await;
        PathGuard { slots: self.slots.clone(), path: path.to_path_buf(), guard: Some(guard) }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

/// Releases the path on drop, forgetting it once nobody is waiting.
#[derive(Debug)]
pub(crate) struct PathGuard {
    slots: Slots,
    path: PathBuf,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for PathGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        // Waiters hold their own clone of the slot.
        if slots.get(&self.path).is_some_and(|slot| Arc::strong_count(slot) == 1) {
            slots.remove(&self.path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_path_is_exclusive() {
        let locks = PathLocks::default();
        let first = locks.lock(Path::new("docs/report.pdf")).await;
        let waiting = tokio::spawn({
            let locks = locks.clone();
            async move { locks.lock(Path::new("docs/report.pdf")).await }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiting.is_finished());
        drop(first);
        let second = tokio::time::timeout(Duration::from_secs(5), waiting).await.unwrap().unwrap();
        assert_eq!(locks.len(), 1);
        drop(second);
        assert_eq!(locks.len(), 0);
    }

    #[tokio::test]
    async fn test_different_paths_do_not_block() {
        let locks = PathLocks::default();
        let _report = locks.lock(Path::new("docs/report.pdf")).await;
        let set = tokio::time::timeout(Duration::from_secs(5), locks.lock(Path::new("data/set.csv"))).await;
        assert!(set.is_ok());
        assert_eq!(locks.len(), 2);
    }
}
