//! Periodic repair of record state.
//!
//! Pipelines can die with the process, origins come and go, and operators
//! delete or restore files by hand. One [`Reconciler::reconcile`] pass brings
//! every record's status back in line with what storage actually holds. All
//! changes are compare-and-set, so a pass running alongside live pipelines
//! never overwrites their progress.

use crate::error::{ErrorKind, Result};
use crate::fetch::{FetcherHandle, OriginRef};
use exn::ResultExt;
use golink_cache::{FileRecord, Repository, Status};
use golink_storage::BackendHandle;
use std::fmt;
use std::time::Duration;
use time::UtcDateTime;
use tracing::instrument;

/// Failure reason recorded for operations that never finished.
pub const TIMED_OUT: &str = "timed out";

/// What a single pass changed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Report {
    /// In-progress records failed for going stale.
    pub timed_out: u64,
    /// Records that can now be pulled again.
    pub pullable: u64,
    /// Records whose content is gone for good.
    pub unavailable: u64,
    /// Records whose local content reappeared.
    pub restored: u64,
}
impl Report {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} timed out, {} pullable, {} unavailable, {} restored",
            self.timed_out, self.pullable, self.unavailable, self.restored
        )
    }
}

#[derive(Clone)]
pub struct Reconciler {
    records: Repository,
    storage: BackendHandle,
    fetcher: FetcherHandle,
}

impl Reconciler {
    pub fn new(records: Repository, storage: BackendHandle, fetcher: FetcherHandle) -> Self {
        Self { records, storage, fetcher }
    }

    /// Run one pass. Records that move while the pass is looking at them are
    /// skipped and picked up next time.
    #[instrument(name = "reconcile", skip(self))]
    pub async fn reconcile(&self, stale_after: Duration) -> Result<Report> {
        let mut report = Report::default();
        let cutoff = cutoff(stale_after);

        for status in Status::IN_PROGRESS {
            let stale = self.records.list_stale(status, cutoff).await.or_raise(|| ErrorKind::Cache)?;
            for record in stale {
                if self.time_out(&record).await? {
                    report.timed_out += 1;
                }
            }
        }

        let failed = self.records.list_by_status(Status::Failed).await.or_raise(|| ErrorKind::Cache)?;
        for record in failed {
            self.settle(&record, &mut report).await?;
        }

        let available = self.records.list_by_status(Status::Available).await.or_raise(|| ErrorKind::Cache)?;
        for record in available {
            if !self.is_local(&record).await? {
                tracing::warn!(uri = %record.uri, path = %record.path.display(), "Available file missing from storage");
                self.settle(&record, &mut report).await?;
            }
        }

        let unavailable = self.records.list_by_status(Status::Unavailable).await.or_raise(|| ErrorKind::Cache)?;
        for record in unavailable {
            if record.hash.is_some() && self.is_local(&record).await? && self.swap(&record, Status::Available).await? {
                tracing::info!(uri = %record.uri, "Content restored to storage");
                report.restored += 1;
            }
        }

        if report.is_empty() {
            tracing::debug!("Nothing to reconcile");
        } else {
            tracing::info!(%report, "Reconciled records");
        }
        Ok(report)
    }

    async fn time_out(&self, record: &FileRecord) -> Result<bool> {
        // Claim the record before touching its error so a pipeline that
        // finishes in the meantime keeps its result.
        if !self.swap(record, Status::Failed).await? {
            return Ok(false);
        }
        self.records.set_error(&record.uri, TIMED_OUT).await.or_raise(|| ErrorKind::Cache)?;
        tracing::warn!(uri = %record.uri, status = %record.status, since = %record.status_changed_at, "Operation timed out");
        Ok(true)
    }

    /// Move a record without usable local content to `pullable` or
    /// `unavailable`, depending on its origin.
    async fn settle(&self, record: &FileRecord, report: &mut Report) -> Result<()> {
        let next = match self.origin_has_content(record).await {
            Some(true) => Status::Pullable,
            Some(false) => Status::Unavailable,
            // Couldn't tell; leave it alone.
            None => return Ok(()),
        };
        if self.swap(record, next).await? {
            match next {
                Status::Pullable => report.pullable += 1,
                _ => report.unavailable += 1,
            }
        }
        Ok(())
    }

    /// `None` if the origin couldn't be asked.
    async fn origin_has_content(&self, record: &FileRecord) -> Option<bool> {
        let Some(origin) = record.origin.as_deref().filter(|origin| self.fetcher.is_pullable(origin)) else {
            return Some(false);
        };
        let source = OriginRef::new(origin, record.path.clone());
        match self.fetcher.exists(&source).await {
            Ok(exists) => Some(exists),
            Err(err) => {
                tracing::warn!(uri = %record.uri, %source, error = ?err, "Could not check origin");
                None
            },
        }
    }

    async fn is_local(&self, record: &FileRecord) -> Result<bool> {
        self.storage.exists(&record.path).await.or_raise(|| ErrorKind::Storage)
    }

    async fn swap(&self, record: &FileRecord, next: Status) -> Result<bool> {
        self.records
            .compare_and_set_status(&record.uri, record.status, next)
            .await
            .or_raise(|| ErrorKind::Cache)
    }
}

fn cutoff(stale_after: Duration) -> UtcDateTime {
    let seconds = i64::try_from(stale_after.as_secs()).unwrap_or(i64::MAX);
    let cutoff = UtcDateTime::now().unix_timestamp().saturating_sub(seconds);
    UtcDateTime::from_unix_timestamp(cutoff).unwrap_or(UtcDateTime::UNIX_EPOCH)
}
