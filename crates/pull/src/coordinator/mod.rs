//! Pull and publish coordination.
//!
//! [`PullCoordinator`] is the only thing that starts pipelines. It checks a
//! request synchronously, claims the record with a compare-and-set on its
//! status, then hands the rest of the work to a spawned task. Losing the
//! compare-and-set means somebody else already owns the record, which is how
//! concurrent requests for the same file collapse into one fetch. Versions of
//! one origin file share a local path, so their pipelines run one at a time.

mod lock;
mod pipeline;

use self::lock::PathLocks;
use self::pipeline::Pipeline;
use crate::email;
use crate::error::{ErrorKind, Result};
use crate::fetch::{FetcherHandle, OriginRef};
use crate::notify::NotifierHandle;
use exn::ResultExt;
use golink_cache::error::ErrorKind as CacheErrorKind;
use golink_cache::{FileRecord, NewRecord, Repository, Status};
use golink_storage::error::ErrorKind as StorageErrorKind;
use golink_storage::{BackendHandle, validate_path};
use tokio::task::JoinHandle;
use tracing::Instrument;

/// Registration of a new file taken from an origin.
#[derive(Clone, Debug, Default)]
pub struct PublishRequest {
    pub origin: String,
    pub path: String,
    pub owner: String,
    pub contact: Option<String>,
    pub email: Option<String>,
}

/// Handle to an accepted pull or publish.
///
/// Dropping the ticket detaches from the pipeline; it keeps running.
#[derive(Debug)]
pub struct PullTicket {
    uri: String,
    handle: JoinHandle<Status>,
}
impl PullTicket {
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Wait for the pipeline and return the status it left the record in.
    pub async fn wait(self) -> Result<Status> {
        self.handle.await.or_raise(|| ErrorKind::Aborted)
    }
}

#[derive(Clone)]
pub struct PullCoordinator {
    records: Repository,
    storage: BackendHandle,
    fetcher: FetcherHandle,
    notifier: NotifierHandle,
    locks: PathLocks,
}

impl PullCoordinator {
    pub fn new(records: Repository, storage: BackendHandle, fetcher: FetcherHandle, notifier: NotifierHandle) -> Self {
        Self { records, storage, fetcher, notifier, locks: PathLocks::default() }
    }

    pub fn records(&self) -> &Repository {
        &self.records
    }

    pub fn storage(&self) -> &BackendHandle {
        &self.storage
    }

    /// Start bringing a `pullable` file back into local storage.
    ///
    /// # Errors
    /// - [`NotFound`](ErrorKind::NotFound) for an unknown `uri`.
    /// - [`AlreadyInProgress`](ErrorKind::AlreadyInProgress) if another
    ///   operation owns the record, including one that won the race between
    ///   the status check and the claim.
    /// - [`InvalidState`](ErrorKind::InvalidState) for any other status.
    /// - [`InvalidRequest`](ErrorKind::InvalidRequest) for a malformed
    ///   `email` or an origin that doesn't allow pulls.
    ///
    /// None of these mutate the record.
    pub async fn request_pull(&self, uri: &str, email: Option<&str>) -> Result<PullTicket> {
        let record = self.get(uri).await?;
        let email = email::normalize(email)?;
        match record.status {
            Status::Pullable => {},
            status if status.is_in_progress() => exn::bail!(ErrorKind::AlreadyInProgress(record.uri)),
            status => exn::bail!(ErrorKind::InvalidState(record.uri, status)),
        }
        if !record.origin.as_deref().is_some_and(|origin| self.fetcher.is_pullable(origin)) {
            exn::bail!(ErrorKind::InvalidRequest(format!("{} is not managed by a pullable origin", record.uri)));
        }
        let claimed = self
            .records
            .compare_and_set_status(&record.uri, Status::Pullable, Status::Pulling)
            .await
            .or_raise(|| ErrorKind::Cache)?;
        if !claimed {
            exn::bail!(ErrorKind::AlreadyInProgress(record.uri));
        }
        tracing::info!(uri = %record.uri, notify = email.is_some(), "Pull accepted");
        Ok(self.spawn(record, email, Status::Pulling))
    }

    /// Register a file that exists at `request.origin` and start making it
    /// available locally. The new record's uri is a random UUID.
    pub async fn publish(&self, request: PublishRequest) -> Result<PullTicket> {
        let email = email::normalize(request.email.as_deref())?;
        let contact = email::normalize(request.contact.as_deref())?;
        if request.owner.trim().is_empty() {
            exn::bail!(ErrorKind::InvalidRequest("missing owner".to_string()));
        }
        if !self.fetcher.has_origin(&request.origin) {
            exn::bail!(ErrorKind::InvalidRequest(format!("unknown origin: {}", request.origin)));
        }
        let Ok(path) = validate_path(&request.path) else {
            exn::bail!(ErrorKind::InvalidRequest(format!("invalid path: {}", request.path)));
        };
        let source = OriginRef::new(request.origin.as_str(), path);
        let info = match self.fetcher.stat(&source).await {
            Ok(info) => info,
            Err(err) if matches!(&*err, StorageErrorKind::NotFound(_)) => {
                exn::bail!(ErrorKind::InvalidRequest(format!("file not found at path {}", request.path)))
            },
            Err(err) => return Err(err).or_raise(|| ErrorKind::Fetch),
        };
        let Some(file_name) = info.file_name().map(str::to_string) else {
            exn::bail!(ErrorKind::InvalidRequest(format!("invalid path: {}", request.path)));
        };
        let new = NewRecord {
            uri: uuid::Uuid::new_v4().to_string(),
            file_name,
            path: source.path,
            origin: Some(source.origin),
            owner: request.owner,
            contact,
            size: info.size,
            status: Status::Starting,
        };
        let record = match self.records.insert(&new).await {
            Ok(record) => record,
            Err(err) if matches!(&*err, CacheErrorKind::Duplicate(_)) => {
                exn::bail!(ErrorKind::AlreadyInProgress(new.uri))
            },
            Err(err) => return Err(err).or_raise(|| ErrorKind::Cache),
        };
        tracing::info!(uri = %record.uri, origin = ?record.origin, path = %record.path.display(), "File registered");
        Ok(self.spawn(record, email, Status::Starting))
    }

    async fn get(&self, uri: &str) -> Result<FileRecord> {
        match self.records.get(uri).await.or_raise(|| ErrorKind::Cache)? {
            Some(record) => Ok(record),
            None => exn::bail!(ErrorKind::NotFound(uri.to_string())),
        }
    }

    fn spawn(&self, record: FileRecord, email: Option<String>, state: Status) -> PullTicket {
        let uri = record.uri.clone();
        let span = tracing::info_span!("pipeline", uri = %uri, entered = %state);
        let pipeline = Pipeline {
            records: self.records.clone(),
            storage: self.storage.clone(),
            fetcher: self.fetcher.clone(),
            notifier: self.notifier.clone(),
            locks: self.locks.clone(),
            record,
            email,
            state,
        };
        let handle = tokio::spawn(pipeline.run().instrument(span));
        PullTicket { uri, handle }
    }
}
