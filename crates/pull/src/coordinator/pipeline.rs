use super::lock::PathLocks;
use crate::error::{Error, ErrorKind, Result};
use crate::fetch::{FetcherHandle, OriginRef};
use crate::hash::{self, Digest};
use crate::notify::{NotifierHandle, Outcome};
use exn::ResultExt;
use golink_cache::{FileRecord, Repository, Status};
use golink_storage::{BackendHandle, partial_path};
use std::io::{self, Write};

/// Everything a spawned pull or publish needs, owned so it can outlive the
/// request that started it.
pub(crate) struct Pipeline {
    pub(crate) records: Repository,
    pub(crate) storage: BackendHandle,
    pub(crate) fetcher: FetcherHandle,
    pub(crate) notifier: NotifierHandle,
    pub(crate) locks: PathLocks,
    pub(crate) record: FileRecord,
    pub(crate) email: Option<String>,
    /// The in-progress status this pipeline currently owns.
    pub(crate) state: Status,
}

impl Pipeline {
    /// Drive the record to a terminal status and notify the requester.
    pub(crate) async fn run(mut self) -> Status {
        let outcome = match self.process().await {
            Ok(digest) => {
                tracing::info!(hash = %digest.hex, size = digest.size, "Content available");
                Outcome::Available {
                    uri: self.record.uri.clone(),
                    file_name: self.record.file_name.clone(),
                    hash: digest.hex,
                }
            },
            Err(err) => {
                tracing::warn!(error = ?err, "Pipeline failed");
                let reason = (*err).to_string();
                self.fail(&err).await;
                Outcome::Failed {
                    uri: self.record.uri.clone(),
                    file_name: self.record.file_name.clone(),
                    reason,
                }
            },
        };
        if let Some(address) = &self.email
            && let Err(err) = self.notifier.notify(address, &outcome).await
        {
            tracing::warn!(error = ?err, "Notification failed");
        }
        self.final_status(&outcome).await
    }

    async fn process(&mut self) -> Result<Digest> {
        // Held until the hash is recorded, so the stored digest always
        // describes the bytes this pipeline wrote.
        let _guard = self.locks.lock(&self.record.path).await;
        self.ensure_local().await?;
        self.transition(Status::Hashing).await?;
        let digest = hash::hash_stored(&self.storage, &self.record.path).await?;
        let marked = self
            .records
            .mark_available(&self.record.uri, self.state, &digest.hex, digest.size)
            .await
            .or_raise(|| ErrorKind::Cache)?;
        if !marked {
            exn::bail!(ErrorKind::Superseded(self.record.uri.clone()));
        }
        self.state = Status::Available;
        Ok(digest)
    }

    /// Make sure the record's content is in local storage.
    ///
    /// Publishing may find the content already in place (the origin and local
    /// storage can be the same directory); pulling always fetches.
    async fn ensure_local(&self) -> Result<()> {
        let path = &self.record.path;
        if self.state == Status::Starting
            && self.storage.exists(path).await.or_raise(|| ErrorKind::Storage)?
        {
            tracing::debug!("Content already in local storage");
            return Ok(());
        }
        let Some(origin) = &self.record.origin else {
            exn::bail!(ErrorKind::InvalidRequest("file has no origin".to_string()));
        };
        let source = OriginRef::new(origin.as_str(), path.clone());
        let mut reader = self.fetcher.fetch(&source).await.or_raise(|| ErrorKind::Fetch)?;
        let partial = partial_path(path);
        let mut writer = self.storage.writer(&partial).await.or_raise(|| ErrorKind::Storage)?;
        let copied = tokio::task::spawn_blocking(move || -> io::Result<u64> {
            let copied = io::copy(&mut reader, &mut writer)?;
            writer.flush()?;
            Ok(copied)
        })
        .await
        .or_raise(|| ErrorKind::Fetch)?;
        let copied = match copied {
            Ok(copied) => copied,
            Err(err) => {
                // Best effort, the next attempt overwrites it anyway.
                _ = self.storage.delete(&partial).await;
                return Err(err).or_raise(|| ErrorKind::Fetch);
            },
        };
        self.storage.rename(&partial, path).await.or_raise(|| ErrorKind::Storage)?;
        tracing::debug!(origin = %source.origin, bytes = copied, "Fetched content into local storage");
        Ok(())
    }

    async fn transition(&mut self, next: Status) -> Result<()> {
        let swapped = self
            .records
            .compare_and_set_status(&self.record.uri, self.state, next)
            .await
            .or_raise(|| ErrorKind::Cache)?;
        if !swapped {
            exn::bail!(ErrorKind::Superseded(self.record.uri.clone()));
        }
        self.state = next;
        Ok(())
    }

    /// Record the failure and give up ownership of the record.
    ///
    /// If something else already took the record over there is nothing left
    /// to undo.
    async fn fail(&mut self, err: &Error) {
        if matches!(&**err, ErrorKind::Superseded(_)) {
            return;
        }
        let uri = &self.record.uri;
        if let Err(err) = self.records.set_error(uri, &(**err).to_string()).await {
            tracing::error!(error = ?err, "Could not record failure reason");
        }
        match self.records.compare_and_set_status(uri, self.state, Status::Failed).await {
            Ok(true) => self.state = Status::Failed,
            Ok(false) => tracing::warn!(expected = %self.state, "Record changed before it could be marked failed"),
            Err(err) => tracing::error!(error = ?err, "Could not mark record failed"),
        }
    }

    async fn final_status(&self, outcome: &Outcome) -> Status {
        if matches!(self.state, Status::Available | Status::Failed) {
            return self.state;
        }
        // Superseded: report whatever the record ended up as.
        match self.records.get(&self.record.uri).await {
            Ok(Some(record)) => record.status,
            _ if outcome.is_success() => Status::Available,
            _ => Status::Failed,
        }
    }
}
