//! Repository for file records.
//!
//! Reads return fully converted [`FileRecord`]s. Writes that touch `status`
//! are all conditional on the status the caller expects to see, so two
//! callers racing for the same transition can never both win.

use crate::Database;
use crate::error::{ErrorKind, Result};
use crate::models::{FileRecord, FileRow, NewRecord, Sibling, SiblingRow, Status};
use exn::{OptionExt, ResultExt};
use sqlx::SqlitePool;
use std::path::Path;
use time::UtcDateTime;

/// One page of a listing plus the total number of matching records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub records: Vec<FileRecord>,
    pub total: u64,
}

/// Repository for managing file records in the database.
#[derive(Debug, Clone)]
pub struct Repository {
    pool: SqlitePool,
}
impl From<&Database> for Repository {
    fn from(db: &Database) -> Self {
        Self { pool: db.pool().clone() }
    }
}
impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn sqlx_hates_paths(path: &Path) -> Result<&str> {
        path.to_str().ok_or_raise(|| ErrorKind::InvalidData("path"))
    }

    fn now() -> i64 {
        UtcDateTime::now().unix_timestamp()
    }

    fn int(value: u64, what: &'static str) -> Result<i64> {
        i64::try_from(value).or_raise(|| ErrorKind::InvalidData(what))
    }

    fn convert(rows: Vec<FileRow>) -> Result<Vec<FileRecord>> {
        rows.into_iter().map(FileRecord::try_from).collect()
    }

    // =========================================================================
    // Insert
    // =========================================================================

    /// Register a new file record.
    ///
    /// The record's `version` is one more than the highest version already
    /// registered for the same origin and path. Fails with
    /// [`ErrorKind::Duplicate`] if the uri is taken.
    pub async fn insert(&self, record: &NewRecord) -> Result<FileRecord> {
        if record.uri.is_empty() || record.uri.contains('\0') {
            exn::bail!(ErrorKind::InvalidData("uri"));
        }
        let result: sqlx::Result<FileRow> = sqlx::query_as(include_str!("../queries/insert_file.sql"))
            .bind(&record.uri)
            .bind(&record.file_name)
            .bind(Self::sqlx_hates_paths(&record.path)?)
            .bind(&record.origin)
            .bind(&record.owner)
            .bind(&record.contact)
            .bind(Self::int(record.size, "file size")?)
            .bind(record.status.as_str())
            .bind(Self::now())
            .fetch_one(&self.pool)
            .await;
        let row = match result {
            Ok(row) => row,
            Err(sqlx::Error::Database(ref err)) if err.is_unique_violation() => {
                exn::bail!(ErrorKind::Duplicate(record.uri.clone()))
            },
            Err(err) => return Err(err).or_raise(|| ErrorKind::Database),
        };
        tracing::debug!(uri = %record.uri, status = %record.status, "Registered file record");
        row.try_into()
    }

    // =========================================================================
    // Get/Fetch
    // =========================================================================

    pub async fn get(&self, uri: &str) -> Result<Option<FileRecord>> {
        let row: Option<FileRow> = sqlx::query_as(include_str!("../queries/get_by_uri.sql"))
            .bind(uri)
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        row.map(FileRecord::try_from).transpose()
    }

    /// Other versions of the same origin path, oldest first.
    pub async fn siblings(&self, uri: &str) -> Result<Vec<Sibling>> {
        let rows: Vec<SiblingRow> = sqlx::query_as(include_str!("../queries/list_siblings.sql"))
            .bind(uri)
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        rows.into_iter().map(Sibling::try_from).collect()
    }

    // =========================================================================
    // Listing
    // =========================================================================

    /// Most recently published first; never-published records sort last.
    pub async fn list(&self, offset: u64, limit: u64) -> Result<Page> {
        let rows: Vec<FileRow> = sqlx::query_as(include_str!("../queries/list_files.sql"))
            .bind(Self::int(limit, "limit")?)
            .bind(Self::int(offset, "offset")?)
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        let total: i64 = sqlx::query_scalar(include_str!("../queries/count_files.sql"))
            .fetch_one(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(Page {
            records: Self::convert(rows)?,
            total: u64::try_from(total).or_raise(|| ErrorKind::InvalidData("total"))?,
        })
    }

    /// Records whose uri equals `term` or whose file name contains it
    /// (case-insensitive), in listing order.
    pub async fn search(&self, term: &str, offset: u64, limit: u64) -> Result<Page> {
        let rows: Vec<FileRow> = sqlx::query_as(include_str!("../queries/search_files.sql"))
            .bind(term)
            .bind(Self::int(limit, "limit")?)
            .bind(Self::int(offset, "offset")?)
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        let total: i64 = sqlx::query_scalar(include_str!("../queries/count_search.sql"))
            .bind(term)
            .fetch_one(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(Page {
            records: Self::convert(rows)?,
            total: u64::try_from(total).or_raise(|| ErrorKind::InvalidData("total"))?,
        })
    }

    pub async fn list_by_status(&self, status: Status) -> Result<Vec<FileRecord>> {
        let rows: Vec<FileRow> = sqlx::query_as(include_str!("../queries/list_by_status.sql"))
            .bind(status.as_str())
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Self::convert(rows)
    }

    /// Records that entered `status` at or before `cutoff`.
    pub async fn list_stale(&self, status: Status, cutoff: UtcDateTime) -> Result<Vec<FileRecord>> {
        let rows: Vec<FileRow> = sqlx::query_as(include_str!("../queries/list_stale.sql"))
            .bind(status.as_str())
            .bind(cutoff.unix_timestamp())
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Self::convert(rows)
    }

    // =========================================================================
    // Update
    // =========================================================================

    /// Atomically move `uri` from `expected` to `next`.
    ///
    /// Returns `false` (and changes nothing) if the record doesn't exist or
    /// its status isn't `expected`. Entering an in-progress state clears the
    /// previous error.
    pub async fn compare_and_set_status(&self, uri: &str, expected: Status, next: Status) -> Result<bool> {
        let result = sqlx::query(include_str!("../queries/compare_and_set_status.sql"))
            .bind(next.as_str())
            .bind(Self::now())
            .bind(uri)
            .bind(expected.as_str())
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        let swapped = result.rows_affected() == 1;
        tracing::debug!(uri, %expected, %next, swapped, "Compare-and-set status");
        Ok(swapped)
    }

    /// Atomically record a verified digest and move `uri` from `expected` to
    /// [`Status::Available`], stamping the publishing date if it was unset.
    pub async fn mark_available(&self, uri: &str, expected: Status, hash: &str, size: u64) -> Result<bool> {
        let result = sqlx::query(include_str!("../queries/mark_available.sql"))
            .bind(hash)
            .bind(Self::int(size, "file size")?)
            .bind(Self::now())
            .bind(uri)
            .bind(expected.as_str())
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn set_hash(&self, uri: &str, hash: &str) -> Result<()> {
        sqlx::query(include_str!("../queries/set_hash.sql"))
            .bind(hash)
            .bind(uri)
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(())
    }

    pub async fn set_error(&self, uri: &str, reason: &str) -> Result<()> {
        sqlx::query(include_str!("../queries/set_error.sql"))
            .bind(reason)
            .bind(uri)
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(())
    }

    pub async fn increment_downloads(&self, uri: &str) -> Result<()> {
        sqlx::query(include_str!("../queries/increment_downloads.sql"))
            .bind(uri)
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(())
    }
}
