use crate::error::{Error, ErrorKind};
use crate::models::Status;
use exn::ResultExt;
use std::path::PathBuf;
use time::UtcDateTime;

/// A published file and its current lifecycle state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileRecord {
    pub uri: String,
    pub file_name: String,
    /// Relative path, identical at the origin and in local storage.
    pub path: PathBuf,
    /// Name of the configured origin the content can be fetched from.
    pub origin: Option<String>,
    pub owner: String,
    pub contact: Option<String>,
    pub size: u64,
    /// Hex BLAKE3 digest, only present once content has been verified.
    pub hash: Option<String>,
    pub status: Status,
    /// Reason for the most recent failure.
    pub error: Option<String>,
    pub version: u32,
    pub downloads: u64,
    /// Set on the first transition to `available` and never again.
    pub publishing_date: Option<UtcDateTime>,
    pub created_at: UtcDateTime,
    pub status_changed_at: UtcDateTime,
}

/// Everything needed to register a new record.
#[derive(Clone, Debug)]
pub struct NewRecord {
    pub uri: String,
    pub file_name: String,
    pub path: PathBuf,
    pub origin: Option<String>,
    pub owner: String,
    pub contact: Option<String>,
    pub size: u64,
    pub status: Status,
}

/// Another version of the same origin path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Sibling {
    pub uri: String,
    pub version: u32,
    pub status: Status,
}

#[derive(sqlx::FromRow)]
pub(crate) struct FileRow {
    pub(crate) uri: String,
    pub(crate) file_name: String,
    pub(crate) path: String,
    pub(crate) origin: Option<String>,
    pub(crate) owner: String,
    pub(crate) contact: Option<String>,
    pub(crate) size: i64,
    pub(crate) hash: Option<String>,
    pub(crate) status: String,
    pub(crate) error: Option<String>,
    pub(crate) version: i64,
    pub(crate) downloads: i64,
    pub(crate) publishing_date: Option<i64>,
    pub(crate) created_at: i64,
    pub(crate) status_changed_at: i64,
}

#[derive(sqlx::FromRow)]
pub(crate) struct SiblingRow {
    uri: String,
    version: i64,
    status: String,
}

fn timestamp(value: i64, what: &'static str) -> Result<UtcDateTime, Error> {
    UtcDateTime::from_unix_timestamp(value).or_raise(|| ErrorKind::InvalidData(what))
}

impl TryFrom<FileRow> for FileRecord {
    type Error = Error;
    fn try_from(row: FileRow) -> Result<Self, Self::Error> {
        Ok(Self {
            uri: row.uri,
            file_name: row.file_name,
            path: PathBuf::from(row.path),
            origin: row.origin,
            owner: row.owner,
            contact: row.contact,
            size: u64::try_from(row.size).or_raise(|| ErrorKind::InvalidData("file size"))?,
            hash: row.hash,
            status: row.status.parse()?,
            error: row.error,
            version: u32::try_from(row.version).or_raise(|| ErrorKind::InvalidData("version"))?,
            downloads: u64::try_from(row.downloads).or_raise(|| ErrorKind::InvalidData("downloads"))?,
            publishing_date: row.publishing_date.map(|t| timestamp(t, "publishing date")).transpose()?,
            created_at: timestamp(row.created_at, "creation date")?,
            status_changed_at: timestamp(row.status_changed_at, "status change date")?,
        })
    }
}

impl TryFrom<SiblingRow> for Sibling {
    type Error = Error;
    fn try_from(row: SiblingRow) -> Result<Self, Self::Error> {
        Ok(Self {
            uri: row.uri,
            version: u32::try_from(row.version).or_raise(|| ErrorKind::InvalidData("version"))?,
            status: row.status.parse()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> FileRow {
        FileRow {
            uri: "docs/report.pdf".to_string(),
            file_name: "report.pdf".to_string(),
            path: "docs/report.pdf".to_string(),
            origin: Some("archive".to_string()),
            owner: "root".to_string(),
            contact: None,
            size: 1024,
            hash: Some("af1349b9f5f9a1a6a0404dea36dcc9499bcb25c9adc112b7cc9a93cae41f3262".to_string()),
            status: "available".to_string(),
            error: None,
            version: 1,
            downloads: 3,
            publishing_date: Some(1_700_000_000),
            created_at: 1_699_999_000,
            status_changed_at: 1_700_000_000,
        }
    }

    #[test]
    fn test_row_to_model() {
        let record = FileRecord::try_from(row()).unwrap();
        assert_eq!(record.status, Status::Available);
        assert_eq!(record.path, PathBuf::from("docs/report.pdf"));
        assert_eq!(record.publishing_date.unwrap().unix_timestamp(), 1_700_000_000);
    }

    #[test]
    fn test_row_with_unknown_status() {
        let row = FileRow { status: "unpublished".to_string(), ..row() };
        let err = FileRecord::try_from(row).unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidData("status")));
    }

    #[test]
    fn test_row_with_negative_size() {
        let row = FileRow { size: -1, ..row() };
        assert!(FileRecord::try_from(row).is_err());
    }
}
