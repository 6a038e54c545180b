//! Browsing published files.

use crate::api::AppState;
use crate::api::error::{ApiError, internal};
use crate::api::format_date;
use axum::Json;
use axum::extract::{Query, State};
use golink_cache::{FileRecord, Page, Status};
use serde::{Deserialize, Serialize};

const DEFAULT_LIMIT: u64 = 10;

/// Raw paging parameters. Kept as strings so that garbage degrades to zero
/// instead of rejecting the request.
#[derive(Debug, Default, Deserialize)]
pub struct Paging {
    offset: Option<String>,
    limit: Option<String>,
}
impl Paging {
    fn offset(&self) -> u64 {
        self.offset.as_deref().map_or(0, lenient)
    }

    fn limit(&self) -> u64 {
        self.limit.as_deref().map_or(DEFAULT_LIMIT, lenient)
    }
}

fn lenient(value: &str) -> u64 {
    value.trim().parse().unwrap_or(0)
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    file: Option<String>,
    #[serde(flatten)]
    paging: Paging,
}

#[derive(Debug, Serialize)]
pub struct FileSummary {
    pub uri: String,
    pub file_name: String,
    pub size: u64,
    pub status: Status,
    pub downloads: u64,
    pub publishing_date: Option<String>,
}
impl From<FileRecord> for FileSummary {
    fn from(record: FileRecord) -> Self {
        Self {
            publishing_date: record.publishing_date.as_ref().and_then(format_date),
            uri: record.uri,
            file_name: record.file_name,
            size: record.size,
            status: record.status,
            downloads: record.downloads,
        }
    }
}

#[derive(Debug, Default, Serialize)]
pub struct FileList {
    pub files: Vec<FileSummary>,
    pub total: u64,
}
impl From<Page> for FileList {
    fn from(page: Page) -> Self {
        Self { files: page.records.into_iter().map(FileSummary::from).collect(), total: page.total }
    }
}

/// GET /api/list
pub async fn list(State(state): State<AppState>, Query(paging): Query<Paging>) -> Result<Json<FileList>, ApiError> {
    let page = state.coordinator.records().list(paging.offset(), paging.limit()).await.map_err(internal)?;
    Ok(Json(page.into()))
}

/// GET /api/search
pub async fn search(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<FileList>, ApiError> {
    let term = query.file.as_deref().map(str::trim).unwrap_or_default();
    if term.is_empty() {
        return Ok(Json(FileList::default()));
    }
    let page = state
        .coordinator
        .records()
        .search(term, query.paging.offset(), query.paging.limit())
        .await
        .map_err(internal)?;
    Ok(Json(page.into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(None, None, 0, 10)]
    #[case(Some("5"), Some("20"), 5, 20)]
    #[case(Some("five"), Some("twenty"), 0, 0)]
    #[case(Some("-1"), Some(""), 0, 0)]
    #[case(Some(" 3 "), None, 3, 10)]
    fn test_paging(
        #[case] offset: Option<&str>,
        #[case] limit: Option<&str>,
        #[case] expected_offset: u64,
        #[case] expected_limit: u64,
    ) {
        let paging = Paging { offset: offset.map(str::to_string), limit: limit.map(str::to_string) };
        assert_eq!(paging.offset(), expected_offset);
        assert_eq!(paging.limit(), expected_limit);
    }
}
