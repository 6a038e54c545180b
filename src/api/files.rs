//! Per-file endpoints: view, pull and download.

use crate::api::AppState;
use crate::api::error::{ApiError, internal};
use crate::api::format_date;
use async_stream::stream;
use axum::Json;
use axum::body::{Body, to_bytes};
use axum::extract::{FromRequest, Path, Request, State};
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use futures::Stream;
use golink_cache::{FileRecord, Sibling, Status};
use golink_storage::backend::BoxSyncRead;
use golink_storage::error::ErrorKind as StorageErrorKind;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::io::{self, Read};

/// Download bodies are read from storage this much at a time.
const CHUNK_SIZE: usize = 64 * 1024;
/// A pull body only ever carries an email address.
const MAX_PULL_BODY: usize = 16 * 1024;

#[derive(Debug, Serialize)]
pub struct FileView {
    pub uri: String,
    pub file_name: String,
    pub path: String,
    pub origin: Option<String>,
    pub owner: String,
    pub contact: Option<String>,
    pub size: u64,
    pub hash: Option<String>,
    pub status: Status,
    pub error: Option<String>,
    pub version: u32,
    pub downloads: u64,
    pub publishing_date: Option<String>,
    pub siblings: Vec<SiblingView>,
}

#[derive(Debug, Serialize)]
pub struct SiblingView {
    pub uri: String,
    pub version: u32,
    pub status: Status,
}

impl FileView {
    fn new(record: FileRecord, siblings: Vec<Sibling>) -> Self {
        Self {
            publishing_date: record.publishing_date.as_ref().and_then(format_date),
            path: record.path.display().to_string(),
            siblings: siblings
                .into_iter()
                .map(|sibling| SiblingView { uri: sibling.uri, version: sibling.version, status: sibling.status })
                .collect(),
            uri: record.uri,
            file_name: record.file_name,
            origin: record.origin,
            owner: record.owner,
            contact: record.contact,
            size: record.size,
            hash: record.hash,
            status: record.status,
            error: record.error,
            version: record.version,
            downloads: record.downloads,
        }
    }
}

async fn find(state: &AppState, uri: &str) -> Result<FileRecord, ApiError> {
    state.coordinator.records().get(uri).await.map_err(internal)?.ok_or(ApiError::NotFound)
}

/// GET /api/view/*uri
pub async fn view(State(state): State<AppState>, Path(uri): Path<String>) -> Result<impl IntoResponse, ApiError> {
    let record = find(&state, &uri).await?;
    let siblings = state.coordinator.records().siblings(&uri).await.map_err(internal)?;
    Ok(Json(json!({ "file": FileView::new(record, siblings) })))
}

#[derive(Debug, Default, Deserialize)]
pub struct PullBody {
    #[serde(default)]
    pub email: Option<String>,
}

/// POST /api/pull/*uri
pub async fn pull(
    State(state): State<AppState>,
    Path(uri): Path<String>,
    request: Request,
) -> Result<impl IntoResponse, ApiError> {
    let body = pull_body(request).await?;
    let ticket = state.coordinator.request_pull(&uri, body.email.as_deref()).await?;
    let message = match body.email.as_deref().map(str::trim) {
        Some(email) if !email.is_empty() => "Pull started. An email will be sent to you when the file is ready.",
        _ => "Pull started. It should be ready soon.",
    };
    tracing::debug!(uri = ticket.uri(), "Pull accepted");
    Ok((StatusCode::ACCEPTED, Json(json!({ "message": message }))))
}

/// An empty body means no email. Anything else must be a valid JSON body.
async fn pull_body(request: Request) -> Result<PullBody, ApiError> {
    let (parts, body) = request.into_parts();
    let bytes = to_bytes(body, MAX_PULL_BODY)
        .await
        .map_err(|err| ApiError::BadRequest(format!("could not read request body: {err}")))?;
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(PullBody::default());
    }
    let request = Request::from_parts(parts, Body::from(bytes));
    let Json(body) = Json::<PullBody>::from_request(request, &())
        .await
        .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
    Ok(body)
}

/// GET /api/download/*uri
pub async fn download(State(state): State<AppState>, Path(uri): Path<String>) -> Result<Response, ApiError> {
    let record = find(&state, &uri).await?;
    if record.status != Status::Available {
        return Err(ApiError::Conflict(format!("file {uri} is not available (status: {})", record.status)));
    }
    let storage = state.coordinator.storage();
    let info = match storage.stat(&record.path).await {
        Ok(info) => info,
        Err(err) if matches!(&*err, StorageErrorKind::NotFound(_)) => {
            tracing::warn!(%uri, path = %record.path.display(), "Available file missing from storage");
            return Err(ApiError::Conflict(format!("file {uri} is not available (content missing)")));
        },
        Err(err) => return Err(internal(err)),
    };
    let reader = storage.reader(&record.path).await.map_err(internal)?;
    if let Err(err) = state.coordinator.records().increment_downloads(&uri).await {
        tracing::warn!(%uri, error = ?err, "Could not count download");
    }
    tracing::info!(%uri, size = info.size, "Serving download");
    let disposition = content_disposition(&record.file_name);
    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("application/octet-stream")),
            (header::CONTENT_LENGTH, HeaderValue::from(info.size)),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        Body::from_stream(chunks(reader)),
    )
        .into_response())
}

fn content_disposition(file_name: &str) -> HeaderValue {
    let escaped: String = file_name.chars().map(|c| if matches!(c, '"' | '\\') || c.is_control() { '_' } else { c }).collect();
    HeaderValue::from_str(&format!("attachment; filename=\"{escaped}\""))
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"))
}

/// Read a blocking storage reader on the blocking pool, one chunk at a time.
fn chunks(mut reader: BoxSyncRead) -> impl Stream<Item = io::Result<Vec<u8>>> {
    stream! {
        loop {
            let read = tokio::task::spawn_blocking(move || {
                let mut buffer = vec![0u8; CHUNK_SIZE];
                let read = reader.read(&mut buffer).map(|read| {
                    buffer.truncate(read);
                    buffer
                });
                (reader, read)
            })
            .await;
            match read {
                Ok((_, Ok(buffer))) if buffer.is_empty() => break,
                Ok((returned, Ok(buffer))) => {
                    reader = returned;
                    yield Ok(buffer);
                },
                Ok((_, Err(err))) => {
                    yield Err(err);
                    break;
                },
                Err(err) => {
                    yield Err(io::Error::other(err));
                    break;
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use rstest::rstest;
    use std::io::Cursor;

    #[rstest]
    #[case("report.pdf", "attachment; filename=\"report.pdf\"")]
    #[case("say \"hi\".txt", "attachment; filename=\"say _hi_.txt\"")]
    #[case("line\nbreak", "attachment; filename=\"line_break\"")]
    fn test_content_disposition(#[case] file_name: &str, #[case] expected: &str) {
        assert_eq!(content_disposition(file_name), expected);
    }

    #[tokio::test]
    async fn test_chunks() {
        let data: Vec<u8> = (0..(CHUNK_SIZE * 2 + 5)).map(|i| (i % 256) as u8).collect();
        let reader: BoxSyncRead = Box::new(Cursor::new(data.clone()));
        let chunks: Vec<_> = chunks(reader).collect().await;
        assert_eq!(chunks.len(), 3);
        let joined: Vec<u8> = chunks.into_iter().flat_map(|chunk| chunk.unwrap()).collect();
        assert_eq!(joined, data);
    }
}
