use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use golink_pull::error::{Error as PullError, ErrorKind as PullErrorKind};
use serde_json::json;

/// Every way a request can fail, as the client sees it.
#[derive(Debug, PartialEq, Eq)]
pub enum ApiError {
    NotFound,
    BadRequest(String),
    Conflict(String),
    Internal,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::NotFound => (StatusCode::NOT_FOUND, Json(json!({}))).into_response(),
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response(),
            Self::Conflict(message) => (StatusCode::CONFLICT, Json(json!({ "error": message }))).into_response(),
            Self::Internal => {
                (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": "internal server error" }))).into_response()
            },
        }
    }
}

impl From<PullError> for ApiError {
    fn from(err: PullError) -> Self {
        match &*err {
            PullErrorKind::NotFound(_) => Self::NotFound,
            PullErrorKind::AlreadyInProgress(_) => Self::Conflict((*err).to_string()),
            PullErrorKind::InvalidState(..) | PullErrorKind::InvalidRequest(_) => Self::BadRequest((*err).to_string()),
            _ => {
                tracing::error!(error = ?err, "Request failed");
                Self::Internal
            },
        }
    }
}

/// For store and storage failures that are never the client's fault.
pub fn internal<E: std::fmt::Debug>(err: E) -> ApiError {
    tracing::error!(error = ?err, "Request failed");
    ApiError::Internal
}

#[cfg(test)]
mod tests {
    use super::*;
    use golink_cache::Status;
    use rstest::rstest;

    #[rstest]
    #[case(PullErrorKind::NotFound("a".to_string()), ApiError::NotFound)]
    #[case(
        PullErrorKind::AlreadyInProgress("a".to_string()),
        ApiError::Conflict("an operation is already in progress for a".to_string())
    )]
    #[case(
        PullErrorKind::InvalidState("a".to_string(), Status::Available),
        ApiError::BadRequest("file a is not pullable (status: available)".to_string())
    )]
    #[case(PullErrorKind::Cache, ApiError::Internal)]
    #[case(PullErrorKind::Fetch, ApiError::Internal)]
    fn test_from_pull_error(#[case] kind: PullErrorKind, #[case] expected: ApiError) {
        assert_eq!(ApiError::from(exn::Exn::from(kind)), expected);
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(ApiError::NotFound.into_response().status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::Conflict(String::new()).into_response().status(), StatusCode::CONFLICT);
        assert_eq!(ApiError::BadRequest(String::new()).into_response().status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::Internal.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
