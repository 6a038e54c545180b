use crate::api::AppState;
use crate::api::error::ApiError;
use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use golink_pull::PublishRequest;
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize)]
pub struct PublishBody {
    pub origin: String,
    pub path: String,
    pub owner: String,
    #[serde(default)]
    pub contact: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

/// POST /api/publish
pub async fn publish(
    State(state): State<AppState>,
    body: Result<Json<PublishBody>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(body) = body.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
    let notify = body.email.as_deref().is_some_and(|email| !email.trim().is_empty());
    let request = PublishRequest {
        origin: body.origin,
        path: body.path,
        owner: body.owner,
        contact: body.contact,
        email: body.email,
    };
    let ticket = state.coordinator.publish(request).await?;
    let message = if notify {
        "File registering. An email will be sent to you when the file is ready."
    } else {
        "File registering. It should be ready soon."
    };
    Ok((StatusCode::ACCEPTED, Json(json!({ "message": message, "file_id": ticket.uri() }))))
}
