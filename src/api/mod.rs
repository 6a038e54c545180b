//! JSON HTTP API.
//!
//! File uris may contain slashes, so per-file routes capture the rest of the
//! path.

mod error;
mod files;
mod listing;
mod publish;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::routing::{get, post};
use golink_config::RunMode;
use golink_pull::PullCoordinator;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use time::UtcDateTime;
use time::macros::format_description;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub coordinator: PullCoordinator,
    pub mode: RunMode,
}

const STATUS: &str = "/api/status";
const ENDPOINTS: &str = "/api/endpoints";
const LIST: &str = "/api/list";
const SEARCH: &str = "/api/search";
const VIEW: &str = "/api/view/*uri";
const PULL: &str = "/api/pull/*uri";
const DOWNLOAD: &str = "/api/download/*uri";
const PUBLISH: &str = "/api/publish";

/// Handler name to route, as reported by `GET /api/endpoints`.
const ROUTES: [(&str, &str); 8] = [
    ("status", STATUS),
    ("endpoints", ENDPOINTS),
    ("list_files", LIST),
    ("search", SEARCH),
    ("view_file", VIEW),
    ("pull_file", PULL),
    ("download_file", DOWNLOAD),
    ("publish_file", PUBLISH),
];

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(STATUS, get(status))
        .route(ENDPOINTS, get(endpoints))
        .route(LIST, get(listing::list))
        .route(SEARCH, get(listing::search))
        .route(VIEW, get(files::view))
        .route(PULL, post(files::pull))
        .route(DOWNLOAD, get(files::download))
        .route(PUBLISH, post(publish::publish))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// GET /api/status
async fn status(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "version": env!("CARGO_PKG_VERSION"), "mode": state.mode.as_str() }))
}

/// GET /api/endpoints
async fn endpoints() -> Json<BTreeMap<&'static str, &'static str>> {
    Json(ROUTES.into_iter().collect())
}

pub(crate) fn format_date(date: &UtcDateTime) -> Option<String> {
    date.format(format_description!("[year]-[month]-[day]")).ok()
}
