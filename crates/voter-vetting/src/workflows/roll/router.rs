use std::io::Cursor;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;

use super::domain::BatchId;
use super::import::{ImportProcessor, ImportRequest};
use super::repository::RollStore;
use super::ImportError;
use crate::workflows::matching::{MatchQuery, Matcher};
use crate::workflows::RepositoryError;

/// Roll operations exposed over HTTP.
pub struct RollApi<S> {
    pub importer: ImportProcessor<S>,
    pub matcher: Matcher<S>,
}

/// Upload body: the CSV export inline, plus the list date it represents.
#[derive(Debug, Clone, Deserialize)]
pub struct ImportUpload {
    pub list_date: NaiveDate,
    #[serde(default)]
    pub source_filename: Option<String>,
    pub csv: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PreviewUpload {
    pub csv: String,
}

pub fn roll_router<S>(api: Arc<RollApi<S>>) -> Router
where
    S: RollStore + 'static,
{
    Router::new()
        .route(
            "/api/v1/roll/imports",
            post(import_handler::<S>).get(list_batches_handler::<S>),
        )
        .route("/api/v1/roll/imports/preview", post(preview_handler::<S>))
        .route("/api/v1/roll/imports/:batch_id", get(batch_handler::<S>))
        .route("/api/v1/roll/matches", post(match_handler::<S>))
        .with_state(api)
}

pub(crate) async fn import_handler<S>(
    State(api): State<Arc<RollApi<S>>>,
    Json(upload): Json<ImportUpload>,
) -> Response
where
    S: RollStore + 'static,
{
    let request = ImportRequest {
        list_date: upload.list_date,
        source_filename: upload.source_filename,
    };
    let csv = upload.csv;
    let result = tokio::task::spawn_blocking(move || {
        api.importer.import_reader(request, Cursor::new(csv))
    })
    .await;

    match result {
        Ok(Ok(batch)) => (StatusCode::CREATED, Json(batch)).into_response(),
        Ok(Err(error)) => import_error_response(error),
        Err(join) => internal_error(join.to_string()),
    }
}

pub(crate) async fn preview_handler<S>(
    State(api): State<Arc<RollApi<S>>>,
    Json(upload): Json<PreviewUpload>,
) -> Response
where
    S: RollStore + 'static,
{
    let csv = upload.csv;
    let result =
        tokio::task::spawn_blocking(move || api.importer.preview_reader(Cursor::new(csv))).await;

    match result {
        Ok(Ok(preview)) => (StatusCode::OK, Json(preview)).into_response(),
        Ok(Err(error)) => import_error_response(error),
        Err(join) => internal_error(join.to_string()),
    }
}

pub(crate) async fn list_batches_handler<S>(State(api): State<Arc<RollApi<S>>>) -> Response
where
    S: RollStore + 'static,
{
    match api.importer.batches() {
        Ok(batches) => (StatusCode::OK, Json(batches)).into_response(),
        Err(error) => import_error_response(error),
    }
}

pub(crate) async fn batch_handler<S>(
    State(api): State<Arc<RollApi<S>>>,
    Path(batch_id): Path<u64>,
) -> Response
where
    S: RollStore + 'static,
{
    match api.importer.batch(BatchId(batch_id)) {
        Ok(Some(batch)) => (StatusCode::OK, Json(batch)).into_response(),
        Ok(None) => {
            let payload = json!({
                "error": "import batch not found",
                "batch_id": batch_id,
            });
            (StatusCode::NOT_FOUND, Json(payload)).into_response()
        }
        Err(error) => import_error_response(error),
    }
}

pub(crate) async fn match_handler<S>(
    State(api): State<Arc<RollApi<S>>>,
    Json(query): Json<MatchQuery>,
) -> Response
where
    S: RollStore + 'static,
{
    if query.first_name.trim().is_empty() || query.last_name.trim().is_empty() {
        let payload = json!({
            "error": "first_name and last_name are required",
        });
        return (StatusCode::UNPROCESSABLE_ENTITY, Json(payload)).into_response();
    }

    match api.matcher.find_candidates(&query) {
        Ok(result) => (StatusCode::OK, Json(result)).into_response(),
        Err(error) => internal_error(error.to_string()),
    }
}

fn import_error_response(error: ImportError) -> Response {
    let status = match &error {
        ImportError::Repository(RepositoryError::Conflict) => StatusCode::CONFLICT,
        ImportError::Repository(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
        other if other.is_invalid_input() => StatusCode::UNPROCESSABLE_ENTITY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let payload = json!({
        "error": error.to_string(),
    });
    (status, Json(payload)).into_response()
}

fn internal_error(message: String) -> Response {
    let payload = json!({
        "error": message,
    });
    (StatusCode::INTERNAL_SERVER_ERROR, Json(payload)).into_response()
}
