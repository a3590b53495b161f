use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;

use super::domain::{SupporterId, SupporterSubmission};
use super::repository::{ReviewQueue, SupporterFilter, SupporterRepository};
use super::service::{SupporterService, SupporterServiceError};
use crate::workflows::roll::RollStore;
use crate::workflows::{RepositoryError, StopSignal};

/// Router state: the service plus the stop flag bulk passes check between chunks.
pub struct SupporterApi<S, R, Q> {
    pub service: Arc<SupporterService<S, R, Q>>,
    pub stop: StopSignal,
}

pub fn supporter_router<S, R, Q>(api: Arc<SupporterApi<S, R, Q>>) -> Router
where
    S: RollStore + 'static,
    R: SupporterRepository + 'static,
    Q: ReviewQueue + 'static,
{
    Router::new()
        .route("/api/v1/supporters", post(create_handler::<S, R, Q>))
        .route(
            "/api/v1/supporters/:supporter_id",
            get(get_handler::<S, R, Q>).put(update_handler::<S, R, Q>),
        )
        .route(
            "/api/v1/supporters/:supporter_id/duplicates",
            get(duplicates_handler::<S, R, Q>),
        )
        .route("/api/v1/supporters/revet", post(revet_handler::<S, R, Q>))
        .route(
            "/api/v1/supporters/duplicates/scan",
            post(scan_handler::<S, R, Q>),
        )
        .with_state(api)
}

pub(crate) async fn create_handler<S, R, Q>(
    State(api): State<Arc<SupporterApi<S, R, Q>>>,
    Json(submission): Json<SupporterSubmission>,
) -> Response
where
    S: RollStore + 'static,
    R: SupporterRepository + 'static,
    Q: ReviewQueue + 'static,
{
    match api.service.create(submission) {
        Ok(report) => (StatusCode::CREATED, Json(report)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn update_handler<S, R, Q>(
    State(api): State<Arc<SupporterApi<S, R, Q>>>,
    Path(supporter_id): Path<u64>,
    Json(submission): Json<SupporterSubmission>,
) -> Response
where
    S: RollStore + 'static,
    R: SupporterRepository + 'static,
    Q: ReviewQueue + 'static,
{
    match api.service.update(SupporterId(supporter_id), submission) {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn get_handler<S, R, Q>(
    State(api): State<Arc<SupporterApi<S, R, Q>>>,
    Path(supporter_id): Path<u64>,
) -> Response
where
    S: RollStore + 'static,
    R: SupporterRepository + 'static,
    Q: ReviewQueue + 'static,
{
    match api.service.get(SupporterId(supporter_id)) {
        Ok(supporter) => (StatusCode::OK, Json(supporter)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn duplicates_handler<S, R, Q>(
    State(api): State<Arc<SupporterApi<S, R, Q>>>,
    Path(supporter_id): Path<u64>,
) -> Response
where
    S: RollStore + 'static,
    R: SupporterRepository + 'static,
    Q: ReviewQueue + 'static,
{
    match api.service.duplicates_for(SupporterId(supporter_id)) {
        Ok(duplicates) => (StatusCode::OK, Json(duplicates)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn revet_handler<S, R, Q>(
    State(api): State<Arc<SupporterApi<S, R, Q>>>,
    Json(filter): Json<SupporterFilter>,
) -> Response
where
    S: RollStore + 'static,
    R: SupporterRepository + 'static,
    Q: ReviewQueue + 'static,
{
    let result =
        tokio::task::spawn_blocking(move || api.service.revet(&filter, &api.stop)).await;

    match result {
        Ok(Ok(summary)) => (StatusCode::OK, Json(summary)).into_response(),
        Ok(Err(error)) => error_response(error),
        Err(join) => internal_error(join.to_string()),
    }
}

pub(crate) async fn scan_handler<S, R, Q>(State(api): State<Arc<SupporterApi<S, R, Q>>>) -> Response
where
    S: RollStore + 'static,
    R: SupporterRepository + 'static,
    Q: ReviewQueue + 'static,
{
    let result = tokio::task::spawn_blocking(move || api.service.scan_duplicates(&api.stop)).await;

    match result {
        Ok(Ok(summary)) => (StatusCode::OK, Json(summary)).into_response(),
        Ok(Err(error)) => error_response(error),
        Err(join) => internal_error(join.to_string()),
    }
}

fn error_response(error: SupporterServiceError) -> Response {
    let status = match &error {
        SupporterServiceError::Invalid(_) => StatusCode::UNPROCESSABLE_ENTITY,
        SupporterServiceError::Repository(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
        SupporterServiceError::Repository(RepositoryError::Conflict) => StatusCode::CONFLICT,
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
