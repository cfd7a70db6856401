//! HTTP surface for the ingestion service.
//!
//! This module exposes a compact Axum router with a handful of endpoints:
//!
//! - `POST /ingest` – Accept a multipart file upload, start the background pipeline, and
//!   return the id of the task tracking it. An optional `index_name` part routes the
//!   document to a non-default search index.
//! - `GET /ingest/status/{task_id}` – Poll the lifecycle state of a submitted task.
//! - `GET /metrics` – Observe ingestion counters.
//! - `GET /health` – Liveness probe.
//!
//! Submission is fire-and-continue: the response only acknowledges that the task was
//! registered, and all stage outcomes are observed through the status endpoint.

use crate::pipeline::{IngestApi, RawUpload};
use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;

/// Largest accepted upload body.
const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Build the HTTP router exposing the ingestion API surface.
pub fn create_router<S>(service: Arc<S>) -> Router
where
    S: IngestApi + 'static,
{
    Router::new()
        .route("/ingest", post(submit_ingest::<S>))
        .route("/ingest/status/:task_id", get(ingest_status::<S>))
        .route("/metrics", get(get_metrics::<S>))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(service)
}

/// Success response for the `POST /ingest` endpoint.
#[derive(Serialize)]
struct IngestAccepted {
    /// Identifier to poll via `GET /ingest/status/{task_id}`.
    task_id: String,
    /// Original file name, echoed back.
    file_name: String,
    /// Destination index, when one was requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    index_name: Option<String>,
}

/// Accept an upload and start its pipeline run.
///
/// The multipart body must carry a `file` part with a filename; an optional `index_name`
/// text part selects the destination index.
async fn submit_ingest<S>(
    State(service): State<Arc<S>>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<IngestAccepted>), AppError>
where
    S: IngestApi,
{
    let mut file: Option<(String, Vec<u8>)> = None;
    let mut index_name: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| AppError::BadRequest(format!("malformed multipart body: {err}")))?
    {
        match field.name() {
            Some("file") => {
                let Some(file_name) = field.file_name().map(str::to_string) else {
                    return Err(AppError::BadRequest(
                        "'file' part is missing a filename".to_string(),
                    ));
                };
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|err| AppError::BadRequest(format!("failed to read upload: {err}")))?;
                file = Some((file_name, bytes.to_vec()));
            }
            Some("index_name") => {
                let value = field.text().await.map_err(|err| {
                    AppError::BadRequest(format!("failed to read index_name: {err}"))
                })?;
                if !value.trim().is_empty() {
                    index_name = Some(value.trim().to_string());
                }
            }
            other => {
                tracing::debug!(part = ?other, "Ignoring unknown multipart part");
            }
        }
    }

    let Some((file_name, payload)) = file else {
        return Err(AppError::BadRequest(
            "multipart body must contain a 'file' part".to_string(),
        ));
    };

    let upload = RawUpload::new(file_name, payload, index_name);
    let file_name = upload.file_name.clone();
    let index_name = upload.target_index.clone();
    let task_id = service
        .submit(upload)
        .await
        .map_err(|err| AppError::Internal(err.to_string()))?;

    Ok((
        StatusCode::ACCEPTED,
        Json(IngestAccepted {
            task_id,
            file_name,
            index_name,
        }),
    ))
}

/// Response body for `GET /ingest/status/{task_id}`.
#[derive(Serialize)]
struct StatusResponse {
    task_id: String,
    #[serde(flatten)]
    snapshot: crate::tasks::TaskSnapshot,
}

/// Report the current state of an ingestion task; unknown ids are 404.
async fn ingest_status<S>(
    State(service): State<Arc<S>>,
    Path(task_id): Path<String>,
) -> Result<Json<StatusResponse>, AppError>
where
    S: IngestApi,
{
    match service.task_snapshot(&task_id) {
        Some(snapshot) => Ok(Json(StatusResponse { task_id, snapshot })),
        None => Err(AppError::NotFound(format!("unknown task '{task_id}'"))),
    }
}

/// Return a concise metrics snapshot with ingestion counters.
async fn get_metrics<S>(State(service): State<Arc<S>>) -> Json<crate::metrics::MetricsSnapshot>
where
    S: IngestApi,
{
    Json(service.metrics_snapshot())
}

/// Liveness probe.
async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

enum AppError {
    BadRequest(String),
    NotFound(String),
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            Self::NotFound(message) => (StatusCode::NOT_FOUND, message),
            Self::Internal(message) => (StatusCode::INTERNAL_SERVER_ERROR, message),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}
