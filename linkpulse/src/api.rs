//! HTTP surface: turns requests into controller calls and controller results
//! into JSON responses or report downloads.

use crate::controller::Controller;
use crate::error::CheckError;
use crate::message::{BatchId, Link};
use crate::reporters::{ReportFormat, create_reporter, report_filename};
use axum::{
    Json, Router,
    extract::{FromRequest, Path, Request, State, rejection::JsonRejection},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    controller: Arc<Controller>,
}

#[derive(Debug, Deserialize)]
pub struct CheckLinksRequest {
    pub urls: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BatchStatusResponse {
    pub batch_id: BatchId,
    pub status: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<Link>,
}

#[derive(Debug, Deserialize)]
pub struct ReportRequest {
    pub batch_ids: Vec<BatchId>,
    #[serde(default)]
    pub format: ReportFormat,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Maps core errors onto HTTP status codes.
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl From<CheckError> for ApiError {
    fn from(err: CheckError) -> Self {
        let status = match &err {
            CheckError::InvalidInput => StatusCode::BAD_REQUEST,
            CheckError::NotFound(_) => StatusCode::NOT_FOUND,
            CheckError::ShuttingDown => StatusCode::SERVICE_UNAVAILABLE,
            CheckError::Corrupt(_) | CheckError::Persistence(_) | CheckError::Encoding(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        Self::new(status, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse {
                error: self.message,
            }),
        )
            .into_response()
    }
}

/// JSON body extractor answering 400 for every body that cannot be decoded,
/// whatever the reason: bad syntax, wrong shape or a missing content type.
/// Oversized bodies keep their 413.
pub struct JsonBody<T>(pub T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(JsonBody(value)),
            Err(rejection) => {
                let status = match &rejection {
                    JsonRejection::BytesRejection(_)
                        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE =>
                    {
                        StatusCode::PAYLOAD_TOO_LARGE
                    }
                    _ => StatusCode::BAD_REQUEST,
                };
                tracing::debug!(error = %rejection.body_text(), "rejected request body");
                Err(ApiError::new(status, "invalid json"))
            }
        }
    }
}

pub fn router(controller: Arc<Controller>) -> Router {
    Router::new()
        .route("/api/check", post(check_links))
        .route("/api/status/{batch_id}", get(batch_status))
        .route("/api/report", post(report))
        .route("/api/batch/{batch_id}", delete(delete_batch))
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { controller })
}

async fn check_links(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<CheckLinksRequest>,
) -> Result<Json<BatchStatusResponse>, ApiError> {
    let controller = &state.controller;
    let batch_id = controller.submit_and_schedule(req.urls).await?;
    let batch = controller.query_batch(batch_id)?;

    Ok(Json(BatchStatusResponse {
        batch_id,
        status: "in process".to_string(),
        links: batch.links,
    }))
}

async fn batch_status(
    State(state): State<AppState>,
    Path(batch_id): Path<BatchId>,
) -> Result<Json<BatchStatusResponse>, ApiError> {
    let batch = state.controller.query_batch(batch_id)?;
    let status = if batch.is_completed() {
        "completed"
    } else {
        "processing"
    };

    Ok(Json(BatchStatusResponse {
        batch_id,
        status: status.to_string(),
        links: batch.links,
    }))
}

async fn report(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<ReportRequest>,
) -> Result<Response, ApiError> {
    if req.batch_ids.is_empty() {
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            "Batch IDs list cannot be empty",
        ));
    }

    let reporter = create_reporter(req.format);
    let batches = state.controller.exportable_view(&req.batch_ids);
    let generated_at = chrono::Utc::now();
    let body = reporter.render(&batches, generated_at).map_err(|e| {
        tracing::error!(reporter = reporter.name(), error = %e, "report rendering failed");
        ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "error generating report")
    })?;
    let disposition = format!(
        "attachment; filename={}",
        report_filename(reporter.as_ref(), generated_at)
    );

    Ok((
        [
            (header::CONTENT_TYPE, reporter.content_type().to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response())
}

async fn delete_batch(
    State(state): State<AppState>,
    Path(batch_id): Path<BatchId>,
) -> Result<StatusCode, ApiError> {
    state.controller.delete_batch(batch_id)?;
    Ok(StatusCode::NO_CONTENT)
}
