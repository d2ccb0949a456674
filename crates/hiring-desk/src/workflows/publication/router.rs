use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;

use super::domain::{JobPostingId, PublishingRun};
use super::repository::{PostingRepository, RunStore};
use super::service::{PublicationError, PublicationService, PublishResponse};

/// Router builder exposing publish, retry, and the run audit trail.
pub fn publication_router<P, S>(service: Arc<PublicationService<P, S>>) -> Router
where
    P: PostingRepository + 'static,
    S: RunStore + 'static,
{
    Router::new()
        .route(
            "/api/v1/job-postings/:job_id/publish",
            post(publish_handler::<P, S>),
        )
        .route(
            "/api/v1/job-postings/:job_id/publish/retry",
            post(retry_handler::<P, S>),
        )
        .route(
            "/api/v1/job-postings/:job_id/publishing-runs",
            get(runs_handler::<P, S>),
        )
        .with_state(service)
}

pub(crate) async fn publish_handler<P, S>(
    State(service): State<Arc<PublicationService<P, S>>>,
    Path(job_id): Path<String>,
) -> Result<Json<PublishResponse>, PublicationError>
where
    P: PostingRepository + 'static,
    S: RunStore + 'static,
{
    let report = service.publish(&JobPostingId(job_id)).await?;
    Ok(Json(report.response()))
}

pub(crate) async fn retry_handler<P, S>(
    State(service): State<Arc<PublicationService<P, S>>>,
    Path(job_id): Path<String>,
) -> Result<Json<PublishResponse>, PublicationError>
where
    P: PostingRepository + 'static,
    S: RunStore + 'static,
{
    let report = service.retry_failed(&JobPostingId(job_id)).await?;
    Ok(Json(report.response()))
}

pub(crate) async fn runs_handler<P, S>(
    State(service): State<Arc<PublicationService<P, S>>>,
    Path(job_id): Path<String>,
) -> Result<Json<Vec<PublishingRun>>, PublicationError>
where
    P: PostingRepository + 'static,
    S: RunStore + 'static,
{
    let runs = service.runs(&JobPostingId(job_id)).await?;
    Ok(Json(runs))
}

impl PublicationError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            PublicationError::Validation { .. } => StatusCode::BAD_REQUEST,
            PublicationError::NotFound => StatusCode::NOT_FOUND,
            PublicationError::AlreadyPublished { .. }
            | PublicationError::NotPublished
            | PublicationError::NothingToRetry
            | PublicationError::RetryInProgress => StatusCode::CONFLICT,
            PublicationError::Persistence(_) | PublicationError::RunStore(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
        }
    }
}

impl IntoResponse for PublicationError {
    fn into_response(self) -> Response {
        let code = self.status_code();
        let message = self.to_string();
        let payload = match self {
            PublicationError::Validation { missing_fields } => json!({
                "success": false,
                "error": message,
                "missing_fields": missing_fields,
            }),
            PublicationError::AlreadyPublished {
                status,
                published_at,
            } => json!({
                "success": false,
                "error": message,
                "status": status,
                "published_at": published_at,
            }),
            _ => json!({
                "success": false,
                "error": message,
            }),
        };
        (code, Json(payload)).into_response()
    }
}
