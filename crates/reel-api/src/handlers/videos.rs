//! Slideshow submission and job status.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use reel_models::{JobId, JobRecord, JobStatus, SceneOptions, VideoRequest};

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::state::AppState;

/// Body of `POST /api/videos`.
#[derive(Debug, Deserialize)]
pub struct CreateVideoBody {
    pub urls: Vec<String>,
    #[serde(default)]
    pub options: SceneOptions,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateVideoResponse {
    pub job_id: JobId,
    pub status: JobStatus,
}

/// Create the job record and queue the render.
pub async fn create_video(
    State(state): State<AppState>,
    Json(body): Json<CreateVideoBody>,
) -> ApiResult<(StatusCode, Json<CreateVideoResponse>)> {
    let request = VideoRequest::new(JobId::new(), body.urls, body.options);
    request.validate(state.config.max_slides)?;

    let job_id = request.job_id.clone();
    let record = JobRecord::new(job_id.clone());
    state.backend.create_job(&record).await?;

    let slides = request.urls.len();
    if let Err(e) = state.backend.enqueue(request).await {
        error!(job_id = %job_id, "Failed to enqueue job: {}", e);
        if let Err(mark) = state
            .backend
            .mark_failed(&job_id, "could not be queued")
            .await
        {
            error!(job_id = %job_id, "Failed to mark job failed: {}", mark);
        }
        return Err(e);
    }

    metrics::record_job_submitted(slides);
    info!(job_id = %job_id, slides, "Accepted slideshow request");

    Ok((
        StatusCode::ACCEPTED,
        Json(CreateVideoResponse {
            job_id,
            status: record.status,
        }),
    ))
}

/// Current state of a job record.
pub async fn get_video(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<JobRecord>> {
    if !is_valid_job_id(&job_id) {
        return Err(ApiError::bad_request("invalid job id"));
    }
    let job_id = JobId::from(job_id);
    state
        .backend
        .get_job(&job_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("job {}", job_id)))
}

/// Job ids become Firestore document ids.
fn is_valid_job_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 128
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
