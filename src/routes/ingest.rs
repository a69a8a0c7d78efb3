use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use garde::Validate;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::db::job_store::JobUpdate;
use crate::models::ingest::{IngestAccepted, IngestRequest, JobStatusResponse};
use crate::models::job::JobStatus;
use crate::services::ingest::IngestError;

/// POST /api/v1/ingest — Submit a batch of assets for media generation.
pub async fn submit_ingest(
    State(state): State<AppState>,
    Json(request): Json<IngestRequest>,
) -> Result<(StatusCode, Json<IngestAccepted>), (StatusCode, String)> {
    if let Err(report) = request.validate() {
        return Err((StatusCode::BAD_REQUEST, report.to_string()));
    }

    match state.ingest.start_ingest(request).await {
        Ok(accepted) => {
            metrics::counter!("ingest_jobs_submitted_total").increment(1);
            Ok((StatusCode::ACCEPTED, Json(accepted)))
        }
        Err(e @ IngestError::EmptySubmission) => Err((StatusCode::BAD_REQUEST, e.to_string())),
        Err(e @ IngestError::Queue(_)) => {
            tracing::error!(error = %e, "Work queue rejected submission");
            Err((
                StatusCode::SERVICE_UNAVAILABLE,
                "Ingest pipeline is not accepting work".to_string(),
            ))
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to start ingest job");
            Err((
                StatusCode::BAD_GATEWAY,
                "Failed to create ingest job".to_string(),
            ))
        }
    }
}

/// GET /api/v1/jobs/{job_id} — Poll an ingest job and its items.
pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> Result<Json<JobStatusResponse>, StatusCode> {
    let job = state.jobs.get(job_id).await.map_err(|e| {
        tracing::error!(job_id = %job_id, error = %e, "Failed to load job");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    match job {
        Some(job) => Ok(Json(JobStatusResponse::from(&job))),
        None => Err(StatusCode::NOT_FOUND),
    }
}

/// POST /api/v1/jobs/{job_id}/cancel — Request cancellation of a job.
///
/// The worker observes the flip between items, so cancellation takes effect
/// at the next item boundary at the earliest.
pub async fn cancel_job(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> Result<StatusCode, (StatusCode, String)> {
    let job = state
        .jobs
        .get(job_id)
        .await
        .map_err(|e| {
            tracing::error!(job_id = %job_id, error = %e, "Failed to load job");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to load job".to_string(),
            )
        })?
        .ok_or((StatusCode::NOT_FOUND, "Job not found".to_string()))?;

    if job.status.is_terminal() {
        return Err((
            StatusCode::CONFLICT,
            format!("Job is already {}", job.status),
        ));
    }

    state
        .jobs
        .update(
            job_id,
            JobUpdate {
                status: Some(JobStatus::Canceled),
                ..JobUpdate::default()
            },
        )
        .await
        .map_err(|e| {
            tracing::error!(job_id = %job_id, error = %e, "Failed to cancel job");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to cancel job".to_string(),
            )
        })?;

    tracing::info!(job_id = %job_id, "Job canceled");
    Ok(StatusCode::ACCEPTED)
}
