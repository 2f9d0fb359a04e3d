//! Job submission and status endpoints

use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use crate::error::{ApiError, Result};
use crate::models::*;
use crate::routes::auth::Owner;
use crate::AppState;

/// POST /api/jobs/flashcards
pub async fn create_flashcards(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Json(payload): Json<CreateFlashcardJobRequest>,
) -> Result<Json<JobStatusResponse>> {
    payload.params.validate()?;

    let job = state
        .db
        .insert_job(
            &owner,
            &payload.scope,
            &JobPayload::Flashcards(payload.params),
        )
        .await?;

    tracing::info!(job_id = %job.id, scope = %job.scope, "flashcard job queued");
    Ok(Json(JobStatusResponse::from_job(&job)))
}

/// POST /api/jobs/quizzes
pub async fn create_quiz(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Json(payload): Json<CreateQuizJobRequest>,
) -> Result<Json<JobStatusResponse>> {
    payload.params.validate()?;

    let job = state
        .db
        .insert_job(&owner, &payload.scope, &JobPayload::Quiz(payload.params))
        .await?;

    tracing::info!(job_id = %job.id, scope = %job.scope, "quiz job queued");
    Ok(Json(JobStatusResponse::from_job(&job)))
}

/// GET /api/jobs/:job_id
pub async fn status(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(job_id): Path<Uuid>,
) -> Result<Json<JobStatusResponse>> {
    let job = state
        .db
        .get_job(job_id, &owner)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Job {job_id}")))?;

    Ok(Json(JobStatusResponse::from_job(&job)))
}
