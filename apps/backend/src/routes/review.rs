//! Long-horizon review endpoints

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::Utc;

use crate::error::{ApiError, Result};
use crate::models::*;
use crate::routes::auth::Owner;
use crate::AppState;

const DEFAULT_DUE_LIMIT: i64 = 30;
const MAX_DUE_LIMIT: i64 = 10_000;

/// GET /api/review/due/:scope
pub async fn due(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(scope): Path<String>,
    Query(query): Query<DueQuery>,
) -> Result<Json<Vec<DueCardOut>>> {
    let limit = query.limit.unwrap_or(DEFAULT_DUE_LIMIT);
    if !(1..=MAX_DUE_LIMIT).contains(&limit) {
        return Err(ApiError::Validation(format!(
            "limit must be between 1 and {MAX_DUE_LIMIT}, got {limit}"
        )));
    }

    let cards = state
        .db
        .get_due_cards(&owner, &scope, Utc::now(), limit)
        .await?;

    Ok(Json(cards.iter().map(|c| c.to_api()).collect()))
}

/// POST /api/review
pub async fn submit(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Json(payload): Json<SubmitReviewRequest>,
) -> Result<Json<SubmitReviewResponse>> {
    let confidence = u8::try_from(payload.rating)
        .ok()
        .and_then(Confidence::new)
        .ok_or_else(|| {
            ApiError::Validation(format!(
                "rating must be between 1 and 5, got {}",
                payload.rating
            ))
        })?;

    state
        .db
        .get_card(payload.card_id, &owner)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Card {}", payload.card_id)))?;

    // Absent state means a new card; the policy supplies the initial state.
    let current = state
        .db
        .get_schedule_state(payload.card_id, &owner)
        .await?
        .map(|s| s.to_core_state())
        .unwrap_or_else(|| state.scheduler.initial_state());

    let now = Utc::now();
    let next = state.scheduler.review(&current, confidence, now);

    let db_state = DbScheduleState::from_core_state(payload.card_id, &owner, &next);
    state.db.upsert_schedule_state(&db_state).await?;
    state
        .db
        .insert_review(payload.card_id, &owner, payload.rating)
        .await?;

    Ok(Json(SubmitReviewResponse {
        next_due: next.due_at,
        next_state: next,
    }))
}
