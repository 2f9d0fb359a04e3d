//! Mastery session endpoints

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;
use uuid::Uuid;

use crate::error::{ApiError, Result};
use crate::models::*;
use crate::routes::auth::Owner;
use crate::AppState;
use study_core::MasteryEngine;

/// POST /api/mastery/start
pub async fn start(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Json(payload): Json<StartSessionRequest>,
) -> Result<Json<SessionResponse>> {
    let cards = state.db.get_cards_by_scope(&owner, &payload.scope).await?;
    let card_ids: Vec<Uuid> = cards.iter().map(|c| c.id).collect();
    let order = MasteryEngine::build_order(card_ids)?;

    let now = Utc::now();
    let session = DbSession {
        id: Uuid::new_v4(),
        owner: owner.clone(),
        scope: payload.scope,
        card_ids: order.clone(),
        card_order: order,
        current_index: 0,
        review_count: 0,
        rating_sum: 0,
        started_at: now,
        last_interaction_at: now,
        ended_at: None,
    };
    state.db.insert_session(&session).await?;

    let response = session_response(&state, &session).await?;
    Ok(Json(response))
}

/// GET /api/mastery/:session_id
pub async fn current(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(session_id): Path<Uuid>,
) -> Result<Json<SessionResponse>> {
    let session = state
        .db
        .get_session(session_id, &owner)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Session {session_id}")))?;

    let response = session_response(&state, &session).await?;
    Ok(Json(response))
}

/// POST /api/mastery/:session_id/review
pub async fn review(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(session_id): Path<Uuid>,
    Json(payload): Json<MasteryReviewRequest>,
) -> Result<Json<SessionResponse>> {
    let confidence = u8::try_from(payload.rating)
        .ok()
        .and_then(Confidence::new)
        .ok_or_else(|| {
            ApiError::Validation(format!(
                "rating must be between 1 and 5, got {}",
                payload.rating
            ))
        })?;

    let mut session = state
        .db
        .get_session(session_id, &owner)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Session {session_id}")))?;

    // The client must act on the most recently returned card; stale or
    // duplicate submissions are rejected before any state changes.
    MasteryEngine::check_submission(
        &session.card_order,
        session.current_index as usize,
        &payload.card_id,
        session.is_ended(),
    )?;

    let engine = MasteryEngine::default();
    let now = Utc::now();

    let card_state = state
        .db
        .get_mastery_state(payload.card_id, &owner)
        .await?
        .map(|s| s.to_core_state())
        .unwrap_or_default();
    let next_state = engine.rate(&card_state, confidence, now);
    state
        .db
        .upsert_mastery_state(&DbMasteryState::from_core_state(
            payload.card_id,
            &owner,
            &next_state,
        ))
        .await?;

    let step = engine.step_queue(
        &mut session.card_order,
        session.current_index as usize,
        confidence,
    );
    session.current_index = step.next_index as i32;
    session.review_count += 1;
    session.rating_sum += payload.rating as i64;
    session.last_interaction_at = now;

    state.db.update_session_progress(&session).await?;

    let response = session_response(&state, &session).await?;
    Ok(Json(response))
}

/// POST /api/mastery/:session_id/end
///
/// Idempotent by design: ending an ended session is a no-op success so
/// duplicate client end calls are tolerated.
pub async fn end(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(session_id): Path<Uuid>,
) -> Result<Json<EndSessionResponse>> {
    state
        .db
        .get_session(session_id, &owner)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Session {session_id}")))?;

    let ended_at = state.db.end_session(session_id).await?;

    Ok(Json(EndSessionResponse {
        session_id,
        ended_at,
    }))
}

/// POST /api/mastery/reset
pub async fn reset(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Json(payload): Json<ResetRequest>,
) -> Result<Json<ResetResponse>> {
    let cleared_cards = state
        .db
        .delete_mastery_states(&owner, &payload.scope)
        .await?;
    let ended_sessions = state.db.end_open_sessions(&owner, &payload.scope).await?;

    tracing::info!(
        scope = %payload.scope,
        cleared_cards,
        ended_sessions,
        "mastery progress reset"
    );

    Ok(Json(ResetResponse {
        cleared_cards,
        ended_sessions,
    }))
}

/// Assemble the response the client drives the session with: phase,
/// current card, and aggregate statistics.
async fn session_response(state: &AppState, session: &DbSession) -> Result<SessionResponse> {
    let phase = if session.is_ended() {
        SessionPhase::Ended
    } else if session.is_exhausted() {
        SessionPhase::Empty
    } else {
        SessionPhase::Active
    };

    let current_card = match (phase, session.current_card_id()) {
        (SessionPhase::Active, Some(card_id)) => state
            .db
            .get_card(card_id, &session.owner)
            .await?
            .map(|c| c.to_api_card()),
        _ => None,
    };

    let total_cards = session.card_ids.len();
    let (mastered, level_sum) = state
        .db
        .mastery_summary(&session.owner, &session.card_ids)
        .await?;

    let average_mastery = if total_cards > 0 {
        level_sum as f64 / total_cards as f64
    } else {
        0.0
    };
    let average_rating = if session.review_count > 0 {
        session.rating_sum as f64 / session.review_count as f64
    } else {
        0.0
    };
    let active_seconds = (session.last_interaction_at - session.started_at).num_seconds();

    Ok(SessionResponse {
        session_id: session.id,
        phase,
        current_card,
        stats: SessionStats {
            total_cards,
            mastered_cards: mastered as usize,
            average_mastery,
            review_count: session.review_count as u32,
            average_rating,
            active_seconds,
        },
    })
}
