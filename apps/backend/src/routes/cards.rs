//! Card listing and deletion endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::error::{ApiError, Result};
use crate::models::CardOut;
use crate::routes::auth::Owner;
use crate::AppState;

/// GET /api/scopes/:scope/cards
pub async fn list(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(scope): Path<String>,
) -> Result<Json<Vec<CardOut>>> {
    let cards = state.db.get_cards_by_scope(&owner, &scope).await?;
    Ok(Json(cards.iter().map(|c| c.to_api_card()).collect()))
}

/// DELETE /api/cards/:card_id
pub async fn remove(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(card_id): Path<Uuid>,
) -> Result<StatusCode> {
    let deleted = state.db.delete_card(card_id, &owner).await?;
    if !deleted {
        return Err(ApiError::NotFound(format!("Card {card_id}")));
    }
    Ok(StatusCode::NO_CONTENT)
}
