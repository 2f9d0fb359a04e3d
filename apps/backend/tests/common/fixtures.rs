//! Test fixtures and factory functions for creating test data.

use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use cardbox_backend::db::Database;
use cardbox_backend::models::DbCard;

/// Build a card row.
pub fn card(owner: &str, scope: &str, question: &str, answer: &str) -> DbCard {
    DbCard {
        id: Uuid::new_v4(),
        owner: owner.to_string(),
        scope: scope.to_string(),
        question: question.to_string(),
        answer: answer.to_string(),
        hint: None,
        difficulty: "medium".to_string(),
        tags: vec![],
        created_at: Utc::now(),
    }
}

/// Insert `count` numbered cards into a scope and return their ids in
/// creation order.
pub async fn seed_cards(db: &Database, owner: &str, scope: &str, count: usize) -> Vec<Uuid> {
    let cards: Vec<DbCard> = (0..count)
        .map(|i| {
            card(
                owner,
                scope,
                &format!("Question {}?", i + 1),
                &format!("Answer {}.", i + 1),
            )
        })
        .collect();
    db.insert_cards(&cards).await.expect("Failed to seed cards");
    cards.iter().map(|c| c.id).collect()
}

/// Create a long-horizon review request body.
pub fn review_request(card_id: Uuid, rating: i32) -> serde_json::Value {
    json!({ "card_id": card_id, "rating": rating })
}

/// Create a session start request body.
pub fn start_session_request(scope: &str) -> serde_json::Value {
    json!({ "scope": scope })
}

/// Create a mastery review request body.
pub fn mastery_review_request(card_id: Uuid, rating: i32) -> serde_json::Value {
    json!({ "card_id": card_id, "rating": rating })
}

/// Create a flashcard job request body.
pub fn flashcard_job_request(scope: &str, n_cards: u32) -> serde_json::Value {
    json!({
        "scope": scope,
        "style": "mixed",
        "top_k": 12,
        "n_cards": n_cards,
    })
}

/// Create a quiz job request body.
pub fn quiz_job_request(scope: &str, n_questions: u32, mcq_count: Option<u32>) -> serde_json::Value {
    json!({
        "scope": scope,
        "n_questions": n_questions,
        "mcq_count": mcq_count,
        "types": ["mcq", "conceptual"],
        "difficulty": "medium",
    })
}
