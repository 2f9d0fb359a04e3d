//! Database models and API types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::{ApiError, Result};

// Re-export shared types from study-core
pub use study_core::types::{
    Confidence, IntervalUnit, MasteryCardState, Rating, ScheduleState, ScheduleStatus,
};

// === Database Entity Types ===

/// Card stored in PostgreSQL
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DbCard {
    pub id: Uuid,
    pub owner: String,
    pub scope: String,
    pub question: String,
    pub answer: String,
    pub hint: Option<String>,
    pub difficulty: String,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl DbCard {
    /// Convert to API card type
    pub fn to_api_card(&self) -> CardOut {
        CardOut {
            id: self.id,
            scope: self.scope.clone(),
            question: self.question.clone(),
            answer: self.answer.clone(),
            hint: self.hint.clone(),
            difficulty: self.difficulty.clone(),
            tags: self.tags.clone(),
        }
    }
}

/// Long-horizon schedule state in PostgreSQL
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DbScheduleState {
    pub card_id: Uuid,
    pub owner: String,
    pub status: String,
    pub interval: i64,
    pub ease_factor: f64,
    pub repetitions: i32,
    pub lapses: i32,
    pub due_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DbScheduleState {
    /// Create from a study-core state
    pub fn from_core_state(card_id: Uuid, owner: &str, state: &ScheduleState) -> Self {
        Self {
            card_id,
            owner: owner.to_string(),
            status: match state.status {
                ScheduleStatus::New => "new".to_string(),
                ScheduleStatus::Learning => "learning".to_string(),
                ScheduleStatus::Review => "review".to_string(),
            },
            interval: state.interval,
            ease_factor: state.ease_factor,
            repetitions: state.repetitions as i32,
            lapses: state.lapses as i32,
            due_at: state.due_at,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    /// Convert to a study-core state
    pub fn to_core_state(&self) -> ScheduleState {
        ScheduleState {
            status: match self.status.as_str() {
                "learning" => ScheduleStatus::Learning,
                "review" => ScheduleStatus::Review,
                _ => ScheduleStatus::New,
            },
            interval: self.interval,
            ease_factor: self.ease_factor,
            repetitions: self.repetitions as u32,
            lapses: self.lapses as u32,
            due_at: self.due_at,
        }
    }
}

/// Mastery state in PostgreSQL
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DbMasteryState {
    pub card_id: Uuid,
    pub owner: String,
    pub mastery_level: i32,
    pub review_count: i32,
    pub consecutive_good: i32,
    pub five_count: i32,
    pub lapses: i32,
    pub mastered: bool,
    pub last_reviewed: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DbMasteryState {
    /// Create from a study-core state
    pub fn from_core_state(card_id: Uuid, owner: &str, state: &MasteryCardState) -> Self {
        Self {
            card_id,
            owner: owner.to_string(),
            mastery_level: state.mastery_level as i32,
            review_count: state.review_count as i32,
            consecutive_good: state.consecutive_good as i32,
            five_count: state.five_count as i32,
            lapses: state.lapses as i32,
            mastered: state.mastered,
            last_reviewed: state.last_reviewed,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    /// Convert to a study-core state
    pub fn to_core_state(&self) -> MasteryCardState {
        MasteryCardState {
            mastery_level: self.mastery_level as u32,
            review_count: self.review_count as u32,
            consecutive_good: self.consecutive_good as u32,
            five_count: self.five_count as u32,
            lapses: self.lapses as u32,
            mastered: self.mastered,
            last_reviewed: self.last_reviewed,
        }
    }
}

/// Mastery session row
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DbSession {
    pub id: Uuid,
    pub owner: String,
    pub scope: String,
    /// Initial candidate set, immutable after start.
    pub card_ids: Vec<Uuid>,
    /// Live queue.
    pub card_order: Vec<Uuid>,
    pub current_index: i32,
    pub review_count: i32,
    pub rating_sum: i64,
    pub started_at: DateTime<Utc>,
    pub last_interaction_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl DbSession {
    pub fn is_ended(&self) -> bool {
        self.ended_at.is_some()
    }

    pub fn is_exhausted(&self) -> bool {
        self.card_order.is_empty()
    }

    /// Card id at the queue pointer, if any.
    pub fn current_card_id(&self) -> Option<Uuid> {
        self.card_order.get(self.current_index as usize).copied()
    }
}

/// Card joined with its schedule due date, as selected by the due query
#[derive(Debug, Clone, FromRow)]
pub struct DbDueCard {
    pub id: Uuid,
    pub owner: String,
    pub scope: String,
    pub question: String,
    pub answer: String,
    pub hint: Option<String>,
    pub difficulty: String,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub due_at: Option<DateTime<Utc>>,
}

impl DbDueCard {
    pub fn to_api(&self) -> DueCardOut {
        DueCardOut {
            card: CardOut {
                id: self.id,
                scope: self.scope.clone(),
                question: self.question.clone(),
                answer: self.answer.clone(),
                hint: self.hint.clone(),
                difficulty: self.difficulty.clone(),
                tags: self.tags.clone(),
            },
            due_at: self.due_at,
        }
    }
}

/// Job status values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "queued" => Some(Self::Queued),
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// Generation job row
#[derive(Debug, Clone, FromRow)]
pub struct DbJob {
    pub id: Uuid,
    pub owner: String,
    pub scope: String,
    pub status: String,
    pub progress: i32,
    pub payload: Json<JobPayload>,
    pub correlation_id: String,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

// === Job Payloads ===

/// Card generation style hint passed through to the generation service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardStyle {
    Mixed,
    Definitions,
    Conceptual,
}

impl Default for CardStyle {
    fn default() -> Self {
        Self::Mixed
    }
}

/// Quiz question kinds the generation service understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    Mcq,
    Conceptual,
    Definition,
    Scenario,
    ShortQa,
}

impl QuestionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mcq => "mcq",
            Self::Conceptual => "conceptual",
            Self::Definition => "definition",
            Self::Scenario => "scenario",
            Self::ShortQa => "short_qa",
        }
    }
}

/// Validated parameters for a flashcard generation job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlashcardJobParams {
    pub topic: Option<String>,
    #[serde(default)]
    pub style: CardStyle,
    pub top_k: u32,
    pub n_cards: u32,
    pub difficulty: Option<String>,
    pub page_start: Option<i32>,
    pub page_end: Option<i32>,
    #[serde(default)]
    pub source_ids: Vec<Uuid>,
}

impl FlashcardJobParams {
    pub fn validate(&self) -> Result<()> {
        if !(1..=50).contains(&self.n_cards) {
            return Err(ApiError::Validation(format!(
                "n_cards must be between 1 and 50, got {}",
                self.n_cards
            )));
        }
        if !(1..=100).contains(&self.top_k) {
            return Err(ApiError::Validation(format!(
                "top_k must be between 1 and 100, got {}",
                self.top_k
            )));
        }
        Ok(())
    }
}

/// Validated parameters for a quiz generation job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizJobParams {
    pub n_questions: u32,
    pub mcq_count: Option<u32>,
    pub types: Vec<QuestionType>,
    pub difficulty: String,
}

impl QuizJobParams {
    pub fn validate(&self) -> Result<()> {
        if !(1..=50).contains(&self.n_questions) {
            return Err(ApiError::Validation(format!(
                "n_questions must be between 1 and 50, got {}",
                self.n_questions
            )));
        }
        if let Some(mcq) = self.mcq_count {
            if mcq > self.n_questions {
                return Err(ApiError::Validation(format!(
                    "mcq_count {} exceeds n_questions {}",
                    mcq, self.n_questions
                )));
            }
        }
        if self.types.is_empty() {
            return Err(ApiError::Validation(
                "types must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Tagged job payload, one variant per job kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobPayload {
    Flashcards(FlashcardJobParams),
    Quiz(QuizJobParams),
}

// === Generation Service Items ===

/// One card as returned by the generation service.
///
/// Entries may be duplicated or malformed; the worker filters them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedCard {
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub answer: String,
    pub hint: Option<String>,
    pub difficulty: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// One quiz item as returned by the generation service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizItem {
    #[serde(rename = "type")]
    pub qtype: QuestionType,
    #[serde(default)]
    pub question: String,
    pub options: Option<Vec<String>>,
    pub correct_index: Option<i32>,
    pub answer_key: Option<String>,
    pub explanation: Option<String>,
    pub difficulty: Option<String>,
}

impl QuizItem {
    pub fn is_mcq(&self) -> bool {
        self.qtype == QuestionType::Mcq
    }
}

/// Quiz draft returned by the generation service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizDraft {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub items: Vec<QuizItem>,
}

// === API Request/Response Types ===

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardOut {
    pub id: Uuid,
    pub scope: String,
    pub question: String,
    pub answer: String,
    pub hint: Option<String>,
    pub difficulty: String,
    pub tags: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DueQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DueCardOut {
    #[serde(flatten)]
    pub card: CardOut,
    pub due_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitReviewRequest {
    pub card_id: Uuid,
    pub rating: i32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitReviewResponse {
    pub next_state: ScheduleState,
    pub next_due: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StartSessionRequest {
    pub scope: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MasteryReviewRequest {
    pub card_id: Uuid,
    pub rating: i32,
}

/// What phase the session queue is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Active,
    Empty,
    Ended,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionStats {
    pub total_cards: usize,
    pub mastered_cards: usize,
    pub average_mastery: f64,
    pub review_count: u32,
    pub average_rating: f64,
    pub active_seconds: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionResponse {
    pub session_id: Uuid,
    pub phase: SessionPhase,
    pub current_card: Option<CardOut>,
    pub stats: SessionStats,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EndSessionResponse {
    pub session_id: Uuid,
    pub ended_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ResetRequest {
    pub scope: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ResetResponse {
    pub cleared_cards: u64,
    pub ended_sessions: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateFlashcardJobRequest {
    pub scope: String,
    #[serde(flatten)]
    pub params: FlashcardJobParams,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateQuizJobRequest {
    pub scope: String,
    #[serde(flatten)]
    pub params: QuizJobParams,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JobStatusResponse {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub progress: i32,
    pub correlation_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl JobStatusResponse {
    pub fn from_job(job: &DbJob) -> Self {
        Self {
            job_id: job.id,
            status: JobStatus::from_str(&job.status).unwrap_or(JobStatus::Queued),
            progress: job.progress,
            correlation_id: job.correlation_id.clone(),
            error_message: job.error_message.clone(),
        }
    }
}
