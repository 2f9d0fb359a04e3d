//! Generation and retrieval collaborator boundaries.
//!
//! The generation service is opaque and possibly unreliable: it may return
//! fewer items than requested, duplicates, or malformed entries. Everything
//! that defends against that lives here as pure functions so the worker
//! can apply the all-or-nothing acceptance policy.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{CardStyle, GeneratedCard, QuizDraft, QuizItem, QuizJobParams};

/// Failures of the acceptance policy applied to collaborator output.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("generation returned no usable items")]
    NoUsableItems,

    #[error("generation returned {got} items (target {want})")]
    Shortfall { got: usize, want: usize },

    #[error("generation returned {got} {kind} items (target {want})")]
    SplitShortfall {
        kind: &'static str,
        got: usize,
        want: usize,
    },
}

/// Parameters forwarded to the retrieval collaborator.
#[derive(Debug, Clone, Serialize)]
pub struct ContextRequest {
    pub topic: Option<String>,
    pub top_k: u32,
    pub source_ids: Vec<Uuid>,
    pub page_start: Option<i32>,
    pub page_end: Option<i32>,
}

impl Default for ContextRequest {
    fn default() -> Self {
        Self {
            topic: None,
            top_k: 40,
            source_ids: Vec::new(),
            page_start: None,
            page_end: None,
        }
    }
}

/// Retrieval collaborator: ranked context text for a scope.
#[async_trait]
pub trait ContextRetriever: Send + Sync {
    async fn fetch_context(&self, scope: &str, request: &ContextRequest)
        -> anyhow::Result<String>;
}

/// Generation collaborator: turns context text into study material.
#[async_trait]
pub trait GenerationService: Send + Sync {
    async fn generate_cards(
        &self,
        context: &str,
        count: u32,
        style: CardStyle,
    ) -> anyhow::Result<Vec<GeneratedCard>>;

    async fn generate_quiz(
        &self,
        context: &str,
        params: &QuizJobParams,
    ) -> anyhow::Result<QuizDraft>;
}

/// HTTP client for both collaborators.
pub struct HttpGenerationClient {
    client: Client,
    base_url: String,
}

impl HttpGenerationClient {
    pub fn new(base_url: String) -> Self {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(300))
            .build()
            .expect("failed to build HTTP client");
        Self { client, base_url }
    }
}

#[derive(Serialize)]
struct CardGenerationRequest<'a> {
    context: &'a str,
    count: u32,
    style: CardStyle,
}

#[derive(Serialize)]
struct QuizGenerationRequest<'a> {
    context: &'a str,
    #[serde(flatten)]
    params: &'a QuizJobParams,
}

#[derive(Serialize)]
struct RetrievalRequest<'a> {
    scope: &'a str,
    #[serde(flatten)]
    request: &'a ContextRequest,
}

#[async_trait]
impl ContextRetriever for HttpGenerationClient {
    async fn fetch_context(
        &self,
        scope: &str,
        request: &ContextRequest,
    ) -> anyhow::Result<String> {
        let response = self
            .client
            .post(format!("{}/context", self.base_url))
            .json(&RetrievalRequest { scope, request })
            .send()
            .await?
            .error_for_status()?;

        let body: serde_json::Value = response.json().await?;
        Ok(body
            .get("context")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string())
    }
}

#[async_trait]
impl GenerationService for HttpGenerationClient {
    async fn generate_cards(
        &self,
        context: &str,
        count: u32,
        style: CardStyle,
    ) -> anyhow::Result<Vec<GeneratedCard>> {
        let response = self
            .client
            .post(format!("{}/generate/cards", self.base_url))
            .json(&CardGenerationRequest {
                context,
                count,
                style,
            })
            .send()
            .await?
            .error_for_status()?;

        Ok(response.json().await?)
    }

    async fn generate_quiz(
        &self,
        context: &str,
        params: &QuizJobParams,
    ) -> anyhow::Result<QuizDraft> {
        let response = self
            .client
            .post(format!("{}/generate/quiz", self.base_url))
            .json(&QuizGenerationRequest { context, params })
            .send()
            .await?
            .error_for_status()?;

        Ok(response.json().await?)
    }
}

// === Acceptance policy helpers ===

/// Filter a generation batch: trim, drop entries with an empty side, drop
/// questions already seen, apply the requested difficulty override.
pub fn sanitize_cards(
    batch: Vec<GeneratedCard>,
    difficulty: Option<&str>,
    seen: &mut HashSet<String>,
) -> Vec<GeneratedCard> {
    let mut usable = Vec::new();
    for mut card in batch {
        card.question = card.question.trim().to_string();
        card.answer = card.answer.trim().to_string();
        if card.question.is_empty() || card.answer.is_empty() {
            continue;
        }
        if !seen.insert(card.question.clone()) {
            continue;
        }
        if let Some(difficulty) = difficulty {
            card.difficulty = Some(difficulty.to_string());
        }
        usable.push(card);
    }
    usable
}

/// Filter a quiz batch the same way, keyed on the question text.
pub fn sanitize_quiz_items(batch: Vec<QuizItem>, seen: &mut HashSet<String>) -> Vec<QuizItem> {
    let mut usable = Vec::new();
    for mut item in batch {
        item.question = item.question.trim().to_string();
        if item.question.is_empty() {
            continue;
        }
        if !seen.insert(item.question.clone()) {
            continue;
        }
        usable.push(item);
    }
    usable
}

/// Context windows for retry attempts: the whole text, then each half, so
/// a stalled generator sees varied input.
pub fn context_windows(context: &str) -> Vec<String> {
    let lines: Vec<&str> = context.lines().collect();
    let mut windows = vec![context.to_string()];
    if lines.len() > 4 {
        let half = lines.len() / 2;
        windows.push(lines[..half].join("\n"));
        windows.push(lines[half..].join("\n"));
    }
    windows
}

/// All-or-nothing count policy for flashcards.
pub fn take_exact_cards(
    mut collected: Vec<GeneratedCard>,
    target: usize,
) -> Result<Vec<GeneratedCard>, GenerationError> {
    if collected.is_empty() {
        return Err(GenerationError::NoUsableItems);
    }
    if collected.len() < target {
        return Err(GenerationError::Shortfall {
            got: collected.len(),
            want: target,
        });
    }
    collected.truncate(target);
    Ok(collected)
}

/// Enforce the requested mcq/open split exactly, reshuffling and
/// truncating the collaborator's output. Falling short on either side
/// fails the whole batch.
pub fn enforce_quiz_split(
    items: Vec<QuizItem>,
    n_questions: usize,
    mcq_count: Option<usize>,
) -> Result<Vec<QuizItem>, GenerationError> {
    if items.is_empty() {
        return Err(GenerationError::NoUsableItems);
    }

    let Some(mcq_count) = mcq_count else {
        if items.len() < n_questions {
            return Err(GenerationError::Shortfall {
                got: items.len(),
                want: n_questions,
            });
        }
        let mut items = items;
        items.truncate(n_questions);
        return Ok(items);
    };

    let open_count = n_questions - mcq_count;
    let (mcqs, open): (Vec<QuizItem>, Vec<QuizItem>) =
        items.into_iter().partition(|i| i.is_mcq());

    if mcqs.len() < mcq_count {
        return Err(GenerationError::SplitShortfall {
            kind: "multiple-choice",
            got: mcqs.len(),
            want: mcq_count,
        });
    }
    if open.len() < open_count {
        return Err(GenerationError::SplitShortfall {
            kind: "open-ended",
            got: open.len(),
            want: open_count,
        });
    }

    let mut result: Vec<QuizItem> = mcqs.into_iter().take(mcq_count).collect();
    result.extend(open.into_iter().take(open_count));
    Ok(result)
}
