//! Generation worker loop.
//!
//! Many worker processes may run this loop against the same queue; the
//! claim query hands each queued job to exactly one of them. A job either
//! completes with the full requested item count persisted, or fails with
//! the error message recorded. Failed jobs stay failed; re-enqueueing is
//! an explicit caller action.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use tokio::sync::watch;
use uuid::Uuid;

use crate::db::Database;
use crate::models::*;
use crate::services::generation::{
    context_windows, enforce_quiz_split, sanitize_cards, sanitize_quiz_items, take_exact_cards,
    ContextRequest, ContextRetriever, GenerationService,
};

const CARD_ATTEMPTS: usize = 6;
const QUIZ_ATTEMPTS: usize = 3;

pub struct Worker {
    db: Arc<Database>,
    service: Arc<dyn GenerationService>,
    retriever: Arc<dyn ContextRetriever>,
    poll_interval: Duration,
    shutdown: watch::Receiver<bool>,
}

impl Worker {
    pub fn new(
        db: Arc<Database>,
        service: Arc<dyn GenerationService>,
        retriever: Arc<dyn ContextRetriever>,
        poll_interval: Duration,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            db,
            service,
            retriever,
            poll_interval,
            shutdown,
        }
    }

    /// Claim-process loop. Blocks only on the store and on the idle sleep;
    /// the shutdown signal interrupts both.
    pub async fn run(mut self) {
        tracing::info!("worker started");
        loop {
            if *self.shutdown.borrow() {
                break;
            }

            let job = match self.db.claim_next_job().await {
                Ok(job) => job,
                Err(err) => {
                    tracing::error!(error = %err, "claim failed");
                    None
                }
            };

            let Some(job) = job else {
                tokio::select! {
                    _ = tokio::time::sleep(self.poll_interval) => {}
                    _ = self.shutdown.changed() => {}
                }
                continue;
            };

            tracing::info!(job_id = %job.id, correlation_id = %job.correlation_id, "job claimed");
            match self.process(&job).await {
                Ok(()) => {
                    match self.db.complete_job(job.id).await {
                        Ok(true) => tracing::info!(job_id = %job.id, "job completed"),
                        Ok(false) => {
                            tracing::warn!(job_id = %job.id, "job left running state before completion")
                        }
                        Err(err) => tracing::error!(job_id = %job.id, error = %err, "completion write failed"),
                    }
                }
                Err(err) => {
                    tracing::warn!(job_id = %job.id, error = %err, "job failed");
                    if let Err(db_err) = self.db.fail_job(job.id, &format!("{err:#}")).await {
                        tracing::error!(job_id = %job.id, error = %db_err, "failure write failed");
                    }
                }
            }
        }
        tracing::info!("worker stopped");
    }

    async fn process(&self, job: &DbJob) -> anyhow::Result<()> {
        match &job.payload.0 {
            JobPayload::Flashcards(params) => self.generate_flashcards(job, params).await,
            JobPayload::Quiz(params) => self.generate_quiz(job, params).await,
        }
    }

    async fn fetch_context(&self, scope: &str, request: &ContextRequest) -> anyhow::Result<String> {
        let context = self
            .retriever
            .fetch_context(scope, request)
            .await
            .context("context retrieval failed")?;
        if context.trim().is_empty() {
            bail!("no context available for this scope; add source material first");
        }
        Ok(context)
    }

    async fn generate_flashcards(
        &self,
        job: &DbJob,
        params: &FlashcardJobParams,
    ) -> anyhow::Result<()> {
        self.db.update_job_progress(job.id, 15).await?;

        let request = ContextRequest {
            topic: params.topic.clone(),
            // Widen retrieval with the card count so large requests see
            // enough material.
            top_k: params.top_k.max((params.n_cards * 2).min(60)),
            source_ids: params.source_ids.clone(),
            page_start: params.page_start,
            page_end: params.page_end,
        };
        let context = self.fetch_context(&job.scope, &request).await?;
        self.db.update_job_progress(job.id, 35).await?;

        let windows = context_windows(&context);
        let target = params.n_cards as usize;
        let mut collected: Vec<GeneratedCard> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        let mut attempts = 0;
        while collected.len() < target && attempts < CARD_ATTEMPTS {
            let need = (target - collected.len()) as u32;
            let window = &windows[attempts % windows.len()];
            let batch = self
                .service
                .generate_cards(window, need, params.style)
                .await
                .context("card generation failed")?;
            collected.extend(sanitize_cards(batch, params.difficulty.as_deref(), &mut seen));
            attempts += 1;
        }

        let cards = take_exact_cards(collected, target)?;
        self.db.update_job_progress(job.id, 80).await?;

        let rows: Vec<DbCard> = cards
            .into_iter()
            .map(|card| DbCard {
                id: Uuid::new_v4(),
                owner: job.owner.clone(),
                scope: job.scope.clone(),
                question: card.question,
                answer: card.answer,
                hint: card.hint,
                difficulty: card.difficulty.unwrap_or_else(|| "medium".to_string()),
                tags: card.tags,
                created_at: chrono::Utc::now(),
            })
            .collect();
        let inserted = self.db.insert_cards(&rows).await?;
        tracing::info!(job_id = %job.id, inserted, "cards persisted");

        self.db.update_job_progress(job.id, 95).await?;
        Ok(())
    }

    async fn generate_quiz(&self, job: &DbJob, params: &QuizJobParams) -> anyhow::Result<()> {
        self.db.update_job_progress(job.id, 15).await?;

        let context = self
            .fetch_context(&job.scope, &ContextRequest::default())
            .await?;
        self.db.update_job_progress(job.id, 35).await?;

        let target = params.n_questions as usize;
        let mut items: Vec<QuizItem> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut title = String::new();

        let mut attempts = 0;
        while items.len() < target && attempts < QUIZ_ATTEMPTS {
            let draft = self
                .service
                .generate_quiz(&context, params)
                .await
                .context("quiz generation failed")?;
            if title.is_empty() {
                title = draft.title.trim().to_string();
            }
            items.extend(sanitize_quiz_items(draft.items, &mut seen));
            attempts += 1;
        }

        let items = enforce_quiz_split(items, target, params.mcq_count.map(|n| n as usize))?;
        self.db.update_job_progress(job.id, 70).await?;

        let title = if title.is_empty() { "Quiz".to_string() } else { title };
        let quiz_id = self
            .db
            .insert_quiz(&job.owner, &job.scope, &title, &params.difficulty, &items)
            .await?;
        tracing::info!(job_id = %job.id, quiz_id = %quiz_id, "quiz persisted");

        self.db.update_job_progress(job.id, 95).await?;
        Ok(())
    }
}
