//! Worker loop and job claim tests.
//!
//! These tests require a running PostgreSQL database.
//! Set DATABASE_URL before running. Generation and retrieval collaborators
//! are stubbed in-process.

mod common;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serial_test::serial;
use tokio::sync::watch;
use uuid::Uuid;

use cardbox_backend::db::Database;
use cardbox_backend::models::*;
use cardbox_backend::services::generation::{
    ContextRequest, ContextRetriever, GenerationService,
};
use cardbox_backend::services::worker::Worker;

use common::TestContext;

struct StubRetriever {
    context: String,
}

#[async_trait]
impl ContextRetriever for StubRetriever {
    async fn fetch_context(
        &self,
        _scope: &str,
        _request: &ContextRequest,
    ) -> anyhow::Result<String> {
        Ok(self.context.clone())
    }
}

/// Returns the same batch on every attempt, like a generator stuck on the
/// same few ideas.
struct StubGenerator {
    cards: Vec<GeneratedCard>,
    quiz: QuizDraft,
}

#[async_trait]
impl GenerationService for StubGenerator {
    async fn generate_cards(
        &self,
        _context: &str,
        _count: u32,
        _style: CardStyle,
    ) -> anyhow::Result<Vec<GeneratedCard>> {
        Ok(self.cards.clone())
    }

    async fn generate_quiz(
        &self,
        _context: &str,
        _params: &QuizJobParams,
    ) -> anyhow::Result<QuizDraft> {
        Ok(self.quiz.clone())
    }
}

fn generated_card(question: &str) -> GeneratedCard {
    GeneratedCard {
        question: question.to_string(),
        answer: format!("answer to {question}"),
        hint: None,
        difficulty: None,
        tags: vec![],
    }
}

fn quiz_item(question: &str, qtype: QuestionType) -> QuizItem {
    QuizItem {
        qtype,
        question: question.to_string(),
        options: if qtype == QuestionType::Mcq {
            Some(vec!["a".into(), "b".into(), "c".into(), "d".into()])
        } else {
            None
        },
        correct_index: if qtype == QuestionType::Mcq { Some(0) } else { None },
        answer_key: None,
        explanation: None,
        difficulty: None,
    }
}

fn empty_quiz() -> QuizDraft {
    QuizDraft {
        title: String::new(),
        items: vec![],
    }
}

/// Claim every leftover queued job so the assertions below only see ours.
async fn drain_queue(db: &Database) {
    while let Ok(Some(job)) = db.claim_next_job().await {
        let _ = db.fail_job(job.id, "drained by test setup").await;
    }
}

/// Run a worker until the given job reaches a terminal status.
async fn run_until_terminal(
    db: Arc<Database>,
    generator: Arc<StubGenerator>,
    job_id: Uuid,
    owner: &str,
) -> DbJob {
    let retriever = Arc::new(StubRetriever {
        context: (0..10)
            .map(|i| format!("fact number {i}"))
            .collect::<Vec<_>>()
            .join("\n"),
    });
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker = Worker::new(
        db.clone(),
        generator,
        retriever,
        Duration::from_millis(50),
        shutdown_rx,
    );
    let handle = tokio::spawn(worker.run());

    let mut job = None;
    for _ in 0..100 {
        tokio::time::sleep(Duration::from_millis(50)).await;
        let current = db
            .get_job(job_id, owner)
            .await
            .expect("job lookup")
            .expect("job exists");
        if current.status == "completed" || current.status == "failed" {
            job = Some(current);
            break;
        }
    }

    let _ = shutdown_tx.send(true);
    let _ = handle.await;
    job.expect("job never reached a terminal status")
}

/// Concurrency property: N concurrent claims against one queued job hand
/// it to exactly one caller.
#[tokio::test]
#[ignore = "requires database"]
#[serial]
async fn test_exactly_one_claimant_wins() {
    let ctx = TestContext::new().await;
    let owner = TestContext::unique_owner("claim");
    let scope = TestContext::unique_scope("claim");

    drain_queue(&ctx.db).await;

    let payload = JobPayload::Flashcards(FlashcardJobParams {
        topic: None,
        style: CardStyle::Mixed,
        top_k: 12,
        n_cards: 5,
        difficulty: None,
        page_start: None,
        page_end: None,
        source_ids: vec![],
    });
    let job = ctx
        .db
        .insert_job(&owner, &scope, &payload)
        .await
        .expect("enqueue");

    let mut handles = Vec::new();
    for _ in 0..8 {
        let db = ctx.db.clone();
        handles.push(tokio::spawn(async move { db.claim_next_job().await }));
    }

    let mut winners = 0;
    for handle in handles {
        if let Ok(Some(claimed)) = handle.await.expect("task join") {
            if claimed.id == job.id {
                winners += 1;
                assert_eq!(claimed.status, "running");
                assert_eq!(claimed.progress, 5);
                assert!(claimed.started_at.is_some());
            }
        }
    }
    assert_eq!(winners, 1);

    ctx.cleanup_owner(&owner).await;
}

/// Test terminal transitions are only valid from running.
#[tokio::test]
#[ignore = "requires database"]
#[serial]
async fn test_terminal_states_are_final() {
    let ctx = TestContext::new().await;
    let owner = TestContext::unique_owner("terminal");
    let scope = TestContext::unique_scope("terminal");

    drain_queue(&ctx.db).await;

    let payload = JobPayload::Quiz(QuizJobParams {
        n_questions: 5,
        mcq_count: None,
        types: vec![QuestionType::Mcq],
        difficulty: "medium".to_string(),
    });
    let job = ctx.db.insert_job(&owner, &scope, &payload).await.unwrap();

    // Queued jobs cannot be completed or failed directly.
    assert!(!ctx.db.complete_job(job.id).await.unwrap());
    assert!(!ctx.db.fail_job(job.id, "nope").await.unwrap());

    let claimed = ctx.db.claim_next_job().await.unwrap().expect("claimed");
    assert_eq!(claimed.id, job.id);
    assert!(ctx.db.complete_job(job.id).await.unwrap());

    // Completed is terminal.
    assert!(!ctx.db.fail_job(job.id, "too late").await.unwrap());
    let final_job = ctx.db.get_job(job.id, &owner).await.unwrap().unwrap();
    assert_eq!(final_job.status, "completed");
    assert_eq!(final_job.progress, 100);

    ctx.cleanup_owner(&owner).await;
}

/// Test the worker completes a flashcard job and persists exactly the
/// requested number of cards.
#[tokio::test]
#[ignore = "requires database"]
#[serial]
async fn test_worker_completes_flashcard_job() {
    let ctx = TestContext::new().await;
    let owner = TestContext::unique_owner("worker");
    let scope = TestContext::unique_scope("worker");

    drain_queue(&ctx.db).await;

    let payload = JobPayload::Flashcards(FlashcardJobParams {
        topic: Some("photosynthesis".to_string()),
        style: CardStyle::Mixed,
        top_k: 12,
        n_cards: 3,
        difficulty: Some("hard".to_string()),
        page_start: None,
        page_end: None,
        source_ids: vec![],
    });
    let job = ctx.db.insert_job(&owner, &scope, &payload).await.unwrap();

    let generator = Arc::new(StubGenerator {
        cards: vec![
            generated_card("What is chlorophyll?"),
            generated_card("Where does the Calvin cycle run?"),
            generated_card("What gas do plants fix?"),
            generated_card("What is chlorophyll?"), // duplicate, dropped
        ],
        quiz: empty_quiz(),
    });

    let finished = run_until_terminal(ctx.db.clone(), generator, job.id, &owner).await;
    assert_eq!(finished.status, "completed");
    assert_eq!(finished.progress, 100);
    assert!(finished.finished_at.is_some());

    let cards = ctx.db.get_cards_by_scope(&owner, &scope).await.unwrap();
    assert_eq!(cards.len(), 3);
    assert!(cards.iter().all(|c| c.difficulty == "hard"));

    ctx.cleanup_owner(&owner).await;
}

/// Shortfall property: fewer usable items than requested across all
/// attempts fails the job, never completes it short.
#[tokio::test]
#[ignore = "requires database"]
#[serial]
async fn test_worker_fails_on_shortfall() {
    let ctx = TestContext::new().await;
    let owner = TestContext::unique_owner("shortfall");
    let scope = TestContext::unique_scope("shortfall");

    drain_queue(&ctx.db).await;

    let payload = JobPayload::Flashcards(FlashcardJobParams {
        topic: None,
        style: CardStyle::Mixed,
        top_k: 12,
        n_cards: 10,
        difficulty: None,
        page_start: None,
        page_end: None,
        source_ids: vec![],
    });
    let job = ctx.db.insert_job(&owner, &scope, &payload).await.unwrap();

    // Two distinct cards per batch, identical across attempts: dedup
    // leaves two usable items against a target of ten.
    let generator = Arc::new(StubGenerator {
        cards: vec![generated_card("Q1"), generated_card("Q2")],
        quiz: empty_quiz(),
    });

    let finished = run_until_terminal(ctx.db.clone(), generator, job.id, &owner).await;
    assert_eq!(finished.status, "failed");
    let message = finished.error_message.expect("failure message");
    assert!(message.contains("target 10"), "unexpected message: {message}");

    // No partial results.
    let cards = ctx.db.get_cards_by_scope(&owner, &scope).await.unwrap();
    assert!(cards.is_empty());

    ctx.cleanup_owner(&owner).await;
}

/// Test the worker enforces the exact mcq/open split on quiz jobs.
#[tokio::test]
#[ignore = "requires database"]
#[serial]
async fn test_worker_enforces_quiz_split() {
    let ctx = TestContext::new().await;
    let owner = TestContext::unique_owner("quiz");
    let scope = TestContext::unique_scope("quiz");

    drain_queue(&ctx.db).await;

    let payload = JobPayload::Quiz(QuizJobParams {
        n_questions: 4,
        mcq_count: Some(2),
        types: vec![QuestionType::Mcq, QuestionType::Conceptual],
        difficulty: "medium".to_string(),
    });
    let job = ctx.db.insert_job(&owner, &scope, &payload).await.unwrap();

    // The collaborator ignores the split: three MCQs, three open.
    let generator = Arc::new(StubGenerator {
        cards: vec![],
        quiz: QuizDraft {
            title: "Cell Biology".to_string(),
            items: vec![
                quiz_item("mcq 1", QuestionType::Mcq),
                quiz_item("mcq 2", QuestionType::Mcq),
                quiz_item("mcq 3", QuestionType::Mcq),
                quiz_item("open 1", QuestionType::Conceptual),
                quiz_item("open 2", QuestionType::Conceptual),
                quiz_item("open 3", QuestionType::ShortQa),
            ],
        },
    });

    let finished = run_until_terminal(ctx.db.clone(), generator, job.id, &owner).await;
    assert_eq!(finished.status, "completed");

    let total: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM quiz_questions q JOIN quizzes z ON z.id = q.quiz_id WHERE z.owner = $1",
    )
    .bind(&owner)
    .fetch_one(ctx.db.pool())
    .await
    .unwrap();
    assert_eq!(total, 4);

    let mcqs: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM quiz_questions q JOIN quizzes z ON z.id = q.quiz_id \
         WHERE z.owner = $1 AND q.qtype = 'mcq'",
    )
    .bind(&owner)
    .fetch_one(ctx.db.pool())
    .await
    .unwrap();
    assert_eq!(mcqs, 2);

    ctx.cleanup_owner(&owner).await;
}
