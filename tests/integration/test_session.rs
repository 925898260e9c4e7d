//! Integration tests for the session controller.
//!
//! These tests drive a full session (built-in course, built-in dataset, a
//! stubbed tutor backend) through the same controller the server uses.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use sqlcoach_engine::Value;
use sqlcoach_session::{
    DatasetSeed, EventBroadcaster, LessonCatalog, Outcome, Role, Session, SessionController,
    SessionEvent, SessionStatus, SqlCoachError, TutorAssembler, TutorBackend, TutorErrorKind,
    BACKEND_FAILURE_FALLBACK, EMPTY_REPLY_FALLBACK, GREETING,
};
use tokio::sync::Notify;
use tokio::time::timeout;

// ============================================================================
// Tutor stubs
// ============================================================================

/// Fails every call like an unreachable service.
struct UnreachableBackend;

#[async_trait]
impl TutorBackend for UnreachableBackend {
    async fn generate(&self, _prompt: &str, _model: &str) -> sqlcoach_session::Result<String> {
        Err(SqlCoachError::tutor_backend(
            TutorErrorKind::Network,
            "dns error: no such host",
        ))
    }
}

/// Returns a fixed reply.
struct CannedBackend(&'static str);

#[async_trait]
impl TutorBackend for CannedBackend {
    async fn generate(&self, _prompt: &str, _model: &str) -> sqlcoach_session::Result<String> {
        Ok(self.0.to_string())
    }
}

/// Records prompts and holds each reply until released.
struct RecordingBackend {
    gate: Arc<Notify>,
    prompts: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl TutorBackend for RecordingBackend {
    async fn generate(&self, prompt: &str, _model: &str) -> sqlcoach_session::Result<String> {
        self.prompts
            .lock()
            .expect("prompt log poisoned")
            .push(prompt.to_string());
        self.gate.notified().await;
        Ok("Try a WHERE clause.".to_string())
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn controller(seed: DatasetSeed, backend: Arc<dyn TutorBackend>) -> SessionController {
    SessionController::new(
        Session::new(LessonCatalog::builtin(), seed),
        TutorAssembler::new(backend, "test-model"),
        EventBroadcaster::new(64),
    )
}

async fn ready_controller(backend: Arc<dyn TutorBackend>) -> SessionController {
    let controller = controller(DatasetSeed::builtin(), backend);
    controller
        .initialize()
        .await
        .expect("built-in dataset should load");
    controller
}

async fn run(controller: &SessionController, sql: &str) -> Outcome {
    controller
        .edit_query(sql.to_string())
        .await
        .expect("session should be ready");
    controller.run().await.expect("session should be ready")
}

// ============================================================================
// Startup
// ============================================================================

#[tokio::test]
async fn test_fresh_session_starts_at_first_lesson() {
    let controller = ready_controller(Arc::new(CannedBackend("ok"))).await;
    let snapshot = controller.snapshot().await;

    assert_eq!(snapshot.status, SessionStatus::Ready);
    assert_eq!(snapshot.lesson_index, 0);
    assert_eq!(snapshot.query, "SELECT * FROM employees;");
    assert!(snapshot.outcome.is_none());
    assert_eq!(snapshot.transcript.len(), 1);
    let greeting = snapshot.transcript.last().expect("greeting");
    assert_eq!(greeting.role, Role::Tutor);
    assert_eq!(greeting.text, GREETING);
}

#[tokio::test]
async fn test_unloadable_dataset_keeps_session_uninitialized() {
    let controller = controller(
        DatasetSeed::new("CREATE TABLE broken ("),
        Arc::new(CannedBackend("ok")),
    );

    let err = controller.initialize().await.expect_err("seed is malformed");
    assert!(matches!(err, SqlCoachError::SeedLoadFailed { .. }));
    assert_eq!(controller.snapshot().await.status, SessionStatus::Uninitialized);

    let err = controller.run().await.expect_err("run must be rejected");
    assert_eq!(err.to_string(), "engine not initialized");
    assert!(controller.select_lesson(1).await.is_err());
    assert!(controller.ask_tutor("help").await.is_err());
}

// ============================================================================
// Lesson navigation
// ============================================================================

#[tokio::test]
async fn test_selecting_each_lesson_loads_its_initial_query() {
    let controller = ready_controller(Arc::new(CannedBackend("ok"))).await;
    let catalog = LessonCatalog::builtin();

    for (index, lesson) in catalog.iter().enumerate().rev() {
        run(&controller, "SELECT 1").await;
        controller.select_lesson(index).await.expect("ready");

        let snapshot = controller.snapshot().await;
        assert_eq!(snapshot.lesson_index, index);
        assert_eq!(snapshot.query, lesson.initial_query);
        assert!(snapshot.outcome.is_none(), "lesson {index} kept an outcome");
    }
}

#[tokio::test]
async fn test_out_of_range_selection_is_ignored() {
    let controller = ready_controller(Arc::new(CannedBackend("ok"))).await;

    assert!(controller.select_lesson(4).await.expect("ready").changed);
    assert!(!controller.select_lesson(5).await.expect("ready").changed);

    let snapshot = controller.snapshot().await;
    assert_eq!(snapshot.lesson_index, 4);
    assert_eq!(snapshot.lesson.title, "Aggregation");
    assert_eq!(snapshot.progress.position, 5);
    assert_eq!(snapshot.progress.total, 5);
}

#[tokio::test]
async fn test_next_and_previous_stop_at_course_bounds() {
    let controller = ready_controller(Arc::new(CannedBackend("ok"))).await;

    assert!(!controller.previous_lesson().await.expect("ready").changed);
    for _ in 0..4 {
        assert!(controller.next_lesson().await.expect("ready").changed);
    }
    assert!(!controller.next_lesson().await.expect("ready").changed);
    assert_eq!(controller.snapshot().await.lesson_index, 4);
}

// ============================================================================
// Query editing and execution
// ============================================================================

#[tokio::test]
async fn test_select_all_returns_seeded_employees() {
    let controller = ready_controller(Arc::new(CannedBackend("ok"))).await;

    let Outcome::Success { columns, rows } = controller.run().await.expect("ready") else {
        panic!("expected success");
    };
    assert_eq!(columns, vec!["id", "name", "department", "salary", "hire_date"]);
    assert_eq!(rows.len(), 6);
    assert_eq!(rows[0][1], Value::Text("Alice Johnson".to_string()));
}

#[tokio::test]
async fn test_average_salary_matches_seeded_mean() {
    let controller = ready_controller(Arc::new(CannedBackend("ok"))).await;

    let outcome = run(
        &controller,
        "SELECT AVG(salary) as avg_salary FROM employees;",
    )
    .await;
    let Outcome::Success { columns, rows } = outcome else {
        panic!("expected success");
    };
    assert_eq!(columns, vec!["avg_salary"]);
    assert_eq!(rows.len(), 1);

    let expected = f64::from(95000 + 65000 + 88000 + 72000 + 62000 + 105000) / 6.0;
    let actual = rows[0][0].as_f64().expect("numeric average");
    assert!((actual - expected).abs() < 1e-6);
}

#[tokio::test]
async fn test_statement_without_rows_succeeds_with_no_columns() {
    let controller = ready_controller(Arc::new(CannedBackend("ok"))).await;

    let outcome = run(&controller, "UPDATE employees SET salary = salary").await;
    assert_eq!(
        outcome,
        Outcome::Success {
            columns: vec![],
            rows: vec![],
        }
    );
}

#[tokio::test]
async fn test_malformed_sql_fails_and_session_recovers() {
    let controller = ready_controller(Arc::new(CannedBackend("ok"))).await;

    let outcome = run(&controller, "SELEKT * FROM employees;").await;
    let message = outcome.error_message().expect("failure outcome");
    assert!(!message.is_empty());
    assert_eq!(controller.snapshot().await.status, SessionStatus::Ready);

    let outcome = run(&controller, "SELECT COUNT(*) FROM projects").await;
    assert_eq!(
        outcome,
        Outcome::Success {
            columns: vec!["COUNT(*)".to_string()],
            rows: vec![vec![Value::Integer(3)]],
        }
    );
}

#[tokio::test]
async fn test_edit_keeps_previous_outcome() {
    let controller = ready_controller(Arc::new(CannedBackend("ok"))).await;
    controller.run().await.expect("ready");

    controller
        .edit_query("SELECT name FROM".to_string())
        .await
        .expect("ready");

    let snapshot = controller.snapshot().await;
    assert_eq!(snapshot.query, "SELECT name FROM");
    assert!(snapshot.outcome.is_some_and(|o| o.is_success()));
}

#[tokio::test]
async fn test_reset_query_is_idempotent() {
    let controller = ready_controller(Arc::new(CannedBackend("ok"))).await;
    controller.select_lesson(3).await.expect("ready");
    run(&controller, "SELECT name FROM employees").await;

    controller.reset_query().await.expect("ready");
    let once = controller.snapshot().await;
    controller.reset_query().await.expect("ready");
    let twice = controller.snapshot().await;

    assert_eq!(once.query, "SELECT * FROM employees ORDER BY ...;");
    assert_eq!(once.query, twice.query);
    assert!(once.outcome.is_none());
    assert!(twice.outcome.is_none());
}

#[tokio::test]
async fn test_database_reset_discards_learner_writes() {
    let controller = ready_controller(Arc::new(CannedBackend("ok"))).await;
    run(&controller, "DELETE FROM employees").await;

    let Outcome::Success { rows, .. } = run(&controller, "SELECT * FROM employees").await else {
        panic!("expected success");
    };
    assert!(rows.is_empty());

    controller.reset_database().await.expect("seed reloads");

    let Outcome::Success { rows, .. } = run(&controller, "SELECT * FROM employees").await else {
        panic!("expected success");
    };
    assert_eq!(rows.len(), 6);
}

// ============================================================================
// Tutor conversation
// ============================================================================

#[tokio::test]
async fn test_unreachable_tutor_appends_one_fallback() {
    let controller = ready_controller(Arc::new(UnreachableBackend)).await;

    let reply = controller.ask_tutor("help").await.expect("ask never fails");
    assert_eq!(reply.text, BACKEND_FAILURE_FALLBACK);

    let transcript = controller.snapshot().await.transcript;
    let messages = transcript.messages();
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[1].role, Role::Learner);
    assert_eq!(messages[1].text, "help");
    assert_eq!(messages[2].role, Role::Tutor);
    assert!(messages.iter().all(|m| !m.text.contains("dns error")));
}

#[tokio::test]
async fn test_blank_tutor_reply_uses_empty_fallback() {
    let controller = ready_controller(Arc::new(CannedBackend("   "))).await;

    let reply = controller.ask_tutor("why?").await.expect("ask never fails");
    assert_eq!(reply.text, EMPTY_REPLY_FALLBACK);
}

#[tokio::test]
async fn test_blank_question_is_rejected_without_transcript_change() {
    let controller = ready_controller(Arc::new(CannedBackend("ok"))).await;

    let err = controller.ask_tutor("  \n ").await.expect_err("blank question");
    assert!(matches!(err, SqlCoachError::EmptyQuestion));
    assert_eq!(controller.snapshot().await.transcript.len(), 1);
}

#[tokio::test]
async fn test_tutor_answer_keeps_grounding_from_ask_time() {
    let gate = Arc::new(Notify::new());
    let prompts = Arc::new(Mutex::new(Vec::new()));
    let backend = RecordingBackend {
        gate: Arc::clone(&gate),
        prompts: Arc::clone(&prompts),
    };
    let controller = ready_controller(Arc::new(backend)).await;
    let mut events = controller.broadcaster().subscribe();

    controller.select_lesson(2).await.expect("ready");
    run(&controller, "SELECT * FROM employes").await;
    let pending = controller
        .dispatch_ask("Why does this fail?")
        .await
        .expect("question accepted");
    assert_eq!(pending.grounding.lesson_title, "Filtering Data");
    assert!(pending.grounding.error.is_some());

    // The learner moves on while the tutor is still thinking
    controller.select_lesson(4).await.expect("ready");
    run(&controller, "SELECT 1").await;
    gate.notify_one();

    let reply = timeout(Duration::from_secs(5), async {
        loop {
            match events.recv().await {
                Ok(SessionEvent::TranscriptAppended(p)) if p.message.role == Role::Tutor => {
                    break p;
                }
                Ok(_) => {}
                Err(e) => panic!("event stream closed: {e}"),
            }
        }
    })
    .await
    .expect("tutor reply arrives");
    assert_eq!(reply.ticket, pending.ticket);
    assert_eq!(reply.message.text, "Try a WHERE clause.");

    let prompts = prompts.lock().expect("prompt log poisoned");
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("Current Lesson: Filtering Data"));
    assert!(prompts[0].contains("SELECT * FROM employes"));
    assert!(prompts[0].contains("no such table"));
    assert!(!prompts[0].contains("Aggregation"));

    let snapshot = controller.snapshot().await;
    assert_eq!(snapshot.lesson_index, 4);
    assert_eq!(snapshot.transcript.len(), 3);
}

#[tokio::test]
async fn test_run_is_not_blocked_by_pending_tutor_question() {
    let gate = Arc::new(Notify::new());
    let backend = RecordingBackend {
        gate: Arc::clone(&gate),
        prompts: Arc::new(Mutex::new(Vec::new())),
    };
    let controller = ready_controller(Arc::new(backend)).await;

    controller.dispatch_ask("hint please").await.expect("accepted");

    let outcome = timeout(Duration::from_secs(5), controller.run())
        .await
        .expect("run completes while the tutor is pending")
        .expect("ready");
    assert!(outcome.is_success());

    gate.notify_one();
}
